//! Revision naming and discovery.
//!
//! A revision of `<file_pattern>` lives remotely as
//! `<remote_dir>/<file_pattern>:<identifier>`. The live revision is named by
//! an empty marker file `<remote_dir>/<identifier>.active-revision`.

pub mod codec;
pub mod scanner;
pub mod types;

pub use codec::{
    InvalidRevision, MARKER_SUFFIX, SEPARATOR, decode_marker_filename, decode_revision_filename,
    encode_marker_filename, encode_revision_filename, join_remote, validate_identifier,
};
pub use scanner::{revisions_from_entries, scan};
pub use types::Revision;
