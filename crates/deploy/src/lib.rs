//! Revision deploy flow: fetch, upload, activate.
//!
//! Each operation takes ownership of one remote session, validates against
//! a fresh scan of the remote directory before touching anything, and closes
//! the session on every exit path.
//!
//! # Operations
//!
//! 1. **Fetch**: scan the remote directory and return the revision list
//! 2. **Upload**: reject duplicates unless overwriting, then write the artifact
//! 3. **Activate**: copy the revision over the live file and move the marker

pub mod activate;
pub mod error;
pub mod fetch;
pub mod types;
pub mod upload;

#[cfg(test)]
mod mock;

pub use activate::{activate, copy_command, marker_command};
pub use error::{ActivationError, FetchError, UploadError};
pub use fetch::fetch_revisions;
pub use types::{ActivationRequest, UploadRequest};
pub use upload::upload;
