//! Revision and marker filename encoding.

/// Separates the file pattern from the revision identifier.
pub const SEPARATOR: char = ':';

/// Suffix of the active-revision marker file.
pub const MARKER_SUFFIX: &str = ".active-revision";

/// A revision identifier that cannot be encoded into a remote filename.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid revision identifier {identifier:?}: {reason}")]
pub struct InvalidRevision {
    pub identifier: String,
    pub reason: &'static str,
}

/// Checks that `identifier` is usable as part of a remote filename.
pub fn validate_identifier(identifier: &str) -> Result<(), InvalidRevision> {
    let reason = if identifier.is_empty() {
        "must not be empty"
    } else if identifier.contains('/') {
        "must not contain '/'"
    } else if identifier.chars().any(char::is_control) {
        "must not contain control characters"
    } else {
        return Ok(());
    };

    Err(InvalidRevision {
        identifier: identifier.to_string(),
        reason,
    })
}

/// `<base_pattern>:<identifier>`
pub fn encode_revision_filename(base_pattern: &str, identifier: &str) -> String {
    format!("{base_pattern}{SEPARATOR}{identifier}")
}

/// Extracts the identifier from a revision filename of `base_pattern`.
pub fn decode_revision_filename<'a>(base_pattern: &str, filename: &'a str) -> Option<&'a str> {
    let identifier = filename
        .strip_prefix(base_pattern)?
        .strip_prefix(SEPARATOR)?;
    (!identifier.is_empty()).then_some(identifier)
}

/// `<identifier>.active-revision`
pub fn encode_marker_filename(identifier: &str) -> String {
    format!("{identifier}{MARKER_SUFFIX}")
}

/// Extracts the identifier from a marker filename.
pub fn decode_marker_filename(filename: &str) -> Option<&str> {
    filename
        .strip_suffix(MARKER_SUFFIX)
        .filter(|identifier| !identifier.is_empty())
}

/// Joins a remote directory and a file name with a single `/`.
pub fn join_remote(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() && !name.is_empty() {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}
