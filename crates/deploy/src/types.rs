//! Request types for the deploy operations.

use std::path::PathBuf;

/// Input for [`upload`](crate::upload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub remote_dir: String,
    /// Base file name shared by every revision, e.g. `index.html`.
    pub base_pattern: String,
    pub identifier: String,
    /// Replace an existing revision with the same identifier.
    pub allow_overwrite: bool,
    pub local_artifact_path: PathBuf,
}

/// Input for [`activate`](crate::activate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    pub remote_dir: String,
    pub base_pattern: String,
    pub identifier: String,
}
