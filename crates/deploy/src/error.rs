//! Deploy error types.

use std::path::PathBuf;

use revdeploy_remote::{ChannelError, CommandError, RemoteIoError};
use revdeploy_revision::InvalidRevision;

/// Errors produced by [`fetch_revisions`](crate::fetch_revisions).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("file channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("remote I/O error: {0}")]
    Io(#[from] RemoteIoError),
}

/// Errors produced by [`upload`](crate::upload).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    InvalidRevision(#[from] InvalidRevision),

    #[error("file channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("remote I/O error: {0}")]
    Io(#[from] RemoteIoError),

    #[error("failed to read {}: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("revision {0} is already uploaded (set allow_overwrite to replace it)")]
    DuplicateRevision(String),
}

/// Errors produced by [`activate`](crate::activate).
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error(transparent)]
    InvalidRevision(#[from] InvalidRevision),

    #[error("file channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("remote I/O error: {0}")]
    Io(#[from] RemoteIoError),

    #[error("revision {0} not found")]
    RevisionNotFound(String),

    #[error("failed to copy revision over live file: {0}")]
    Copy(#[source] CommandError),

    #[error("failed to update active marker: {0}")]
    Marker(#[source] CommandError),
}
