//! Remote session error types.
//!
//! One enum per Connection Manager operation family, so callers can tell a
//! failed handshake from a refused sub-channel or a broken transfer.

use std::io;
use std::path::PathBuf;

/// Errors produced while establishing a session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("failed to read private key {}: {source}", path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("authentication failed for {destination}: {message}")]
    Auth {
        destination: String,
        message: String,
    },

    #[error("connection to {destination} failed: {message}")]
    Network {
        destination: String,
        message: String,
    },

    #[error("connection to {destination} timed out after {secs}s")]
    Timeout { destination: String, secs: u64 },

    #[error("failed to start ssh: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to prepare session directory: {0}")]
    Workdir(#[source] io::Error),
}

/// Errors produced while opening the file-transfer sub-channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("session is not ready")]
    NotReady,

    #[error("sftp subsystem rejected: {0}")]
    Rejected(String),

    #[error("failed to start sftp: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors produced by listing or writing remote files.
#[derive(Debug, thiserror::Error)]
pub enum RemoteIoError {
    #[error("session is closed")]
    Closed,

    #[error("failed to list {path}: {message}")]
    List { path: String, message: String },

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("stream for {path} ended early: {written} of {expected} bytes")]
    Truncated {
        path: String,
        expected: u64,
        written: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors produced by remote command execution.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("session is closed")]
    Closed,

    #[error("transport error running `{command}`: {message}")]
    Transport { command: String, message: String },

    #[error("failed to start ssh: {0}")]
    Spawn(#[source] io::Error),
}
