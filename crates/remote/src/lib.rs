//! Remote session plumbing for revision deploys.
//!
//! A [`SshSession`] owns one multiplexed OpenSSH master connection. On top
//! of it the crate exposes a file channel (directory listing and file
//! upload) and remote command execution. Orchestrators consume the
//! [`RemoteSession`] and [`FileChannel`] traits so they can be driven by
//! in-memory fakes in tests.

pub mod args;
mod channel;
pub mod error;
mod session;
pub mod transport;
pub mod types;

pub use channel::SshFileChannel;
pub use error::{ChannelError, CommandError, ConnectError, RemoteIoError};
pub use session::SshSession;
pub use transport::{BoxFuture, FileChannel, RemoteSession};
pub use types::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, KeySource, RemoteDirEntry, SshConfig};
