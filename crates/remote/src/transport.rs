//! Session and file channel traits.
//!
//! `SshSession` implements these on top of OpenSSH. Keeping the orchestrators
//! behind traits decouples them from the transport and makes them testable
//! with mocks.

use std::future::Future;
use std::pin::Pin;

use crate::error::{ChannelError, CommandError, RemoteIoError};
use crate::types::RemoteDirEntry;

/// Boxed future returned by the trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An established, authenticated remote connection.
///
/// One session is owned by exactly one high-level operation. Implementations
/// must make [`close`](RemoteSession::close) idempotent.
pub trait RemoteSession: Send + Sync {
    /// Opens the file-transfer sub-channel.
    ///
    /// On failure the session is closed before the error is returned.
    fn open_file_channel(
        &self,
    ) -> BoxFuture<'_, Result<Box<dyn FileChannel + '_>, ChannelError>>;

    /// Runs a shell command line on the remote host.
    ///
    /// Resolves once the remote process finishes without a transport error.
    /// The remote exit status is not treated as a failure.
    fn run_command<'a>(&'a self, command_line: &'a str)
    -> BoxFuture<'a, Result<(), CommandError>>;

    /// Releases the transport. Later operations fail.
    fn close(&self) -> BoxFuture<'_, ()>;

    /// Returns `user@host` for logs.
    fn destination(&self) -> &str;
}

/// File operations on top of an open session.
pub trait FileChannel: Send + Sync {
    /// Lists the regular files in `path`.
    ///
    /// On failure the owning session is closed before the error is returned.
    fn list_directory<'a>(
        &'a self,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RemoteDirEntry>, RemoteIoError>>;

    /// Writes `bytes` to `path`, replacing any existing file.
    fn write_file<'a>(
        &'a self,
        path: &'a str,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<(), RemoteIoError>>;
}

impl<T: RemoteSession + ?Sized> RemoteSession for &T {
    fn open_file_channel(
        &self,
    ) -> BoxFuture<'_, Result<Box<dyn FileChannel + '_>, ChannelError>> {
        (**self).open_file_channel()
    }

    fn run_command<'a>(
        &'a self,
        command_line: &'a str,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        (**self).run_command(command_line)
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        (**self).close()
    }

    fn destination(&self) -> &str {
        (**self).destination()
    }
}
