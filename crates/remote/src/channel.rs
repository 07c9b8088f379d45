//! File channel over an [`SshSession`].
//!
//! Uploads go through the sftp subsystem. Listings run a small shell
//! script instead, because sftp's `ls -l` output lacks second-resolution
//! modification times.

use std::io::Write;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::args::{listing_script, parse_listing, parse_size, quote_sftp, size_command};
use crate::error::RemoteIoError;
use crate::session::SshSession;
use crate::transport::{BoxFuture, FileChannel};
use crate::types::RemoteDirEntry;

/// File-transfer sub-channel borrowed from a session.
pub struct SshFileChannel<'s> {
    session: &'s SshSession,
}

impl<'s> SshFileChannel<'s> {
    pub(crate) fn new(session: &'s SshSession) -> Self {
        Self { session }
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteDirEntry>, RemoteIoError> {
        if !self.session.ensure_master().await {
            return Err(RemoteIoError::Closed);
        }

        debug!(session = %self.session.id(), remote_dir = %path, "reading remote directory");
        let output = match self.session.exec(&listing_script(path)).await {
            Ok(output) => output,
            Err(e) => {
                self.session.shutdown().await;
                return Err(RemoteIoError::Io(e));
            }
        };

        if !output.status.success() {
            self.session.shutdown().await;
            return Err(RemoteIoError::List {
                path: path.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), RemoteIoError> {
        if !self.session.ensure_master().await {
            return Err(RemoteIoError::Closed);
        }

        let result = self.put(path, bytes).await;
        if result.is_err() {
            self.session.shutdown().await;
        }
        result
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), RemoteIoError> {
        let expected = bytes.len() as u64;
        let data = bytes.to_vec();

        let staged = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = NamedTempFile::new()?;
            file.write_all(&data)?;
            file.as_file().sync_all()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        let batch = format!(
            "put {} {}\n",
            quote_sftp(&staged.path().to_string_lossy()),
            quote_sftp(path)
        );
        debug!(
            session = %self.session.id(),
            destination = %path,
            bytes = expected,
            "uploading"
        );
        let output = self.session.sftp_batch(&batch).await?;
        if !output.status.success() {
            return Err(write_error(path, &output.stderr));
        }

        let output = self.session.exec(&size_command(path)).await?;
        if !output.status.success() {
            return Err(write_error(path, &output.stderr));
        }
        let written = parse_size(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            RemoteIoError::Write {
                path: path.to_string(),
                message: "could not read remote file size".into(),
            }
        })?;
        if written != expected {
            return Err(RemoteIoError::Truncated {
                path: path.to_string(),
                expected,
                written,
            });
        }

        Ok(())
    }
}

fn write_error(path: &str, stderr: &[u8]) -> RemoteIoError {
    RemoteIoError::Write {
        path: path.to_string(),
        message: String::from_utf8_lossy(stderr).trim().to_string(),
    }
}

impl FileChannel for SshFileChannel<'_> {
    fn list_directory<'a>(
        &'a self,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RemoteDirEntry>, RemoteIoError>> {
        Box::pin(self.list(path))
    }

    fn write_file<'a>(
        &'a self,
        path: &'a str,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<(), RemoteIoError>> {
        Box::pin(self.write(path, bytes))
    }
}
