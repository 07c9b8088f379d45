//! Revision upload.

use revdeploy_remote::RemoteSession;
use revdeploy_revision::{encode_revision_filename, join_remote, scan, validate_identifier};
use tracing::debug;

use crate::error::UploadError;
use crate::types::UploadRequest;

/// Uploads the local artifact as a new revision.
///
/// The duplicate check runs against a fresh scan before anything is written,
/// so a rejected upload leaves the remote directory untouched. The session is
/// closed on every path.
pub async fn upload<S: RemoteSession>(session: S, request: &UploadRequest) -> Result<(), UploadError> {
    let result = upload_inner(&session, request).await;
    session.close().await;

    let destination = result?;
    debug!(destination = %destination, "✔  {destination}");
    Ok(())
}

async fn upload_inner<S: RemoteSession>(
    session: &S,
    request: &UploadRequest,
) -> Result<String, UploadError> {
    validate_identifier(&request.identifier)?;

    let channel = session.open_file_channel().await?;
    let revisions = scan(channel.as_ref(), &request.remote_dir, &request.base_pattern).await?;

    let exists = revisions.iter().any(|r| r.identifier == request.identifier);
    if exists && !request.allow_overwrite {
        return Err(UploadError::DuplicateRevision(request.identifier.clone()));
    }

    let payload = tokio::fs::read(&request.local_artifact_path)
        .await
        .map_err(|source| UploadError::LocalRead {
            path: request.local_artifact_path.clone(),
            source,
        })?;

    let destination = join_remote(
        &request.remote_dir,
        &encode_revision_filename(&request.base_pattern, &request.identifier),
    );
    debug!(
        destination = %destination,
        bytes = payload.len(),
        overwrite = exists,
        "writing revision"
    );
    channel.write_file(&destination, &payload).await?;

    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryRemote;
    use std::path::{Path, PathBuf};

    fn request(identifier: &str, allow_overwrite: bool, artifact: &Path) -> UploadRequest {
        UploadRequest {
            remote_dir: "/directory".into(),
            base_pattern: "app.html".into(),
            identifier: identifier.into(),
            allow_overwrite,
            local_artifact_path: artifact.to_path_buf(),
        }
    }

    fn artifact(dir: &tempfile::TempDir, content: &[u8]) -> PathBuf {
        let path = dir.path().join("app.html");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn upload_writes_encoded_filename_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, b"<html>789</html>");
        let remote = MemoryRemote::example();

        upload(&remote, &request("789", false, &path)).await.unwrap();

        let file = remote.file("/directory/app.html:789").unwrap();
        assert_eq!(file.content, b"<html>789</html>");
        assert_eq!(*remote.writes.lock().unwrap(), vec!["/directory/app.html:789"]);
        assert!(remote.is_closed());
    }

    #[tokio::test]
    async fn duplicate_rejected_without_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, b"new");
        let remote = MemoryRemote::example();

        let err = upload(&remote, &request("123", false, &path))
            .await
            .unwrap_err();

        match err {
            UploadError::DuplicateRevision(id) => assert_eq!(id, "123"),
            other => panic!("expected DuplicateRevision, got {other:?}"),
        }
        assert!(remote.writes.lock().unwrap().is_empty());
        assert_eq!(remote.file("/directory/app.html:123").unwrap().content, b"<rev 123>");
        assert!(remote.is_closed());
    }

    #[tokio::test]
    async fn overwrite_replaces_existing_revision() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, b"replaced");
        let remote = MemoryRemote::example();

        upload(&remote, &request("123", true, &path)).await.unwrap();

        assert_eq!(remote.file("/directory/app.html:123").unwrap().content, b"replaced");
        let copies = remote
            .paths()
            .into_iter()
            .filter(|p| p == "/directory/app.html:123")
            .count();
        assert_eq!(copies, 1);
    }

    #[tokio::test]
    async fn missing_artifact_is_local_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::example();

        let err = upload(&remote, &request("789", false, &dir.path().join("missing.html")))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::LocalRead { .. }));
        assert!(remote.writes.lock().unwrap().is_empty());
        assert!(remote.is_closed());
    }

    #[tokio::test]
    async fn write_failure_surfaces_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, b"x");
        let remote = MemoryRemote {
            fail_write: true,
            ..MemoryRemote::example()
        };

        let err = upload(&remote, &request("789", false, &path))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Io(_)));
        assert!(remote.is_closed());
        assert!(remote.file("/directory/app.html:789").is_none());
    }

    #[tokio::test]
    async fn channel_failure_surfaces_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, b"x");
        let remote = MemoryRemote {
            fail_channel: true,
            ..MemoryRemote::example()
        };

        let err = upload(&remote, &request("789", false, &path))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Channel(_)));
        assert!(remote.is_closed());
    }

    #[tokio::test]
    async fn invalid_identifier_rejected_before_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, b"x");
        let remote = MemoryRemote::example();

        let err = upload(&remote, &request("../etc", false, &path))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::InvalidRevision(_)));
        assert_eq!(remote.listings.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(remote.is_closed());
    }

    #[tokio::test]
    async fn newline_identifier_rejected_without_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, b"x");
        let remote = MemoryRemote::example();

        let err = upload(&remote, &request("a\nb", false, &path))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::InvalidRevision(_)));
        assert!(remote.writes.lock().unwrap().is_empty());
        assert!(remote.is_closed());
    }

    #[tokio::test]
    async fn upload_into_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact(&dir, b"first");
        let remote = MemoryRemote::new();

        let req = UploadRequest {
            remote_dir: "/srv/www/".into(),
            ..request("abc", false, &path)
        };
        upload(&remote, &req).await.unwrap();

        assert!(remote.file("/srv/www/app.html:abc").is_some());
    }
}
