//! Standalone revision listing.

use revdeploy_remote::RemoteSession;
use revdeploy_revision::{Revision, scan};

use crate::error::FetchError;

/// Scans `remote_dir` for revisions of `base_pattern`, newest first.
///
/// Consumes the session and closes it before returning.
pub async fn fetch_revisions<S: RemoteSession>(
    session: S,
    remote_dir: &str,
    base_pattern: &str,
) -> Result<Vec<Revision>, FetchError> {
    let result = fetch_inner(&session, remote_dir, base_pattern).await;
    session.close().await;
    result
}

async fn fetch_inner<S: RemoteSession>(
    session: &S,
    remote_dir: &str,
    base_pattern: &str,
) -> Result<Vec<Revision>, FetchError> {
    let channel = session.open_file_channel().await?;
    let revisions = scan(channel.as_ref(), remote_dir, base_pattern).await?;
    Ok(revisions)
}
