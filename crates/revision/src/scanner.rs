//! Remote revision directory scanning.
//!
//! Markers and revisions are read from the same listing, so the active flag
//! and the revision list always come from one snapshot.

use revdeploy_remote::{FileChannel, RemoteDirEntry, RemoteIoError};
use tracing::debug;

use crate::codec::{decode_marker_filename, decode_revision_filename};
use crate::types::Revision;

/// Lists `remote_dir` and returns the revisions of `base_pattern`, newest first.
///
/// Does not close the session; the caller owns it.
pub async fn scan(
    channel: &dyn FileChannel,
    remote_dir: &str,
    base_pattern: &str,
) -> Result<Vec<Revision>, RemoteIoError> {
    let entries = channel.list_directory(remote_dir).await?;
    let revisions = revisions_from_entries(&entries, base_pattern);

    debug!(
        remote_dir = %remote_dir,
        entries = entries.len(),
        revisions = revisions.len(),
        active = ?revisions.iter().find(|r| r.is_active).map(|r| r.identifier.as_str()),
        "scan complete"
    );

    Ok(revisions)
}

/// Builds the sorted revision list from a directory listing.
///
/// If several marker files exist, the last one in listing order wins. That
/// tie-break depends on the remote listing order and is not otherwise
/// meaningful. Equal timestamps are ordered by identifier.
pub fn revisions_from_entries(entries: &[RemoteDirEntry], base_pattern: &str) -> Vec<Revision> {
    let current = entries
        .iter()
        .filter_map(|e| decode_marker_filename(&e.filename))
        .next_back();

    let mut revisions: Vec<Revision> = entries
        .iter()
        .filter_map(|entry| {
            let identifier = decode_revision_filename(base_pattern, &entry.filename)?;
            Some(Revision {
                identifier: identifier.to_string(),
                timestamp: entry.modified_at,
                is_active: current == Some(identifier),
            })
        })
        .collect();

    revisions.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });

    revisions
}
