//! Revision activation.
//!
//! Activation is two remote commands issued together over the same session:
//! copy the revision over the live file, and replace the marker. They are
//! not transactional. If one fails the other is not rolled back.

use revdeploy_remote::RemoteSession;
use revdeploy_remote::args::quote_shell;
use revdeploy_revision::{
    MARKER_SUFFIX, encode_marker_filename, encode_revision_filename, join_remote, scan,
    validate_identifier,
};
use tracing::{debug, info};

use crate::error::ActivationError;
use crate::types::ActivationRequest;

/// `cp <source> <destination>`
pub fn copy_command(source: &str, destination: &str) -> String {
    format!("cp {} {}", quote_shell(source), quote_shell(destination))
}

/// Removes every marker in `remote_dir` and creates the one for `identifier`.
///
/// The glob stays outside the quotes so the remote shell expands it.
pub fn marker_command(remote_dir: &str, identifier: &str) -> String {
    let dir = remote_dir.trim_end_matches('/');
    format!(
        "rm -f {}/*{MARKER_SUFFIX} && touch {}",
        quote_shell(dir),
        quote_shell(&join_remote(remote_dir, &encode_marker_filename(identifier)))
    )
}

/// Makes `request.identifier` the live revision.
///
/// Fails with [`ActivationError::RevisionNotFound`] before issuing any remote
/// command if the revision was never uploaded. The session is closed on
/// every path.
pub async fn activate<S: RemoteSession>(
    session: S,
    request: &ActivationRequest,
) -> Result<(), ActivationError> {
    let result = activate_inner(&session, request).await;
    session.close().await;

    let (source, destination) = result?;
    info!(
        source = %source,
        destination = %destination,
        "✔  {source} => {destination}"
    );
    Ok(())
}

async fn activate_inner<S: RemoteSession>(
    session: &S,
    request: &ActivationRequest,
) -> Result<(String, String), ActivationError> {
    validate_identifier(&request.identifier)?;

    debug!(revision = %request.identifier, phase = "scanning", "activating");
    let revisions = {
        let channel = session.open_file_channel().await?;
        scan(channel.as_ref(), &request.remote_dir, &request.base_pattern).await?
    };

    debug!(revision = %request.identifier, phase = "validating", "activating");
    if !revisions.iter().any(|r| r.identifier == request.identifier) {
        return Err(ActivationError::RevisionNotFound(
            request.identifier.clone(),
        ));
    }

    let source = join_remote(
        &request.remote_dir,
        &encode_revision_filename(&request.base_pattern, &request.identifier),
    );
    let destination = join_remote(&request.remote_dir, &request.base_pattern);
    let copy = copy_command(&source, &destination);
    let marker = marker_command(&request.remote_dir, &request.identifier);

    debug!(revision = %request.identifier, phase = "mutating", "activating");
    let (copied, marked) = tokio::join!(session.run_command(&copy), session.run_command(&marker));
    copied.map_err(ActivationError::Copy)?;
    marked.map_err(ActivationError::Marker)?;

    Ok((source, destination))
}
