//! Subcommand handlers.

use std::fmt::Write as _;

use anyhow::Context;
use revdeploy_deploy::{ActivationRequest, UploadRequest};
use revdeploy_remote::SshSession;
use revdeploy_revision::Revision;

use crate::config::DeployConfig;

async fn connect(config: &DeployConfig) -> anyhow::Result<SshSession> {
    let ssh = config.ssh_config()?;
    let destination = ssh.destination();
    SshSession::connect(ssh)
        .await
        .with_context(|| format!("failed to connect to {destination}"))
}

pub async fn upload(
    config: &DeployConfig,
    revision: Option<&str>,
    allow_overwrite: bool,
) -> anyhow::Result<()> {
    let request = UploadRequest {
        remote_dir: config.remote_dir()?.to_string(),
        base_pattern: config.file_pattern.clone(),
        identifier: config.resolve_revision(revision)?,
        allow_overwrite: allow_overwrite || config.allow_overwrite,
        local_artifact_path: config.artifact_path(),
    };

    let session = connect(config).await?;
    revdeploy_deploy::upload(session, &request)
        .await
        .with_context(|| format!("failed to upload revision {}", request.identifier))?;

    println!("uploaded revision {}", request.identifier);
    Ok(())
}

pub async fn activate(config: &DeployConfig, revision: Option<&str>) -> anyhow::Result<()> {
    let request = ActivationRequest {
        remote_dir: config.remote_dir()?.to_string(),
        base_pattern: config.file_pattern.clone(),
        identifier: config.resolve_revision(revision)?,
    };

    let session = connect(config).await?;
    revdeploy_deploy::activate(session, &request)
        .await
        .with_context(|| format!("failed to activate revision {}", request.identifier))?;

    println!("activated revision {}", request.identifier);
    Ok(())
}

pub async fn list(config: &DeployConfig, json: bool) -> anyhow::Result<()> {
    let remote_dir = config.remote_dir()?;

    let session = connect(config).await?;
    let revisions = revdeploy_deploy::fetch_revisions(session, remote_dir, &config.file_pattern)
        .await
        .context("failed to list revisions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&revisions)?);
    } else {
        print!("{}", format_table(&revisions));
    }
    Ok(())
}

/// Renders revisions newest first, the active one starred.
fn format_table(revisions: &[Revision]) -> String {
    if revisions.is_empty() {
        return "no revisions\n".to_string();
    }

    let width = revisions
        .iter()
        .map(|r| r.identifier.len())
        .max()
        .unwrap_or(0)
        .max("REVISION".len());

    let mut out = String::new();
    let _ = writeln!(out, "  {:<width$}  UPLOADED", "REVISION");
    for revision in revisions {
        let _ = writeln!(
            out,
            "{} {:<width$}  {}",
            if revision.is_active { '*' } else { ' ' },
            revision.identifier,
            revision.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }
    out
}
