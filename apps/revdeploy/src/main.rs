mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::DeployConfig;

#[derive(Parser, Debug)]
#[command(name = "revdeploy", version, about = "Upload and activate revisions over SSH")]
struct Cli {
    /// Configuration file.
    #[arg(short, long, global = true, default_value = "revdeploy.toml")]
    config: PathBuf,

    /// Log every step.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Passphrase for an encrypted private key.
    #[arg(long, global = true, env = "REVDEPLOY_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload the local artifact as a new revision.
    Upload {
        /// Revision key, overrides `revision_key`.
        #[arg(long)]
        revision: Option<String>,
        /// Replace an existing revision with the same key.
        #[arg(long)]
        allow_overwrite: bool,
    },
    /// Make a revision live.
    Activate {
        #[arg(long)]
        revision: Option<String>,
    },
    /// List uploaded revisions, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = DeployConfig::load(&cli.config)?;
    if cli.passphrase.is_some() {
        config.passphrase = cli.passphrase;
    }

    match cli.command {
        Command::Upload {
            revision,
            allow_overwrite,
        } => commands::upload(&config, revision.as_deref(), allow_overwrite).await,
        Command::Activate { revision } => commands::activate(&config, revision.as_deref()).await,
        Command::List { json } => commands::list(&config, json).await,
    }
}
