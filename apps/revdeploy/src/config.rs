//! Deploy target configuration.
//!
//! Stored as TOML, `revdeploy.toml` in the working directory by default:
//!
//! ```toml
//! username = "deploy"
//! host = "web1.example.com"
//! remote_dir = "/srv/www/app"
//! private_key_file = "~/.ssh/id_ed25519"
//! file_pattern = "index.html"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use revdeploy_remote::{DEFAULT_PORT, KeySource, SshConfig};
use serde::Deserialize;

/// Deploy configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub username: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub remote_dir: Option<String>,
    /// Private key file; `~` is expanded when connecting.
    pub private_key_file: Option<PathBuf>,
    /// Inline private key, used when no key file is configured.
    pub private_key: Option<String>,
    pub file_pattern: String,
    pub allow_overwrite: bool,
    /// SSH agent socket.
    pub agent: Option<String>,
    pub passphrase: Option<String>,
    /// Local build output directory holding `file_pattern`.
    pub dist_dir: PathBuf,
    pub revision_key: Option<String>,
    pub connect_timeout_secs: u64,
    /// Extra ssh `-o` options. Empty keeps the default host key policy.
    pub ssh_options: Vec<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            username: None,
            host: None,
            port: DEFAULT_PORT,
            remote_dir: None,
            private_key_file: None,
            private_key: None,
            file_pattern: "index.html".into(),
            allow_overwrite: false,
            agent: None,
            passphrase: None,
            dist_dir: PathBuf::from("dist"),
            revision_key: None,
            connect_timeout_secs: 10,
            ssh_options: Vec::new(),
        }
    }
}

impl DeployConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: DeployConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Remote directory holding the revisions.
    pub fn remote_dir(&self) -> anyhow::Result<&str> {
        required(self.remote_dir.as_deref(), "remote_dir")
    }

    /// Local artifact to upload: `<dist_dir>/<file_pattern>`.
    pub fn artifact_path(&self) -> PathBuf {
        self.dist_dir.join(&self.file_pattern)
    }

    /// Picks the revision key: command line first, then config.
    pub fn resolve_revision(&self, from_cli: Option<&str>) -> anyhow::Result<String> {
        match from_cli.or(self.revision_key.as_deref()) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => bail!("no revision given: pass --revision or set `revision_key`"),
        }
    }

    /// Builds the connection settings, checking required values.
    pub fn ssh_config(&self) -> anyhow::Result<SshConfig> {
        let username = required(self.username.as_deref(), "username")?;
        let host = required(self.host.as_deref(), "host")?;
        if self.port == 0 {
            bail!("config value `port` must be non-zero");
        }

        let key = match (&self.private_key_file, &self.private_key) {
            (Some(path), _) => KeySource::File(path.clone()),
            (None, Some(pem)) => KeySource::Inline(pem.clone()),
            (None, None) => bail!("missing required config value `private_key_file`"),
        };

        let mut config = SshConfig::new(host, username, key);
        config.port = self.port;
        config.agent = self.agent.clone();
        config.passphrase = self.passphrase.clone();
        config.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        if !self.ssh_options.is_empty() {
            config.ssh_options = self.ssh_options.clone();
        }
        Ok(config)
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> anyhow::Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("missing required config value `{field}`"),
    }
}
