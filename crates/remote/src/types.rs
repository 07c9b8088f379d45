//! Public types for the remote session layer.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default time allowed for the master connection to become ready.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the private key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Path to a key file. A leading `~` is expanded against `$HOME`.
    File(PathBuf),
    /// Already-loaded key material (PEM/OpenSSH text).
    Inline(String),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Inline(_) => f.write_str("Inline(<redacted>)"),
        }
    }
}

/// Connection settings for one SSH session.
#[derive(Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Agent socket path, exported as `SSH_AUTH_SOCK` for the session.
    pub agent: Option<String>,
    /// Passphrase for an encrypted private key.
    pub passphrase: Option<String>,
    pub key: KeySource,
    pub connect_timeout: Duration,
    /// Extra `-o` options handed to every ssh invocation.
    pub ssh_options: Vec<String>,
}

impl SshConfig {
    /// Creates a config with the default port, timeout and host key policy.
    pub fn new(host: impl Into<String>, username: impl Into<String>, key: KeySource) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            agent: None,
            passphrase: None,
            key,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ssh_options: vec!["StrictHostKeyChecking=accept-new".to_string()],
        }
    }

    /// Returns `user@host` for logs and error messages.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

impl fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("agent", &self.agent)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("key", &self.key)
            .field("connect_timeout", &self.connect_timeout)
            .field("ssh_options", &self.ssh_options)
            .finish()
    }
}

/// One regular file in a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDirEntry {
    /// File name, without the directory part.
    pub filename: String,
    pub modified_at: DateTime<Utc>,
}
