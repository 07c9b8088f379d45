//! OpenSSH argument building, shell quoting and listing output parsing.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{CommandError, ConnectError};
use crate::types::{RemoteDirEntry, SshConfig};

/// OpenSSH exits with 255 when the error is its own rather than the remote command's.
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// Quotes a string for safe use as one word in a POSIX shell command.
pub fn quote_shell(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Quotes a path for an sftp batch command.
pub(crate) fn quote_sftp(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Expands a leading `~` against `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    expand_tilde_with(path, home.as_deref())
}

fn expand_tilde_with(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    let raw = path.to_string_lossy();
    if raw == "~" {
        home.to_path_buf()
    } else if let Some(rest) = raw.strip_prefix("~/") {
        home.join(rest)
    } else {
        path.to_path_buf()
    }
}

/// Arguments for the multiplexing master process.
pub(crate) fn master_args(config: &SshConfig, control_path: &Path, key_path: &Path) -> Vec<String> {
    let mut args = vec![
        "-M".to_string(),
        "-N".to_string(),
        "-S".to_string(),
        control_path.to_string_lossy().into_owned(),
        "-o".to_string(),
        format!("ConnectTimeout={}", config.connect_timeout.as_secs().max(1)),
        "-o".to_string(),
        format!(
            "BatchMode={}",
            if config.passphrase.is_some() { "no" } else { "yes" }
        ),
        "-o".to_string(),
        "ServerAliveInterval=15".to_string(),
    ];

    for opt in &config.ssh_options {
        args.push("-o".to_string());
        args.push(opt.clone());
    }

    args.push("-i".to_string());
    args.push(key_path.to_string_lossy().into_owned());
    args.push("-p".to_string());
    args.push(config.port.to_string());
    args.push("-l".to_string());
    args.push(config.username.clone());
    args.push(config.host.clone());
    args
}

/// Options shared by every client that rides on the master.
///
/// If the control socket is gone OpenSSH falls back to a direct connection.
/// These keep that fallback on the staged key and non-interactive, so it
/// fails instead of prompting or trying other identities.
fn client_options(config: &SshConfig, key_path: &Path) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "IdentitiesOnly=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", config.connect_timeout.as_secs().max(1)),
    ];
    for opt in &config.ssh_options {
        args.push("-o".to_string());
        args.push(opt.clone());
    }
    args.push("-i".to_string());
    args.push(key_path.to_string_lossy().into_owned());
    args
}

/// Arguments for an ssh client riding on an existing master.
///
/// The host is the last argument so callers can append a remote command.
pub(crate) fn mux_args(config: &SshConfig, control_path: &Path, key_path: &Path) -> Vec<String> {
    let mut args = vec![
        "-S".to_string(),
        control_path.to_string_lossy().into_owned(),
        "-o".to_string(),
        "ControlMaster=no".to_string(),
    ];
    args.extend(client_options(config, key_path));
    args.extend([
        "-p".to_string(),
        config.port.to_string(),
        "-l".to_string(),
        config.username.clone(),
        config.host.clone(),
    ]);
    args
}

/// Arguments for a master control request (`check`, `exit`).
pub(crate) fn control_args(
    config: &SshConfig,
    control_path: &Path,
    key_path: &Path,
    request: &str,
) -> Vec<String> {
    let mut args = vec!["-O".to_string(), request.to_string()];
    args.extend(mux_args(config, control_path, key_path));
    args
}

/// Arguments for an sftp batch reading its commands from stdin.
pub(crate) fn sftp_args(config: &SshConfig, control_path: &Path, key_path: &Path) -> Vec<String> {
    let mut args = vec![
        "-b".to_string(),
        "-".to_string(),
        "-o".to_string(),
        format!("ControlPath={}", control_path.display()),
        "-o".to_string(),
        "ControlMaster=no".to_string(),
        "-o".to_string(),
        format!("User={}", config.username),
    ];
    args.extend(client_options(config, key_path));
    args.extend(["-P".to_string(), config.port.to_string(), config.host.clone()]);
    args
}

/// Remote script printing `<mtime-seconds>\t<name>\0` for each regular file in `dir`.
///
/// Records end in NUL since file names may contain newlines. GNU `stat -c`
/// first, BSD `stat -f` as fallback.
pub(crate) fn listing_script(dir: &str) -> String {
    format!(
        "cd {} && for f in * .*; do \
         [ -f \"$f\" ] || continue; \
         t=$(stat -c %Y \"./$f\" 2>/dev/null || stat -f %m \"./$f\") || exit 1; \
         printf '%s\\t%s\\0' \"$t\" \"$f\"; \
         done",
        quote_shell(dir)
    )
}

/// Parses the output of [`listing_script`]. Malformed records are skipped.
pub(crate) fn parse_listing(output: &str) -> Vec<RemoteDirEntry> {
    output
        .split('\0')
        .filter_map(|record| {
            let (secs, name) = record.split_once('\t')?;
            let secs: i64 = secs.trim().parse().ok()?;
            let modified_at: DateTime<Utc> = DateTime::from_timestamp(secs, 0)?;
            if name.is_empty() {
                return None;
            }
            Some(RemoteDirEntry {
                filename: name.to_string(),
                modified_at,
            })
        })
        .collect()
}

/// Remote command printing the size of `path` in bytes.
pub(crate) fn size_command(path: &str) -> String {
    format!("wc -c < {}", quote_shell(path))
}

/// Parses the output of [`size_command`].
pub(crate) fn parse_size(output: &str) -> Option<u64> {
    output.trim().parse().ok()
}

/// Maps the exit status of a remote command.
///
/// `None` (killed by a signal) and 255 are OpenSSH failures. Other
/// non-zero codes come from the remote command itself and are only logged.
pub(crate) fn classify_exit(
    code: Option<i32>,
    command: &str,
    stderr: &str,
) -> Result<(), CommandError> {
    match code {
        Some(0) => Ok(()),
        Some(SSH_TRANSPORT_FAILURE) | None => Err(CommandError::Transport {
            command: command.to_string(),
            message: stderr.trim().to_string(),
        }),
        Some(code) => {
            warn!(
                command = %command,
                code,
                stderr = %stderr.trim(),
                "remote command exited non-zero"
            );
            Ok(())
        }
    }
}

/// Maps a failed master startup to a [`ConnectError`].
pub(crate) fn classify_connect_failure(destination: &str, stderr: &str) -> ConnectError {
    const AUTH_MARKERS: [&str; 4] = [
        "Permission denied",
        "Too many authentication failures",
        "no mutual signature",
        "incorrect passphrase",
    ];

    let message = stderr
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .unwrap_or("ssh exited before the connection was ready")
        .to_string();

    if AUTH_MARKERS.iter().any(|m| stderr.contains(m)) {
        ConnectError::Auth {
            destination: destination.to_string(),
            message,
        }
    } else {
        ConnectError::Network {
            destination: destination.to_string(),
            message,
        }
    }
}
