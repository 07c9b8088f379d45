//! SSH session backed by an OpenSSH multiplexing master.
//!
//! `connect` starts `ssh -M -N` with a control socket in a private
//! temporary directory and waits until `ssh -O check` succeeds. Every
//! later operation (sftp, listing, remote commands) rides on that master,
//! so one session is one authenticated connection.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::args::{
    self, classify_connect_failure, classify_exit, control_args, master_args, mux_args,
};
use crate::channel::SshFileChannel;
use crate::error::{ChannelError, CommandError, ConnectError};
use crate::transport::{BoxFuture, FileChannel, RemoteSession};
use crate::types::{KeySource, SshConfig};

/// Interval between readiness checks while the master connects.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time allowed for the master to exit after `ssh -O exit`.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Environment variable the askpass helper reads the passphrase from.
const ASKPASS_ENV: &str = "REVDEPLOY_ASKPASS_PASSPHRASE";

enum SessionState {
    Open { master: Child, workdir: TempDir },
    Closed,
}

/// One established SSH connection.
pub struct SshSession {
    id: Uuid,
    config: SshConfig,
    destination: String,
    control_path: PathBuf,
    key_path: PathBuf,
    state: Mutex<SessionState>,
}

impl SshSession {
    /// Connects and authenticates.
    ///
    /// Resolves only after the master connection reports ready.
    pub async fn connect(config: SshConfig) -> Result<Self, ConnectError> {
        let id = Uuid::new_v4();
        let destination = config.destination();

        let key = match &config.key {
            KeySource::File(path) => {
                let path = args::expand_tilde(path);
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| ConnectError::KeyFile { path, source })?
            }
            KeySource::Inline(pem) => pem.clone().into_bytes(),
        };

        let workdir = tempfile::Builder::new()
            .prefix("revdeploy-")
            .tempdir()
            .map_err(ConnectError::Workdir)?;
        let key_path = workdir.path().join("id");
        write_private_file(&key_path, &key, 0o600).map_err(ConnectError::Workdir)?;
        let control_path = workdir.path().join("ctl");

        let mut cmd = client_command("ssh", &config);
        cmd.args(master_args(&config, &control_path, &key_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(passphrase) = &config.passphrase {
            let askpass = workdir.path().join("askpass");
            let script = format!("#!/bin/sh\nprintf '%s\\n' \"${ASKPASS_ENV}\"\n");
            write_private_file(&askpass, script.as_bytes(), 0o700)
                .map_err(ConnectError::Workdir)?;
            cmd.env("SSH_ASKPASS", &askpass)
                .env("SSH_ASKPASS_REQUIRE", "force")
                .env(ASKPASS_ENV, passphrase);
        }

        debug!(
            session = %id,
            destination = %destination,
            port = config.port,
            "connecting"
        );
        let mut master = cmd.spawn().map_err(ConnectError::Spawn)?;

        let deadline = tokio::time::Instant::now() + config.connect_timeout + READY_POLL_INTERVAL;
        loop {
            if master.try_wait().map_err(ConnectError::Spawn)?.is_some() {
                let mut stderr = String::new();
                if let Some(mut pipe) = master.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                return Err(classify_connect_failure(&destination, &stderr));
            }

            if master_alive(&config, &control_path, &key_path).await {
                break;
            }

            if tokio::time::Instant::now() >= deadline {
                let _ = master.kill().await;
                return Err(ConnectError::Timeout {
                    destination,
                    secs: config.connect_timeout.as_secs(),
                });
            }

            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        if let Some(stderr) = master.stderr.take() {
            tokio::spawn(drain_master_stderr(id, stderr));
        }

        debug!(session = %id, destination = %destination, "session ready");

        Ok(Self {
            id,
            config,
            destination,
            control_path,
            key_path,
            state: Mutex::new(SessionState::Open { master, workdir }),
        })
    }

    /// Session id used in log fields.
    pub fn id(&self) -> Uuid {
        self.id
    }

    async fn is_open(&self) -> bool {
        matches!(*self.state.lock().await, SessionState::Open { .. })
    }

    /// Returns true if the session is open and its master still answers.
    ///
    /// A lost master closes the session.
    pub(crate) async fn ensure_master(&self) -> bool {
        if !self.is_open().await {
            return false;
        }
        if master_alive(&self.config, &self.control_path, &self.key_path).await {
            return true;
        }
        warn!(session = %self.id, destination = %self.destination, "master connection lost");
        self.shutdown().await;
        false
    }

    /// Runs `command` over the master and captures its output.
    pub(crate) async fn exec(&self, command: &str) -> io::Result<Output> {
        client_command("ssh", &self.config)
            .args(mux_args(&self.config, &self.control_path, &self.key_path))
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
    }

    /// Runs an sftp batch over the master.
    pub(crate) async fn sftp_batch(&self, batch: &str) -> io::Result<Output> {
        let mut child = client_command("sftp", &self.config)
            .args(args::sftp_args(&self.config, &self.control_path, &self.key_path))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(batch.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        child.wait_with_output().await
    }

    async fn open_channel(&self) -> Result<SshFileChannel<'_>, ChannelError> {
        if !self.ensure_master().await {
            self.shutdown().await;
            return Err(ChannelError::NotReady);
        }

        // An empty batch is enough to make the server start the subsystem.
        let output = match self.sftp_batch("").await {
            Ok(output) => output,
            Err(e) => {
                self.shutdown().await;
                return Err(ChannelError::Spawn(e));
            }
        };

        if !output.status.success() {
            self.shutdown().await;
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ChannelError::Rejected(stderr));
        }

        debug!(session = %self.id, "file channel open");
        Ok(SshFileChannel::new(self))
    }

    async fn exec_command(&self, command_line: &str) -> Result<(), CommandError> {
        if !self.ensure_master().await {
            return Err(CommandError::Closed);
        }

        debug!(session = %self.id, command = %command_line, "running remote command");
        let output = self.exec(command_line).await.map_err(CommandError::Spawn)?;

        classify_exit(
            output.status.code(),
            command_line,
            &String::from_utf8_lossy(&output.stderr),
        )
    }

    /// Closes the master connection. Safe to call more than once.
    pub(crate) async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock().await, SessionState::Closed);
        let SessionState::Open {
            mut master,
            workdir,
        } = previous
        else {
            return;
        };

        let exited = client_command("ssh", &self.config)
            .args(control_args(&self.config, &self.control_path, &self.key_path, "exit"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|s| s.success());

        if !exited {
            warn!(session = %self.id, "control exit failed, killing master");
            let _ = master.start_kill();
        }

        if tokio::time::timeout(CLOSE_GRACE, master.wait()).await.is_err() {
            warn!(session = %self.id, "master did not exit in time, killing");
            let _ = master.kill().await;
        }

        drop(workdir);
        debug!(session = %self.id, destination = %self.destination, "session closed");
    }
}

impl RemoteSession for SshSession {
    fn open_file_channel(
        &self,
    ) -> BoxFuture<'_, Result<Box<dyn FileChannel + '_>, ChannelError>> {
        Box::pin(async move {
            let channel = self.open_channel().await?;
            Ok(Box::new(channel) as Box<dyn FileChannel + '_>)
        })
    }

    fn run_command<'a>(
        &'a self,
        command_line: &'a str,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(self.exec_command(command_line))
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.shutdown())
    }

    fn destination(&self) -> &str {
        &self.destination
    }
}

/// An ssh or sftp client with the session's agent environment.
fn client_command(program: &str, config: &SshConfig) -> Command {
    let mut cmd = Command::new(program);
    match &config.agent {
        Some(socket) => {
            cmd.env("SSH_AUTH_SOCK", socket);
        }
        None => {
            cmd.env_remove("SSH_AUTH_SOCK");
        }
    }
    cmd
}

/// Returns true if the master answers `ssh -O check`.
async fn master_alive(config: &SshConfig, control_path: &Path, key_path: &Path) -> bool {
    client_command("ssh", config)
        .args(control_args(config, control_path, key_path, "check"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|s| s.success())
}

async fn drain_master_stderr(id: Uuid, mut stderr: tokio::process::ChildStderr) {
    let mut buf = vec![0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    debug!(session = %id, "ssh: {}", line.trim());
                }
            }
        }
    }
}

fn write_private_file(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    // ssh refuses keys without a trailing newline in some formats.
    if !contents.ends_with(b"\n") {
        file.write_all(b"\n")?;
    }
    file.sync_all()
}
