//! OpenSSH channel
//!
//! Implements the RemoteChannel trait with the system `ssh` and `sftp`
//! clients. One multiplexed master connection is opened per channel; every
//! command and transfer rides on it through the control socket.

use crate::channel::runtime::{CommandStatus, RemoteChannel};
use crate::channel::target::TargetMachine;
use crate::config::schema::SshConfig;
use crate::error::{ExtsyncError, ExtsyncResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::shell_quote;

/// Exit code ssh reserves for its own failures
const SSH_ERROR_EXIT: i32 = 255;

/// Client binary used for the master, commands and teardown
const SSH_PROGRAM: &str = "ssh";

/// Stderr marker for host-key verification failures
const HOST_KEY_VERIFICATION_FAILED: &str = "Host key verification failed";

/// Channel over a multiplexed OpenSSH connection
pub struct SshChannel {
    target: TargetMachine,
    config: SshConfig,
    program: PathBuf,
    control_path: PathBuf,
    closed: AtomicBool,
    control_dir: TempDir,
}

impl SshChannel {
    /// Open the master connection to `target`.
    pub async fn connect(target: TargetMachine, config: SshConfig) -> ExtsyncResult<Self> {
        Self::connect_with(SSH_PROGRAM.into(), target, config).await
    }

    async fn connect_with(program: PathBuf, target: TargetMachine, config: SshConfig) -> ExtsyncResult<Self> {
        let control_dir = tempfile::Builder::new()
            .prefix("extsync-ssh-")
            .tempdir()
            .map_err(|e| ExtsyncError::io("creating ssh control directory", e))?;
        let control_path = control_dir.path().join("ctl");

        let target = Self::apply_defaults(target, &config);
        let channel = Self {
            target,
            config,
            program,
            control_path,
            closed: AtomicBool::new(false),
            control_dir,
        };

        // A persisting master inherits the client's stderr; a pipe would stay
        // open until the master exits, so it writes to a file instead.
        let log_path = channel.control_dir.path().join("master.log");
        let log = std::fs::File::create(&log_path)
            .map_err(|e| ExtsyncError::io("creating ssh master log", e))?;

        debug!("Opening ssh master connection to {}", channel.target);
        let status = channel
            .ssh_command()
            .args(["-o", "ControlMaster=yes", "-o", "ControlPersist=yes", "--"])
            .arg(channel.target.destination())
            .arg("true")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .status()
            .await
            .map_err(|e| ExtsyncError::channel(&channel.target.host, format!("cannot run ssh: {}", e)))?;

        if !status.success() {
            let stderr = tokio::fs::read_to_string(&log_path).await.unwrap_or_default();
            let reason = if stderr.contains(HOST_KEY_VERIFICATION_FAILED) {
                "host key verification failed (add the host to ~/.ssh/known_hosts first)".to_string()
            } else {
                format!("connection failed: {}", stderr.trim())
            };
            // Nothing to tear down when the master never came up
            channel.closed.store(true, Ordering::SeqCst);
            return Err(ExtsyncError::channel(&channel.target.host, reason));
        }

        Ok(channel)
    }

    fn apply_defaults(mut target: TargetMachine, config: &SshConfig) -> TargetMachine {
        if target.user.is_none() {
            target.user = config.user.clone();
        }
        if target.port.is_none() {
            target.port = config.port;
        }
        target
    }

    /// Options shared by every ssh/sftp invocation
    fn common_options(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
        ];
        for option in &self.config.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args
    }

    fn ssh_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.common_options());
        if let Some(port) = self.target.port {
            cmd.arg("-p").arg(port.to_string());
        }
        cmd.kill_on_drop(true);
        cmd
    }

    fn sftp_command(&self) -> Command {
        let mut cmd = Command::new("sftp");
        cmd.arg("-q").args(["-b", "-"]).args(self.common_options());
        if let Some(port) = self.target.port {
            cmd.arg("-P").arg(port.to_string());
        }
        cmd.kill_on_drop(true);
        cmd
    }

    async fn exec(&self, command: &str) -> ExtsyncResult<CommandStatus> {
        let output = self
            .ssh_command()
            .args(["-o", "ControlMaster=no", "--"])
            .arg(self.target.destination())
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExtsyncError::channel(&self.target.host, format!("cannot run ssh: {}", e)))?;

        let status = CommandStatus::from_output(&output);
        if status.code == SSH_ERROR_EXIT {
            return Err(ExtsyncError::channel(
                &self.target.host,
                format!("ssh failed: {}", status.stderr.trim()),
            ));
        }
        Ok(status)
    }

    /// Ask the master to exit; used by `close` and on drop
    fn exit_args(&self) -> Vec<String> {
        let mut args = self.common_options();
        args.extend(["-O".to_string(), "exit".to_string(), self.target.destination()]);
        args
    }
}

/// Quote a path for an sftp batch line
fn sftp_quote(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[async_trait]
impl RemoteChannel for SshChannel {
    fn target(&self) -> &TargetMachine {
        &self.target
    }

    async fn exists(&self, path: &Path) -> ExtsyncResult<bool> {
        let quoted = shell_quote(&path.to_string_lossy());
        let status = self
            .exec(&format!("test -e {} || test -h {}", quoted, quoted))
            .await?;
        match status.code {
            0 => Ok(true),
            1 => Ok(false),
            code => Err(ExtsyncError::channel(
                &self.target.host,
                format!("stat {} exited with {}: {}", path.display(), code, status.stderr.trim()),
            )),
        }
    }

    async fn upload(&self, local: &Path, remote: &Path) -> ExtsyncResult<()> {
        let transfer_error = |reason: String| ExtsyncError::Transfer {
            host: self.target.host.clone(),
            path: remote.display().to_string(),
            reason,
        };

        debug!("Uploading {} to {}:{}", local.display(), self.target, remote.display());
        let mut child = self
            .sftp_command()
            .arg(self.target.destination())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| transfer_error(format!("cannot run sftp: {}", e)))?;

        let batch = format!("put {} {}\n", sftp_quote(local), sftp_quote(remote));
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(batch.as_bytes())
                .await
                .map_err(|e| transfer_error(format!("writing sftp batch: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| transfer_error(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(transfer_error(format!(
                "sftp exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )))
        }
    }

    async fn run_command(&self, command: &str) -> ExtsyncResult<CommandStatus> {
        debug!("Executing on {}: {}", self.target, command);
        self.exec(command).await
    }

    async fn close(&self) -> ExtsyncResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        debug!("Closing ssh master connection to {}", self.target);
        let output = Command::new(&self.program)
            .args(self.exit_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExtsyncError::channel(&self.target.host, format!("cannot run ssh: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ExtsyncError::channel(
                &self.target.host,
                format!("closing connection: {}", stderr.trim()),
            ))
        }
    }
}

impl Drop for SshChannel {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        // Cancelled or panicked before close; don't leave the master behind
        warn!("ssh channel to {} dropped without close", self.target);
        let _ = std::process::Command::new(&self.program)
            .args(self.exit_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}
