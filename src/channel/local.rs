//! Local-filesystem channel
//!
//! Implements the RemoteChannel trait against the machine running extsync.
//! Used for local-mode setups and wherever a real filesystem is needed
//! without an SSH server.

use crate::channel::runtime::{CommandStatus, RemoteChannel};
use crate::channel::target::TargetMachine;
use crate::error::{ExtsyncError, ExtsyncResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

/// Channel operating on the local filesystem
pub struct LocalChannel {
    target: TargetMachine,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self {
            target: TargetMachine::local(),
        }
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteChannel for LocalChannel {
    fn target(&self) -> &TargetMachine {
        &self.target
    }

    async fn exists(&self, path: &Path) -> ExtsyncResult<bool> {
        match fs::symlink_metadata(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ExtsyncError::channel(
                &self.target.host,
                format!("stat {}: {}", path.display(), e),
            )),
        }
    }

    async fn upload(&self, local: &Path, remote: &Path) -> ExtsyncResult<()> {
        debug!("Copying {} to {}", local.display(), remote.display());
        fs::copy(local, remote)
            .await
            .map(|_| ())
            .map_err(|e| ExtsyncError::Transfer {
                host: self.target.host.clone(),
                path: remote.display().to_string(),
                reason: e.to_string(),
            })
    }

    async fn run_command(&self, command: &str) -> ExtsyncResult<CommandStatus> {
        debug!("Executing locally: {}", command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtsyncError::channel(&self.target.host, format!("cannot run sh: {}", e)))?;

        Ok(CommandStatus::from_output(&output))
    }

    async fn close(&self) -> ExtsyncResult<()> {
        Ok(())
    }
}
