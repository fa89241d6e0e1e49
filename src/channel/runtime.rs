//! Remote channel abstraction
//!
//! Provides a trait for the three primitives a checkout needs on a target
//! machine, implemented by different transports (OpenSSH, local filesystem).

use crate::channel::target::TargetMachine;
use crate::error::ExtsyncResult;
use async_trait::async_trait;
use std::path::Path;

/// Exit status and captured output of a remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatus {
    /// Exit code (-1 when terminated by a signal)
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandStatus {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub(crate) fn from_output(output: &std::process::Output) -> Self {
        Self {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// One live connection to a target machine
///
/// A channel is exclusively owned by one checkout. `close` must be called
/// on every exit path; implementations treat a second `close` as a no-op.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Machine this channel is connected to
    fn target(&self) -> &TargetMachine;

    /// Check whether a remote path exists (symlinks are not followed)
    async fn exists(&self, path: &Path) -> ExtsyncResult<bool>;

    /// Copy a local file to a remote path
    async fn upload(&self, local: &Path, remote: &Path) -> ExtsyncResult<()>;

    /// Run a POSIX shell command line and return its exit status.
    ///
    /// A non-zero status is returned as `Ok`; callers decide its meaning.
    async fn run_command(&self, command: &str) -> ExtsyncResult<CommandStatus>;

    /// Tear down the connection and its file-transfer sub-channel
    async fn close(&self) -> ExtsyncResult<()>;
}

/// Opens channels to target machines
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &TargetMachine) -> ExtsyncResult<Box<dyn RemoteChannel>>;
}
