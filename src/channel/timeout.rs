//! Deadlines around channel primitives
//!
//! Timeout policy is deployment-specific, so it lives in a wrapper rather
//! than in the checkout state machine. Expired operations are dropped,
//! which kills their client process.

use crate::channel::runtime::{CommandStatus, RemoteChannel};
use crate::channel::target::TargetMachine;
use crate::config::schema::TimeoutConfig;
use crate::error::{ExtsyncError, ExtsyncResult};
use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Per-primitive deadlines (`None` = wait forever)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Option<Duration>,
    pub exists: Option<Duration>,
    pub upload: Option<Duration>,
    pub command: Option<Duration>,
}

impl Timeouts {
    pub fn is_unbounded(&self) -> bool {
        self.connect.is_none()
            && self.exists.is_none()
            && self.upload.is_none()
            && self.command.is_none()
    }
}

impl From<&TimeoutConfig> for Timeouts {
    fn from(config: &TimeoutConfig) -> Self {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        Self {
            connect: secs(config.connect_secs),
            exists: secs(config.exists_secs),
            upload: secs(config.upload_secs),
            command: secs(config.command_secs),
        }
    }
}

/// Channel wrapper enforcing `Timeouts`
pub struct TimeoutChannel {
    inner: Box<dyn RemoteChannel>,
    timeouts: Timeouts,
}

impl TimeoutChannel {
    pub fn new(inner: Box<dyn RemoteChannel>, timeouts: Timeouts) -> Self {
        Self { inner, timeouts }
    }
}

/// Run `fut` under an optional deadline, mapping expiry to `ExtsyncError::Timeout`
pub async fn with_deadline<T>(
    host: &str,
    operation: &'static str,
    limit: Option<Duration>,
    fut: impl Future<Output = ExtsyncResult<T>>,
) -> ExtsyncResult<T> {
    let Some(limit) = limit else {
        return fut.await;
    };
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ExtsyncError::Timeout {
            host: host.to_string(),
            operation,
            secs: limit.as_secs(),
        })?
}

#[async_trait]
impl RemoteChannel for TimeoutChannel {
    fn target(&self) -> &TargetMachine {
        self.inner.target()
    }

    async fn exists(&self, path: &Path) -> ExtsyncResult<bool> {
        with_deadline(&self.inner.target().host, "existence check", self.timeouts.exists, self.inner.exists(path)).await
    }

    async fn upload(&self, local: &Path, remote: &Path) -> ExtsyncResult<()> {
        with_deadline(&self.inner.target().host, "upload", self.timeouts.upload, self.inner.upload(local, remote)).await
    }

    async fn run_command(&self, command: &str) -> ExtsyncResult<CommandStatus> {
        with_deadline(&self.inner.target().host, "remote command", self.timeouts.command, self.inner.run_command(command)).await
    }

    async fn close(&self) -> ExtsyncResult<()> {
        self.inner.close().await
    }
}
