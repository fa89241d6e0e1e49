//! Per-machine checkout state machine
//!
//! A checkout makes one module's content available at
//! `<shared_root>/<module>/<identity>` on one target machine:
//!
//! ```text
//! Pending -> CheckingDestination -> Skipped
//!                                -> Transferring -> Extracting -> Completed
//!                                -> Extracting (link payloads) -> Completed
//! any non-terminal state         -> Failed
//! ```
//!
//! The existence check is the only idempotency signal. A failing remote
//! command whose destination exists afterwards lost a race against another
//! deploy and is reported as Completed.

use crate::archive::ArchiveArtifact;
use crate::channel::{shell_quote, RemoteChannel};
use crate::error::{ExtsyncError, ExtsyncResult};
use crate::identity::ContentIdentity;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle of a checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Pending,
    CheckingDestination,
    Skipped,
    Transferring,
    Extracting,
    Completed,
    Failed,
}

impl CheckoutState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        match (self, next) {
            (_, Failed) => !self.is_terminal(),
            (Pending, CheckingDestination) => true,
            (CheckingDestination, Skipped | Transferring | Extracting) => true,
            (Transferring, Extracting) => true,
            (Extracting, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::CheckingDestination => "checking destination",
            Self::Skipped => "skipped",
            Self::Transferring => "transferring",
            Self::Extracting => "extracting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a checkout materializes when the destination is missing
#[derive(Debug)]
pub enum Payload {
    /// Upload a shared archive and unpack it
    Archive(ArchiveArtifact),
    /// Point a symlink at an absolute local directory
    Link { source: PathBuf },
}

/// Terminal result of one checkout
#[derive(Debug)]
pub enum Outcome {
    Completed,
    Skipped,
    Failed {
        /// State the checkout was in when it failed
        step: CheckoutState,
        error: ExtsyncError,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Report for one target machine
#[derive(Debug)]
pub struct CheckoutReport {
    pub host: String,
    pub destination: PathBuf,
    pub outcome: Outcome,
    /// Every state visited, starting with Pending
    pub history: Vec<CheckoutState>,
}

impl CheckoutReport {
    /// Report for a machine that never got a channel
    pub fn unreachable(host: impl Into<String>, destination: PathBuf, error: ExtsyncError) -> Self {
        Self {
            host: host.into(),
            destination,
            outcome: Outcome::Failed {
                step: CheckoutState::Pending,
                error,
            },
            history: vec![CheckoutState::Pending, CheckoutState::Failed],
        }
    }
}

/// One module on one target machine
pub struct Checkout {
    module: String,
    identity: ContentIdentity,
    destination: PathBuf,
    remote_tmp: PathBuf,
    payload: Arc<Payload>,
    state: CheckoutState,
    history: Vec<CheckoutState>,
}

impl Checkout {
    pub fn new(
        module: impl Into<String>,
        identity: ContentIdentity,
        destination: PathBuf,
        remote_tmp: PathBuf,
        payload: Arc<Payload>,
    ) -> Self {
        Self {
            module: module.into(),
            identity,
            destination,
            remote_tmp,
            payload,
            state: CheckoutState::Pending,
            history: vec![CheckoutState::Pending],
        }
    }

    /// Drive the checkout to a terminal state, closing `channel` on every path.
    pub async fn run(mut self, channel: Box<dyn RemoteChannel>) -> CheckoutReport {
        let host = channel.target().host.clone();
        let result = self.drive(channel.as_ref()).await;

        if let Err(e) = channel.close().await {
            warn!(host = %host, "Failed to close channel: {}", e);
        }

        let outcome = match result {
            Ok(()) if self.state == CheckoutState::Skipped => Outcome::Skipped,
            Ok(()) => Outcome::Completed,
            Err(error) => {
                let step = self.state;
                self.state = CheckoutState::Failed;
                self.history.push(CheckoutState::Failed);
                warn!(host = %host, module = %self.module, "Checkout failed while {}: {}", step, error);
                Outcome::Failed { step, error }
            }
        };

        CheckoutReport {
            host,
            destination: self.destination,
            outcome,
            history: self.history,
        }
    }

    async fn drive(&mut self, channel: &dyn RemoteChannel) -> ExtsyncResult<()> {
        self.transition(CheckoutState::CheckingDestination)?;
        if channel.exists(&self.destination).await? {
            info!(
                host = %channel.target().host,
                "already exists, skipping: {}",
                self.destination.display()
            );
            return self.transition(CheckoutState::Skipped);
        }

        let payload = Arc::clone(&self.payload);
        let command = match payload.as_ref() {
            Payload::Archive(artifact) => {
                self.transition(CheckoutState::Transferring)?;
                let remote_archive = self.remote_archive();
                debug!(host = %channel.target().host, "uploading: {}", remote_archive.display());
                channel.upload(artifact.path(), &remote_archive).await?;

                self.transition(CheckoutState::Extracting)?;
                extract_command(&self.destination, &remote_archive, artifact.root_name())
            }
            Payload::Link { source } => {
                self.transition(CheckoutState::Extracting)?;
                link_command(source, &self.destination)
            }
        };

        self.execute(channel, &command).await?;
        self.transition(CheckoutState::Completed)
    }

    async fn execute(&self, channel: &dyn RemoteChannel, command: &str) -> ExtsyncResult<()> {
        let host = &channel.target().host;
        debug!(host = %host, "executing: {}", command);
        let status = channel.run_command(command).await?;
        if status.success() {
            return Ok(());
        }

        if channel.exists(&self.destination).await.unwrap_or(false) {
            info!(
                host = %host,
                "{} appeared during extraction, treating as complete",
                self.destination.display()
            );
            return Ok(());
        }

        Err(ExtsyncError::RemoteCommand {
            host: host.clone(),
            command: command.to_string(),
            code: status.code,
            stderr: status.stderr.trim().to_string(),
        })
    }

    fn transition(&mut self, next: CheckoutState) -> ExtsyncResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ExtsyncError::Internal(format!(
                "illegal checkout transition {} -> {}",
                self.state, next
            )));
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Temporary archive on the target, unique per module and identity
    fn remote_archive(&self) -> PathBuf {
        let module_name = Path::new(&self.module)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".to_string());
        self.remote_tmp
            .join(format!("{}-{}.tgz", module_name, self.identity))
    }
}

/// Unpack `archive` next to `destination` and rename its root to the final name.
///
/// Extraction happens in a private staging directory so concurrent syncs of
/// the same module never see each other's partial trees. The staging
/// directory and the archive are removed whatever the outcome, and the
/// command exits with the status of the extract/rename step.
pub fn extract_command(destination: &Path, archive: &Path, root_name: &str) -> String {
    let parent = destination.parent().unwrap_or_else(|| Path::new("/"));
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = shell_quote(&parent.to_string_lossy());
    let name = shell_quote(&name);
    let archive = shell_quote(&archive.to_string_lossy());
    let root = shell_quote(root_name);

    format!(
        "mkdir -p {parent} && cd {parent} && staging=$(mktemp -d ./.extsync.XXXXXX) && \
         tar xzf {archive} -C \"$staging\" && \
         {{ [ -e {name} ] || mv \"$staging\"/{root} {name}; }}; \
         status=$?; rm -rf \"$staging\" {archive}; exit $status"
    )
}

/// Link `destination` to an absolute local `source`
pub fn link_command(source: &Path, destination: &Path) -> String {
    let parent = destination.parent().unwrap_or_else(|| Path::new("/"));
    format!(
        "mkdir -p {} && ln -nsf {} {}",
        shell_quote(&parent.to_string_lossy()),
        shell_quote(&source.to_string_lossy()),
        shell_quote(&destination.to_string_lossy())
    )
}
