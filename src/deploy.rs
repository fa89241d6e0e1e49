//! Deployment workflow
//!
//! Drives every module of a manifest through identity, sync and
//! activation. Activation points `<release>/<module>` at the synced cache
//! entry and only runs once the module synced on every target, so sync and
//! activation can be retried independently.

use crate::channel::{shell_quote, Connector, TargetMachine};
use crate::checkout::Outcome;
use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::error::{ExtsyncError, ExtsyncResult};
use crate::identity::ContentIdentity;
use crate::journal::Journal;
use crate::manifest::{Manifest, ModuleSpec};
use crate::strategy::resolve_strategy;
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of linking one module into the release on one target
#[derive(Debug)]
pub struct ActivationReport {
    pub host: String,
    pub link: PathBuf,
    pub error: Option<ExtsyncError>,
}

/// Sync and activation results for one module
#[derive(Debug)]
pub struct ModuleReport {
    pub sync: SyncReport,
    /// Empty when the sync failed on any target
    pub activations: Vec<ActivationReport>,
}

impl ModuleReport {
    pub fn is_success(&self) -> bool {
        self.sync.is_success()
            && self.activations.len() == self.sync.checkouts.len()
            && self.activations.iter().all(|a| a.error.is_none())
    }

    /// Human-readable `host: reason` lines for every failure
    pub fn failure_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .sync
            .failures()
            .filter_map(|c| match &c.outcome {
                Outcome::Failed { step, error } => {
                    Some(format!("{} ({}): {}", c.host, step, error))
                }
                _ => None,
            })
            .collect();
        lines.extend(self.activations.iter().filter_map(|a| {
            a.error
                .as_ref()
                .map(|e| format!("{} (activation): {}", a.host, e))
        }));
        lines
    }
}

/// Results for a whole manifest
#[derive(Debug, Default)]
pub struct DeploymentReport {
    pub modules: Vec<ModuleReport>,
}

impl DeploymentReport {
    pub fn is_success(&self) -> bool {
        self.modules.iter().all(ModuleReport::is_success)
    }

    /// Fail with every failing module and machine
    pub fn into_result(self) -> ExtsyncResult<Self> {
        let failing: Vec<&ModuleReport> = self.modules.iter().filter(|m| !m.is_success()).collect();
        if failing.is_empty() {
            return Ok(self);
        }

        let module = failing
            .iter()
            .map(|m| m.sync.module.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let failures = failing.iter().flat_map(|m| m.failure_lines()).collect();
        Err(ExtsyncError::SyncFailed { module, failures })
    }
}

/// Presence of one module's cache entry on one target
#[derive(Debug)]
pub struct PresenceReport {
    pub module: String,
    pub identity: ContentIdentity,
    pub host: String,
    pub destination: PathBuf,
    pub present: ExtsyncResult<bool>,
}

/// Applies a manifest to a set of targets
pub struct Deployment {
    coordinator: SyncCoordinator,
    targets: Vec<TargetMachine>,
    release_root: PathBuf,
    local_mode: bool,
    journal: Option<Journal>,
}

impl Deployment {
    pub fn new(coordinator: SyncCoordinator, targets: Vec<TargetMachine>, release_root: PathBuf) -> Self {
        Self {
            coordinator,
            targets,
            release_root,
            local_mode: false,
            journal: None,
        }
    }

    /// Link `local` modules instead of archiving them
    pub fn local_mode(mut self, enabled: bool) -> Self {
        self.local_mode = enabled;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn targets(&self) -> &[TargetMachine] {
        &self.targets
    }

    /// Sync and activate every module in order.
    ///
    /// Machine failures are collected in the report; identity and packaging
    /// failures abort the run.
    pub async fn run(&self, manifest: &Manifest) -> ExtsyncResult<DeploymentReport> {
        let mut report = DeploymentReport::default();
        for spec in manifest.modules() {
            report.modules.push(self.setup_module(spec).await?);
        }
        Ok(report)
    }

    /// Sync and activate one module
    pub async fn setup_module(&self, spec: &ModuleSpec) -> ExtsyncResult<ModuleReport> {
        info!(module = %spec.path, "configuring {}", spec.path);
        let strategy = resolve_strategy(spec, self.local_mode)?;
        let identity = strategy.obtain_content_identity().await?;
        debug!(module = %spec.path, kind = %strategy.kind(), "identity {}", identity);

        if let Some(journal) = &self.journal {
            journal
                .sync_started(&spec.path, identity.as_str(), self.targets.len())
                .await;
        }

        let sync = strategy
            .perform_sync(&self.coordinator, &identity, &self.targets)
            .await?;

        if let Some(journal) = &self.journal {
            journal.sync_finished(&sync).await;
        }

        let activations = if sync.is_success() {
            self.activate(&spec.path, &identity).await
        } else {
            warn!(module = %spec.path, "Sync failed, leaving release links untouched");
            Vec::new()
        };

        Ok(ModuleReport { sync, activations })
    }

    /// Report whether each module's current identity is present on each target
    pub async fn check(&self, manifest: &Manifest) -> ExtsyncResult<Vec<PresenceReport>> {
        let connector = self.coordinator.connector();
        let mut reports = Vec::new();

        for spec in manifest.modules() {
            let strategy = resolve_strategy(spec, self.local_mode)?;
            let identity = strategy.obtain_content_identity().await?;
            let destination = self.coordinator.destination(&spec.path, &identity);

            let lookups = self.targets.iter().map(|target| {
                let connector = Arc::clone(&connector);
                let strategy = &strategy;
                let destination = &destination;
                async move {
                    let channel = connector.connect(target).await?;
                    let present = strategy.check_existence(channel.as_ref(), destination).await;
                    if let Err(e) = channel.close().await {
                        warn!(host = %target.host, "Failed to close channel: {}", e);
                    }
                    present
                }
            });

            for (target, present) in self.targets.iter().zip(join_all(lookups).await) {
                reports.push(PresenceReport {
                    module: spec.path.clone(),
                    identity: identity.clone(),
                    host: target.host.clone(),
                    destination: destination.clone(),
                    present,
                });
            }
        }

        Ok(reports)
    }

    async fn activate(&self, module: &str, identity: &ContentIdentity) -> Vec<ActivationReport> {
        let connector = self.coordinator.connector();
        let destination = self.coordinator.destination(module, identity);
        let link = self.release_root.join(module);
        let command = activation_command(&destination, &link);

        let runs = self.targets.iter().map(|target| {
            let connector = Arc::clone(&connector);
            let command = command.as_str();
            let link = link.clone();
            async move {
                let error = run_on(connector.as_ref(), target, command).await.err();
                if let Some(e) = &error {
                    warn!(host = %target.host, "Activation failed: {}", e);
                }
                ActivationReport {
                    host: target.host.clone(),
                    link,
                    error,
                }
            }
        });

        join_all(runs).await
    }
}

async fn run_on(connector: &dyn Connector, target: &TargetMachine, command: &str) -> ExtsyncResult<()> {
    let channel = connector.connect(target).await?;
    debug!(host = %target.host, "executing: {}", command);
    let result = channel.run_command(command).await;
    if let Err(e) = channel.close().await {
        warn!(host = %target.host, "Failed to close channel: {}", e);
    }

    let status = result?;
    if status.success() {
        Ok(())
    } else {
        Err(ExtsyncError::RemoteCommand {
            host: target.host.clone(),
            command: command.to_string(),
            code: status.code,
            stderr: status.stderr.trim().to_string(),
        })
    }
}

/// Replace whatever sits at `link` with a symlink to `destination`
pub fn activation_command(destination: &Path, link: &Path) -> String {
    let parent = link.parent().unwrap_or_else(|| Path::new("/"));
    let link = shell_quote(&link.to_string_lossy());
    format!(
        "mkdir -p {} && rm -rf {} && ln -nsf {} {}",
        shell_quote(&parent.to_string_lossy()),
        link,
        shell_quote(&destination.to_string_lossy()),
        link
    )
}
