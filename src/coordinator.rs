//! Fan-out of one module's checkout across target machines
//!
//! The coordinator builds the payload once, runs one checkout task per
//! target and collects every result. A failing machine never cancels its
//! siblings.

use crate::archive::{ArchiveArtifact, ArchiveBuilder};
use crate::channel::{Connector, TargetMachine};
use crate::checkout::{Checkout, CheckoutReport, Outcome, Payload};
use crate::config::Config;
use crate::error::{ExtsyncError, ExtsyncResult};
use crate::identity::ContentIdentity;
use futures_util::future::join_all;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Explicit settings for one coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Entries live at `<shared_root>/<module>/<identity>`
    pub shared_root: PathBuf,
    /// Directory for temporary archives on each target
    pub remote_tmp: PathBuf,
    /// Local directory for archive scratch space
    pub scratch_dir: Option<PathBuf>,
    /// tar exclude patterns applied to every archive
    pub excludes: Vec<String>,
}

impl SyncSettings {
    /// Settings for syncing to remote machines
    pub fn remote(config: &Config) -> Self {
        Self {
            shared_root: config.remote.shared_root.clone(),
            remote_tmp: config.remote.tmp_dir.clone(),
            scratch_dir: None,
            excludes: config.archive.exclude.clone(),
        }
    }

    /// Settings for local mode, with the cache resolved against `project_dir`
    pub fn local(config: &Config, project_dir: &Path) -> Self {
        let tmp = config
            .local
            .tmp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Self {
            shared_root: normalize(&project_dir.join(&config.local.cache_directory)),
            remote_tmp: tmp,
            scratch_dir: config.local.tmp_dir.clone(),
            excludes: config.archive.exclude.clone(),
        }
    }
}

/// Collapse `.` and `..` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Aggregate result of one module's sync
#[derive(Debug)]
pub struct SyncReport {
    pub module: String,
    pub identity: ContentIdentity,
    /// One report per target, in target order
    pub checkouts: Vec<CheckoutReport>,
}

impl SyncReport {
    /// True when every target completed or skipped
    pub fn is_success(&self) -> bool {
        self.checkouts.iter().all(|c| c.outcome.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckoutReport> {
        self.checkouts.iter().filter(|c| !c.outcome.is_success())
    }

    pub fn skipped(&self) -> usize {
        self.checkouts
            .iter()
            .filter(|c| matches!(c.outcome, Outcome::Skipped))
            .count()
    }

    pub fn completed(&self) -> usize {
        self.checkouts
            .iter()
            .filter(|c| matches!(c.outcome, Outcome::Completed))
            .count()
    }

    /// Turn any per-machine failure into a `SyncFailed` naming every failing host
    pub fn into_result(self) -> ExtsyncResult<Self> {
        let failures: Vec<String> = self
            .failures()
            .filter_map(|c| match &c.outcome {
                Outcome::Failed { step, error } => {
                    Some(format!("{} ({}): {}", c.host, step, error))
                }
                _ => None,
            })
            .collect();

        if failures.is_empty() {
            Ok(self)
        } else {
            Err(ExtsyncError::SyncFailed {
                module: self.module,
                failures,
            })
        }
    }
}

/// Runs checkouts for one module across many targets
pub struct SyncCoordinator {
    settings: SyncSettings,
    connector: Arc<dyn Connector>,
}

impl SyncCoordinator {
    pub fn new(settings: SyncSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings,
            connector,
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    /// Cache location of `module` at `identity`
    pub fn destination(&self, module: &str, identity: &ContentIdentity) -> PathBuf {
        self.settings
            .shared_root
            .join(module)
            .join(identity.as_str())
    }

    /// Archive builder carrying the configured excludes and scratch directory
    pub fn archive_builder(&self) -> ArchiveBuilder {
        let builder = ArchiveBuilder::new().excludes(self.settings.excludes.iter().cloned());
        match &self.settings.scratch_dir {
            Some(dir) => builder.scratch_dir(dir),
            None => builder,
        }
    }

    /// Package `source_tree` once and check it out on every target.
    ///
    /// Packaging errors abort the call before any machine is contacted;
    /// per-machine errors are collected in the report.
    pub async fn sync(
        &self,
        module: &str,
        source_tree: &Path,
        identity: &ContentIdentity,
        targets: &[TargetMachine],
    ) -> ExtsyncResult<SyncReport> {
        if targets.is_empty() {
            return Ok(self.empty_report(module, identity));
        }

        debug!(module = %module, "creating local archive of {}", source_tree.display());
        let artifact = self.archive_builder().build(source_tree).await?;
        Ok(self.sync_artifact(module, identity, targets, artifact).await)
    }

    /// Check out an already built archive on every target
    pub async fn sync_artifact(
        &self,
        module: &str,
        identity: &ContentIdentity,
        targets: &[TargetMachine],
        artifact: ArchiveArtifact,
    ) -> SyncReport {
        self.fan_out(module, identity, targets, Payload::Archive(artifact))
            .await
    }

    /// Link the cache entry on every target to an absolute local directory
    pub async fn link(
        &self,
        module: &str,
        source: &Path,
        identity: &ContentIdentity,
        targets: &[TargetMachine],
    ) -> ExtsyncResult<SyncReport> {
        let source = std::path::absolute(source)
            .map_err(|e| ExtsyncError::io(format!("resolving {}", source.display()), e))?;
        Ok(self
            .fan_out(module, identity, targets, Payload::Link { source })
            .await)
    }

    async fn fan_out(
        &self,
        module: &str,
        identity: &ContentIdentity,
        targets: &[TargetMachine],
        payload: Payload,
    ) -> SyncReport {
        let destination = self.destination(module, identity);
        let payload = Arc::new(payload);
        info!(module = %module, identity = %identity, "syncing to {} machine(s)", targets.len());

        let tasks = targets.iter().cloned().map(|target| {
            let connector = Arc::clone(&self.connector);
            let destination = destination.clone();
            let checkout = Checkout::new(
                module,
                identity.clone(),
                destination.clone(),
                self.settings.remote_tmp.clone(),
                Arc::clone(&payload),
            );
            tokio::spawn(async move {
                match connector.connect(&target).await {
                    Ok(channel) => checkout.run(channel).await,
                    Err(e) => {
                        warn!(host = %target.host, "Cannot connect: {}", e);
                        CheckoutReport::unreachable(target.host.clone(), destination, e)
                    }
                }
            })
        });

        let checkouts = join_all(tasks)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, target)| {
                joined.unwrap_or_else(|e| {
                    CheckoutReport::unreachable(
                        target.host.clone(),
                        destination.clone(),
                        ExtsyncError::Internal(format!("checkout task failed: {}", e)),
                    )
                })
            })
            .collect();

        SyncReport {
            module: module.to_string(),
            identity: identity.clone(),
            checkouts,
        }
    }

    fn empty_report(&self, module: &str, identity: &ContentIdentity) -> SyncReport {
        SyncReport {
            module: module.to_string(),
            identity: identity.clone(),
            checkouts: Vec::new(),
        }
    }
}
