//! Sync journal
//!
//! Appends one JSON line per sync event to
//! `~/.local/state/extsync/journal.log`, tagged with the run id so the
//! events of one `extsync setup` can be grouped.

use crate::checkout::Outcome;
use crate::config::{schema::Config, ConfigManager};
use crate::coordinator::SyncReport;
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// Append-only JSON-lines event log
pub struct Journal {
    enabled: bool,
    path: PathBuf,
    run_id: Uuid,
}

impl Journal {
    /// Create a journal for one run from config
    pub fn new(config: &Config) -> Self {
        Self::at(ConfigManager::journal_path(), config.general.journal)
    }

    /// Create a journal writing to `path`
    pub fn at(path: PathBuf, enabled: bool) -> Self {
        Self {
            enabled,
            path,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record an event. IO failures are logged and swallowed.
    pub async fn record(&self, event: &str, data: serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "run_id": self.run_id.to_string(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write journal {}: {}", self.path.display(), e);
        }
    }

    /// Record `sync.started` for a module
    pub async fn sync_started(&self, module: &str, identity: &str, targets: usize) {
        self.record(
            "sync.started",
            serde_json::json!({ "module": module, "identity": identity, "targets": targets }),
        )
        .await;
    }

    /// Record one event per checkout followed by `sync.finished`
    pub async fn sync_finished(&self, report: &SyncReport) {
        for checkout in &report.checkouts {
            let (event, error, retryable) = match &checkout.outcome {
                Outcome::Completed => ("checkout.completed", None, None),
                Outcome::Skipped => ("checkout.skipped", None, None),
                Outcome::Failed { step, error } => (
                    "checkout.failed",
                    Some(format!("{}: {}", step, error)),
                    Some(error.is_retryable()),
                ),
            };
            self.record(
                event,
                serde_json::json!({
                    "module": report.module,
                    "host": checkout.host,
                    "destination": checkout.destination.display().to_string(),
                    "error": error,
                    "retryable": retryable,
                }),
            )
            .await;
        }

        self.record(
            "sync.finished",
            serde_json::json!({
                "module": report.module,
                "identity": report.identity.as_str(),
                "success": report.is_success(),
            }),
        )
        .await;
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
