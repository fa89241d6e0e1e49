//! Archive strategy: ship a local directory as a tarball

use crate::channel::TargetMachine;
use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::error::ExtsyncResult;
use crate::identity::{identify_async, ContentIdentity};
use crate::manifest::ModuleKind;
use crate::strategy::SyncStrategy;
use async_trait::async_trait;
use std::path::PathBuf;

/// Hashes a local directory and uploads it as one shared archive
#[derive(Debug, Clone)]
pub struct ArchiveStrategy {
    module: String,
    source: PathBuf,
}

impl ArchiveStrategy {
    pub fn new(module: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            source: source.into(),
        }
    }
}

#[async_trait]
impl SyncStrategy for ArchiveStrategy {
    fn module(&self) -> &str {
        &self.module
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Archive
    }

    async fn obtain_content_identity(&self) -> ExtsyncResult<ContentIdentity> {
        identify_async(self.source.clone()).await
    }

    async fn perform_sync(
        &self,
        coordinator: &SyncCoordinator,
        identity: &ContentIdentity,
        targets: &[TargetMachine],
    ) -> ExtsyncResult<SyncReport> {
        coordinator
            .sync(&self.module, &self.source, identity, targets)
            .await
    }
}
