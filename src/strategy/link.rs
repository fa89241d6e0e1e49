//! Link strategy: point the cache entry at a local directory
//!
//! Only meaningful when every target sees the source path, i.e. local mode
//! or a shared filesystem.

use crate::channel::TargetMachine;
use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::error::ExtsyncResult;
use crate::identity::{identify_async, ContentIdentity};
use crate::manifest::ModuleKind;
use crate::strategy::SyncStrategy;
use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LinkStrategy {
    module: String,
    source: PathBuf,
}

impl LinkStrategy {
    pub fn new(module: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            source: source.into(),
        }
    }
}

#[async_trait]
impl SyncStrategy for LinkStrategy {
    fn module(&self) -> &str {
        &self.module
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Link
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
            .link(&self.module, &self.source, identity, targets)
            .await
    }
}
