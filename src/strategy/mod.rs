//! Module sync strategies
//!
//! Each manifest entry is handled by one strategy chosen from its `type`:
//! - `ArchiveStrategy`: hash a local directory, ship it as an archive
//! - `LinkStrategy`: hash a local directory, symlink it in place
//! - `GitStrategy`: resolve a revision, check it out locally, ship it

mod archive;
mod git;
mod link;

pub use archive::ArchiveStrategy;
pub use git::GitStrategy;
pub use link::LinkStrategy;

use crate::channel::{RemoteChannel, TargetMachine};
use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::error::{ExtsyncError, ExtsyncResult};
use crate::identity::ContentIdentity;
use crate::manifest::{ModuleKind, ModuleSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// How one module obtains its identity and reaches its targets
#[async_trait]
pub trait SyncStrategy: Send + Sync {
    /// Module path this strategy serves
    fn module(&self) -> &str;

    /// Effective module kind after mode resolution
    fn kind(&self) -> ModuleKind;

    /// Compute the identity the module's content resolves to
    async fn obtain_content_identity(&self) -> ExtsyncResult<ContentIdentity>;

    /// Whether the cache entry is already present on a target
    async fn check_existence(
        &self,
        channel: &dyn RemoteChannel,
        destination: &Path,
    ) -> ExtsyncResult<bool> {
        channel.exists(destination).await
    }

    /// Make the module available at `identity` on every target
    async fn perform_sync(
        &self,
        coordinator: &SyncCoordinator,
        identity: &ContentIdentity,
        targets: &[TargetMachine],
    ) -> ExtsyncResult<SyncReport>;
}

/// Pick the strategy for a manifest entry.
///
/// `local` modules link in local mode and ship archives otherwise.
pub fn resolve_strategy(spec: &ModuleSpec, local_mode: bool) -> ExtsyncResult<Box<dyn SyncStrategy>> {
    let strategy: Box<dyn SyncStrategy> = match spec.kind {
        ModuleKind::Git => {
            let repository = spec.repository.clone().ok_or_else(|| {
                ExtsyncError::User(format!("{}: git module without a repository", spec.path))
            })?;
            Box::new(GitStrategy::new(&spec.path, repository, spec.revision.clone()))
        }
        ModuleKind::Link => Box::new(LinkStrategy::new(&spec.path, require_source(spec)?)),
        ModuleKind::Archive => Box::new(ArchiveStrategy::new(&spec.path, require_source(spec)?)),
        ModuleKind::Local if local_mode => {
            Box::new(LinkStrategy::new(&spec.path, require_source(spec)?))
        }
        ModuleKind::Local => Box::new(ArchiveStrategy::new(&spec.path, require_source(spec)?)),
    };
    Ok(strategy)
}

fn require_source(spec: &ModuleSpec) -> ExtsyncResult<PathBuf> {
    spec.source.clone().ok_or_else(|| {
        ExtsyncError::User(format!("{}: {} module without a source", spec.path, spec.kind))
    })
}
