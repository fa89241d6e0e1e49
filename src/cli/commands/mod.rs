//! CLI command implementations

pub mod check;
pub mod config;
pub mod identify;
pub mod setup;

pub use check::execute as check;
pub use config::execute as config;
pub use identify::execute as identify;
pub use setup::execute as setup;

use crate::channel::{DefaultConnector, TargetMachine};
use crate::cli::args::TargetArgs;
use crate::config::Config;
use crate::coordinator::{SyncCoordinator, SyncSettings};
use crate::deploy::Deployment;
use crate::error::{ExtsyncError, ExtsyncResult};
use crate::manifest::{Manifest, MANIFEST_FILE};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Manifest named on the command line, or the first conventional one that exists
fn manifest_path(args: &TargetArgs, cwd: &Path) -> PathBuf {
    if let Some(path) = &args.manifest {
        return cwd.join(path);
    }
    let candidates = [cwd.join(MANIFEST_FILE), cwd.join("config").join(MANIFEST_FILE)];
    candidates
        .iter()
        .find(|p| p.is_file())
        .unwrap_or(&candidates[0])
        .clone()
}

pub(crate) async fn load_manifest(args: &TargetArgs, cwd: &Path) -> ExtsyncResult<Manifest> {
    Manifest::from_file(&manifest_path(args, cwd)).await
}

/// Build the deployment described by the target arguments.
///
/// Local mode uses the single `local` target, caches next to the project
/// and links into the project directory itself.
pub(crate) fn build_deployment(
    args: &TargetArgs,
    release: Option<&Path>,
    config: &Config,
    cwd: &Path,
) -> ExtsyncResult<Deployment> {
    let connector = Arc::new(DefaultConnector::from_config(config));

    if args.local {
        let coordinator = SyncCoordinator::new(SyncSettings::local(config, cwd), connector);
        return Ok(
            Deployment::new(coordinator, vec![TargetMachine::local()], cwd.to_path_buf())
                .local_mode(true),
        );
    }

    if args.targets.is_empty() {
        return Err(ExtsyncError::User(
            "No target machines given; pass --target or --local".to_string(),
        ));
    }
    let targets = args
        .targets
        .iter()
        .map(|t| t.parse())
        .collect::<ExtsyncResult<Vec<TargetMachine>>>()?;

    let coordinator = SyncCoordinator::new(SyncSettings::remote(config), connector);
    let release = release.map(Path::to_path_buf).unwrap_or_default();
    Ok(Deployment::new(coordinator, targets, release))
}

pub(crate) fn current_dir() -> ExtsyncResult<PathBuf> {
    std::env::current_dir().map_err(|e| ExtsyncError::io("getting current directory", e))
}
