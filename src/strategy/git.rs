//! Git strategy: ship a repository at a resolved commit
//!
//! The identity is the commit id, so resolving it needs only
//! `git ls-remote`. The checkout itself happens locally in a scratch
//! directory and is shipped like any other archive, without `.git`.

use crate::channel::TargetMachine;
use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::error::{ExtsyncError, ExtsyncResult};
use crate::identity::ContentIdentity;
use crate::manifest::ModuleKind;
use crate::strategy::SyncStrategy;
use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

const DEFAULT_REVISION: &str = "HEAD";

#[derive(Debug, Clone)]
pub struct GitStrategy {
    module: String,
    repository: String,
    revision: String,
}

impl GitStrategy {
    pub fn new(module: impl Into<String>, repository: impl Into<String>, revision: Option<String>) -> Self {
        Self {
            module: module.into(),
            repository: repository.into(),
            revision: revision.unwrap_or_else(|| DEFAULT_REVISION.to_string()),
        }
    }

    async fn git(args: &[&str]) -> ExtsyncResult<Output> {
        debug!("Executing: git {:?}", args);
        let output = Command::new("git")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtsyncError::command_failed(format!("git {}", args.join(" ")), e))?;

        if !output.status.success() {
            return Err(ExtsyncError::command_exec(
                format!("git {}", args.join(" ")),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(output)
    }

    /// Clone the repository into `dir` and detach at `commit`
    async fn checkout(&self, commit: &str, dir: &Path) -> ExtsyncResult<()> {
        let dir = dir.to_string_lossy();
        Self::git(&["clone", "--quiet", "--no-checkout", "--", &self.repository, &dir]).await?;
        Self::git(&["-C", &dir, "checkout", "--quiet", "--detach", commit]).await?;
        Ok(())
    }
}

/// Whether `revision` already names a full commit id
fn is_full_commit(revision: &str) -> bool {
    revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit())
}

/// Pick the commit from `git ls-remote` output, preferring peeled tags
fn parse_ls_remote(output: &str) -> Option<&str> {
    let mut first = None;
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(commit), Some(reference)) = (fields.next(), fields.next()) else {
            continue;
        };
        if !is_full_commit(commit) {
            continue;
        }
        if reference.ends_with("^{}") {
            return Some(commit);
        }
        first.get_or_insert(commit);
    }
    first
}

#[async_trait]
impl SyncStrategy for GitStrategy {
    fn module(&self) -> &str {
        &self.module
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Git
    }

    async fn obtain_content_identity(&self) -> ExtsyncResult<ContentIdentity> {
        if is_full_commit(&self.revision) {
            return ContentIdentity::new(self.revision.to_ascii_lowercase());
        }

        let output = Self::git(&["ls-remote", "--", &self.repository, &self.revision]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let commit = parse_ls_remote(&stdout).ok_or_else(|| ExtsyncError::RevisionNotFound {
            repository: self.repository.clone(),
            revision: self.revision.clone(),
        })?;
        ContentIdentity::new(commit)
    }

    async fn perform_sync(
        &self,
        coordinator: &SyncCoordinator,
        identity: &ContentIdentity,
        targets: &[TargetMachine],
    ) -> ExtsyncResult<SyncReport> {
        let scratch = tempfile::Builder::new()
            .prefix("extsync-git-")
            .tempdir()
            .map_err(|e| ExtsyncError::io("creating checkout directory", e))?;
        let name = Path::new(&self.module)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkout".to_string());
        let tree = scratch.path().join(name);

        debug!(module = %self.module, "checking out {} at {}", self.repository, identity);
        self.checkout(identity.as_str(), &tree).await?;

        let artifact = coordinator
            .archive_builder()
            .exclude(".git")
            .build(&tree)
            .await?;
        Ok(coordinator
            .sync_artifact(&self.module, identity, targets, artifact)
            .await)
    }
}
