//! Packaging source trees into transportable archives
//!
//! An archive is a gzipped tar rooted at the tree's own base name, built
//! once per sync call and shared read-only by every checkout. The scratch
//! directory holding it is removed when the last reference is dropped.

use crate::error::{ExtsyncError, ExtsyncResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

/// A packaged source tree ready for upload
#[derive(Debug)]
pub struct ArchiveArtifact {
    path: PathBuf,
    root_name: String,
    size: u64,
    _scratch: TempDir,
}

impl ArchiveArtifact {
    /// Local path of the archive file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the top-level directory inside the archive
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Archive size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Builds archives with the system `tar`
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    excludes: Vec<String>,
    scratch_dir: Option<PathBuf>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip entries matching a tar `--exclude` pattern
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Skip every pattern in `patterns`
    pub fn excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Create archives under `dir` instead of the system temp directory
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Package `tree` into a new archive.
    pub async fn build(&self, tree: &Path) -> ExtsyncResult<ArchiveArtifact> {
        let tree = tokio::fs::canonicalize(tree)
            .await
            .map_err(|e| ExtsyncError::packaging(tree, e.to_string()))?;

        let (parent, root_name) = match (tree.parent(), tree.file_name()) {
            (Some(parent), Some(name)) => (parent.to_path_buf(), name.to_string_lossy().into_owned()),
            _ => return Err(ExtsyncError::packaging(&tree, "cannot archive a filesystem root")),
        };

        let scratch = match &self.scratch_dir {
            Some(dir) => tempfile::Builder::new().prefix("extsync-").tempdir_in(dir),
            None => tempfile::Builder::new().prefix("extsync-").tempdir(),
        }
        .map_err(|e| ExtsyncError::io("creating archive scratch directory", e))?;

        let path = scratch.path().join(format!("{}.tgz", root_name));
        debug!("Creating local archive {} from {}", path.display(), tree.display());

        let mut cmd = Command::new("tar");
        cmd.arg("czf").arg(&path);
        for pattern in &self.excludes {
            cmd.arg(format!("--exclude={}", pattern));
        }
        cmd.arg("-C").arg(&parent).arg("--").arg(&root_name);

        let output = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtsyncError::packaging(&tree, format!("cannot run tar: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtsyncError::packaging(
                &tree,
                format!(
                    "tar exited with {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            ));
        }

        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ExtsyncError::packaging(&tree, e.to_string()))?
            .len();

        debug!("Archive {} ready ({} bytes)", path.display(), size);
        Ok(ArchiveArtifact {
            path,
            root_name,
            size,
            _scratch: scratch,
        })
    }
}
