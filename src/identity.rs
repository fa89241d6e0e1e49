//! Content identity for source trees
//!
//! A tree's identity is derived from two SHA256 passes: one over the sorted
//! listing of every entry (raw relative path, type, size, link target) and one
//! over the concatenated bytes of every regular file in the same order. The
//! hex digests of both passes are hashed again to produce the final token.
//! Same structure and bytes = same identity, wherever the tree lives.

use crate::error::{ExtsyncError, ExtsyncResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Identity token naming a cache entry on every target machine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentIdentity(String);

impl ContentIdentity {
    /// Validate and wrap an identity token.
    ///
    /// The token becomes the last path segment of a cache directory, so it
    /// must be a single, non-special segment of printable ASCII.
    pub fn new(token: impl Into<String>) -> ExtsyncResult<Self> {
        let token = token.into();
        let valid = !token.is_empty()
            && token != "."
            && token != ".."
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if valid {
            Ok(Self(token))
        } else {
            Err(ExtsyncError::InvalidIdentity(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentIdentity {
    type Error = ExtsyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentIdentity> for String {
    fn from(value: ContentIdentity) -> Self {
        value.0
    }
}

/// Compute the content identity of the tree rooted at `tree`.
///
/// Symlinks are recorded by target and never followed. Fails with
/// `ExtsyncError::Identification` when any entry cannot be read.
pub fn identify(tree: &Path) -> ExtsyncResult<ContentIdentity> {
    let fail = |source: io::Error| ExtsyncError::Identification {
        path: tree.to_path_buf(),
        source,
    };

    let root = fs::metadata(tree).map_err(fail)?;
    if !root.is_dir() {
        return Err(fail(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let mut structure = Sha256::new();
    let mut content = Sha256::new();
    let mut files = 0usize;

    let walker = WalkDir::new(tree)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = entry.map_err(|e| fail(walk_error(e)))?;
        let relative = entry
            .path()
            .strip_prefix(tree)
            .map_err(|e| fail(io::Error::other(e)))?;
        let relative = relative.as_os_str().as_encoded_bytes();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            record(&mut structure, b'd', &[relative]);
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path()).map_err(fail)?;
            record(
                &mut structure,
                b'l',
                &[relative, target.as_os_str().as_encoded_bytes()],
            );
        } else if file_type.is_file() {
            let mut file = fs::File::open(entry.path()).map_err(fail)?;
            let size = io::copy(&mut file, &mut content).map_err(fail)?;
            files += 1;
            record(&mut structure, b'f', &[relative, size.to_string().as_bytes()]);
        } else {
            record(&mut structure, b'o', &[relative]);
        }
    }

    let structure = hex::encode(structure.finalize());
    let content = hex::encode(content.finalize());

    let mut combined = Sha256::new();
    combined.update(structure.as_bytes());
    combined.update(content.as_bytes());
    let identity = hex::encode(combined.finalize());

    debug!("Identified {} ({} files): {}", tree.display(), files, identity);
    ContentIdentity::new(identity)
}

/// Append one listing entry: a type tag, then NUL-terminated raw fields.
///
/// Neither path components nor link targets can hold a NUL byte, so no
/// sequence of entries can spell out another.
fn record(hasher: &mut Sha256, tag: u8, fields: &[&[u8]]) {
    hasher.update([tag]);
    for field in fields {
        hasher.update(*field);
        hasher.update([0u8]);
    }
}

/// Identify a tree on the blocking pool.
pub async fn identify_async(tree: PathBuf) -> ExtsyncResult<ContentIdentity> {
    tokio::task::spawn_blocking(move || identify(&tree))
        .await
        .map_err(|e| ExtsyncError::Internal(format!("identity task failed: {}", e)))?
}

fn walk_error(err: walkdir::Error) -> io::Error {
    let message = err.to_string();
    err.into_io_error()
        .unwrap_or_else(|| io::Error::other(message))
}
