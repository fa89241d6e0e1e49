//! Externals manifest parsing
//!
//! A project lists its external modules in `externals.toml`:
//!
//! ```toml
//! [[module]]
//! path = "vendor/plugins/foo"
//! type = "git"
//! repository = "https://example.com/foo.git"
//! revision = "v1.2"
//! ```

use crate::error::{ExtsyncError, ExtsyncResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Default manifest file name
pub const MANIFEST_FILE: &str = "externals.toml";

/// How a module's content is obtained and placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// A local directory: linked in local mode, archived otherwise
    #[default]
    Local,
    /// A local directory, always archived and uploaded
    Archive,
    /// A local directory, always symlinked
    Link,
    /// A git repository at a revision
    Git,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Archive => "archive",
            Self::Link => "link",
            Self::Git => "git",
        };
        f.write_str(name)
    }
}

/// One `[[module]]` entry, with `source` resolved to an absolute path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Path relative to the release root, also the cache namespace
    pub path: String,

    #[serde(rename = "type", default)]
    pub kind: ModuleKind,

    /// Local source directory (local, archive and link modules)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Repository URL or path (git modules)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Branch, tag or commit (git modules, defaults to HEAD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default, rename = "module")]
    modules: Vec<ModuleSpec>,
}

/// Parsed and validated externals manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    modules: Vec<ModuleSpec>,
}

impl Manifest {
    /// Read and validate a manifest file
    pub async fn from_file(path: &Path) -> ExtsyncResult<Self> {
        if !path.exists() {
            return Err(ExtsyncError::ManifestNotFound(path.to_path_buf()));
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ExtsyncError::io(format!("reading manifest {}", path.display()), e))?;
        let base = std::path::absolute(path)
            .map_err(|e| ExtsyncError::io(format!("resolving {}", path.display()), e))?;
        Self::parse(&content, &base)
    }

    /// Parse manifest text; relative sources resolve against `path`'s directory
    pub fn parse(content: &str, path: &Path) -> ExtsyncResult<Self> {
        let invalid = |reason: String| ExtsyncError::ManifestInvalid {
            path: path.to_path_buf(),
            reason,
        };

        let raw: RawManifest = toml::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(raw.modules.len());
        for mut module in raw.modules {
            validate_module_path(&module.path).map_err(invalid)?;
            if !seen.insert(module.path.clone()) {
                return Err(invalid(format!("duplicate module path {:?}", module.path)));
            }

            match module.kind {
                ModuleKind::Git => {
                    let Some(repository) = module.repository.take().filter(|r| !r.is_empty())
                    else {
                        return Err(invalid(format!("{}: git modules need a repository", module.path)));
                    };
                    module.repository = Some(resolve_repository(base_dir, repository));
                }
                _ => {
                    let Some(source) = module.source.take() else {
                        return Err(invalid(format!(
                            "{}: {} modules need a source directory",
                            module.path, module.kind
                        )));
                    };
                    module.source = Some(if source.is_absolute() {
                        source
                    } else {
                        base_dir.join(source)
                    });
                }
            }
            modules.push(module);
        }

        Ok(Self {
            path: path.to_path_buf(),
            modules,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn modules(&self) -> &[ModuleSpec] {
        &self.modules
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Relative repository paths (`./x`, `../x`) resolve like sources; URLs pass through
fn resolve_repository(base_dir: &Path, repository: String) -> String {
    if repository.starts_with("./") || repository.starts_with("../") {
        base_dir.join(&repository).to_string_lossy().into_owned()
    } else {
        repository
    }
}

fn validate_module_path(path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err("module path is empty".to_string());
    }
    let parsed = Path::new(path);
    if parsed.is_absolute() {
        return Err(format!("module path {:?} must be relative", path));
    }
    for component in parsed.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            _ => return Err(format!("module path {:?} must not leave the release", path)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ExtsyncResult<Manifest> {
        Manifest::parse(content, Path::new("/work/shop/externals.toml"))
    }

    #[test]
    fn parses_every_kind() {
        let manifest = parse(
            r#"
            [[module]]
            path = "vendor/plugins/foo"
            source = "../foo"

            [[module]]
            path = "vendor/plugins/bar"
            type = "link"
            source = "/opt/bar"

            [[module]]
            path = "vendor/rails"
            type = "git"
            repository = "https://example.com/rails.git"
            revision = "v2.1"
            "#,
        )
        .unwrap();

        let modules = manifest.modules();
        assert_eq!(modules.len(), 3);
        assert_eq!(modules[0].kind, ModuleKind::Local);
        assert_eq!(modules[0].source.as_deref(), Some(Path::new("/work/shop/../foo")));
        assert_eq!(modules[1].kind, ModuleKind::Link);
        assert_eq!(modules[1].source.as_deref(), Some(Path::new("/opt/bar")));
        assert_eq!(modules[2].kind, ModuleKind::Git);
        assert_eq!(modules[2].revision.as_deref(), Some("v2.1"));
    }

    #[test]
    fn relative_repository_resolves_against_manifest() {
        let manifest = parse(
            "[[module]]\npath = \"a\"\ntype = \"git\"\nrepository = \"../repos/a\"\n",
        )
        .unwrap();
        assert_eq!(
            manifest.modules()[0].repository.as_deref(),
            Some("/work/shop/../repos/a")
        );
    }

    #[test]
    fn empty_manifest_is_valid() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn rejects_escaping_paths() {
        for path in ["", "/abs/path", "vendor/../../etc"] {
            let content = format!("[[module]]\npath = {:?}\nsource = \"x\"\n", path);
            assert!(
                matches!(parse(&content), Err(ExtsyncError::ManifestInvalid { .. })),
                "accepted {path:?}"
            );
        }
    }

    #[test]
    fn rejects_duplicates() {
        let err = parse(
            "[[module]]\npath = \"a\"\nsource = \"x\"\n[[module]]\npath = \"a\"\nsource = \"y\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(parse("[[module]]\npath = \"a\"\ntype = \"git\"\n").is_err());
        assert!(parse("[[module]]\npath = \"a\"\ntype = \"archive\"\n").is_err());
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(parse("[[module]]\npath = \"a\"\ntype = \"svn\"\nsource = \"x\"\n").is_err());
    }
}
