//! Configuration: a per-user TOML file with an optional project-local overlay

pub mod schema;

pub use schema::Config;

use crate::error::{ExtsyncError, ExtsyncResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Name of the project-local override file
pub const LOCAL_CONFIG_FILE: &str = ".extsync.toml";

/// Locates, layers and persists the configuration file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the per-user config file
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// `<config dir>/extsync/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("extsync")
            .join("config.toml")
    }

    /// Where the sync journal lives
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("extsync")
    }

    pub fn journal_path() -> PathBuf {
        Self::state_dir().join("journal.log")
    }

    /// Walk up from `start` looking for a project-local config file
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// The global file alone; defaults when it doesn't exist
    pub async fn load(&self) -> ExtsyncResult<Config> {
        self.load_merged(None).await
    }

    /// Defaults, then the global file, then an optional project-local file
    pub async fn load_merged(&self, local: Option<&Path>) -> ExtsyncResult<Config> {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut blame = self.config_path.as_path();

        if self.config_path.exists() {
            merge_values(&mut merged, read_value(&self.config_path).await?);
        } else {
            debug!("No config at {}, using defaults", self.config_path.display());
        }
        if let Some(local) = local {
            merge_values(&mut merged, read_value(local).await?);
            debug!("Merged local config from {}", local.display());
            blame = local;
        }

        into_config(merged, blame)
    }

    pub async fn save(&self, config: &Config) -> ExtsyncResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ExtsyncError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content)
            .await
            .map_err(|e| ExtsyncError::io(format!("writing {}", self.config_path.display()), e))?;

        info!("Wrote {}", self.config_path.display());
        Ok(())
    }

    pub async fn ensure_state_dirs() -> ExtsyncResult<()> {
        let dir = Self::state_dir();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ExtsyncError::io(format!("creating {}", dir.display()), e))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_value(path: &Path) -> ExtsyncResult<toml::Value> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ExtsyncError::io(format!("reading {}", path.display()), e))?;

    content.parse().map_err(|e: toml::de::Error| ExtsyncError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn into_config(value: toml::Value, path: &Path) -> ExtsyncResult<Config> {
    value.try_into().map_err(|e: toml::de::Error| ExtsyncError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Recursively overlay `overrides` onto `base`; tables merge, other values replace
fn merge_values(base: &mut toml::Value, overrides: toml::Value) {
    match (base, overrides) {
        (toml::Value::Table(base), toml::Value::Table(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}
