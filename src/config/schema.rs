//! Configuration schema for extsync
//!
//! Configuration is stored at `~/.config/extsync/config.toml`, optionally
//! overridden per project by `.extsync.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Layout on remote target machines
    pub remote: RemoteConfig,

    /// Layout for local-mode setups
    pub local: LocalConfig,

    /// SSH client settings
    pub ssh: SshConfig,

    /// Deadlines for remote operations
    pub timeouts: TimeoutConfig,

    /// Archive packaging settings
    pub archive: ArchiveConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append sync events to the journal
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
        }
    }
}

/// Remote target layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Shared externals root; entries live at `<root>/<module>/<identity>`
    pub shared_root: PathBuf,

    /// Directory for temporary archives on the target
    pub tmp_dir: PathBuf,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            shared_root: PathBuf::from("/u/apps/shared/externals"),
            tmp_dir: PathBuf::from("/tmp"),
        }
    }
}

/// Local-mode layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Cache directory, relative paths resolve against the project directory
    pub cache_directory: PathBuf,

    /// Scratch directory for local archives (system temp dir when unset)
    pub tmp_dir: Option<PathBuf>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            cache_directory: PathBuf::from("../shared/externals"),
            tmp_dir: None,
        }
    }
}

/// SSH client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Login user when a target doesn't name one
    pub user: Option<String>,

    /// Port when a target doesn't name one
    pub port: Option<u16>,

    /// Seconds to wait for the TCP connection
    pub connect_timeout_secs: u64,

    /// Extra `-o` options passed to ssh and sftp
    pub options: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: None,
            port: None,
            connect_timeout_secs: 10,
            options: vec![],
        }
    }
}

/// Deadlines for remote operations, in seconds (0 = no limit)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Opening the connection, including authentication
    pub connect_secs: u64,
    pub exists_secs: u64,
    pub upload_secs: u64,
    pub command_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 60,
            exists_secs: 60,
            upload_secs: 1800,
            command_secs: 1800,
        }
    }
}

/// Archive packaging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// tar `--exclude` patterns applied to every archive
    pub exclude: Vec<String>,
}
