//! Error types for extsync
//!
//! All modules use `ExtsyncResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for extsync operations
pub type ExtsyncResult<T> = Result<T, ExtsyncError>;

/// All errors that can occur in extsync
#[derive(Error, Debug)]
pub enum ExtsyncError {
    // Shared preconditions
    #[error("Cannot identify source tree {path}: {source}")]
    Identification {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot package {path}: {reason}")]
    Packaging { path: PathBuf, reason: String },

    #[error("Invalid content identity: {0:?}")]
    InvalidIdentity(String),

    #[error("Revision {revision} not found in {repository}")]
    RevisionNotFound { repository: String, revision: String },

    // Per-machine errors
    #[error("Channel error on {host}: {reason}")]
    Channel { host: String, reason: String },

    #[error("Upload to {host}:{path} failed: {reason}")]
    Transfer {
        host: String,
        path: String,
        reason: String,
    },

    #[error("Remote command failed on {host} (exit code {code}): {command}")]
    RemoteCommand {
        host: String,
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Timed out after {secs}s during {operation} on {host}")]
    Timeout {
        host: String,
        operation: &'static str,
        secs: u64,
    },

    // Aggregate result
    #[error("Sync of {module} failed on {} machine(s): {}", .failures.len(), .failures.join("; "))]
    SyncFailed {
        module: String,
        failures: Vec<String>,
    },

    // Manifest errors
    #[error("Invalid manifest {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ExtsyncError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a channel error for a host
    pub fn channel(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Channel {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Create a packaging error for a source tree
    pub fn packaging(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Packaging {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Transport-level failures that may succeed on a re-run
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Channel { .. } | Self::Transfer { .. } | Self::Timeout { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Channel { .. } => Some("Check connectivity with: ssh <host> true"),
            Self::Timeout { .. } => Some("Raise the limits in the [timeouts] config section"),
            Self::Packaging { .. } => Some("Make sure `tar` is installed and the source is readable"),
            Self::ManifestNotFound(_) => Some("Create externals.toml or pass --manifest"),
            Self::SyncFailed { .. } => Some("Re-run with -vv for per-step details"),
            _ => None,
        }
    }
}
