//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// extsync - cached external modules for deployments
///
/// Places each external module on every target machine once per distinct
/// content, then links it into the release.
#[derive(Parser, Debug)]
#[command(name = "extsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "EXTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .extsync.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync every external module and link it into the release
    Setup(SetupArgs),

    /// Print the content identity of a directory
    Identify(IdentifyArgs),

    /// Report which modules are already cached on each target
    Check(CheckArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Where modules come from and where they go
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Manifest file (defaults to externals.toml or config/externals.toml)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Target machine, `[user@]host[:port]` (repeatable or comma-separated)
    #[arg(short, long = "target", value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Apply externals to this machine, caching next to the project
    #[arg(long, conflicts_with = "targets")]
    pub local: bool,
}

/// Arguments for the setup command
#[derive(Parser, Debug)]
pub struct SetupArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Release directory on the targets that modules are linked into
    #[arg(short, long, required_unless_present = "local")]
    pub release: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the identify command
#[derive(Parser, Debug)]
pub struct IdentifyArgs {
    /// Directory to identify
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., remote.shared_root)
        key: String,
        /// Value to set
        value: String,
        /// Write to project-local .extsync.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Bare values, one per line
    Plain,
}
