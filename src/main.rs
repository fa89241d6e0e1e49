//! extsync - CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use extsync::cli::{Cli, Commands};
use extsync::config::{Config, ConfigManager};
use extsync::error::{ExtsyncError, ExtsyncResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &Config) {
    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match verbose {
        0 => EnvFilter::new("extsync=warn"),
        1 => EnvFilter::new("extsync=info"),
        _ => EnvFilter::new("extsync=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

async fn run() -> ExtsyncResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| ExtsyncError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config);
    extsync::ui::init_theme();
    if let Some(path) = &local_config_path {
        debug!("Using local config: {}", path.display());
    }

    if config.general.journal {
        ConfigManager::ensure_state_dirs().await?;
    }

    match cli.command {
        Commands::Setup(args) => extsync::cli::commands::setup(args, &config).await,
        Commands::Identify(args) => extsync::cli::commands::identify(args, &config).await,
        Commands::Check(args) => extsync::cli::commands::check(args, &config).await,
        Commands::Config(args) => {
            extsync::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
