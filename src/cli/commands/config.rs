//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::cli::commands::current_dir;
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_FILE};
use crate::error::{ExtsyncError, ExtsyncResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "general.journal",
    "remote.shared_root",
    "remote.tmp_dir",
    "local.cache_directory",
    "local.tmp_dir",
    "ssh.user",
    "ssh.port",
    "ssh.connect_timeout_secs",
    "ssh.options",
    "timeouts.connect_secs",
    "timeouts.exists_secs",
    "timeouts.upload_secs",
    "timeouts.command_secs",
    "archive.exclude",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> ExtsyncResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            if local {
                set_local_value(&key, &value).await?
            } else {
                set_value(manager, &key, &value).await?
            }
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> ExtsyncResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ExtsyncResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        let overwrite = ui::confirm(
            &ctx,
            &format!("Overwrite existing config at {}?", path.display()),
            false,
        )
        .await?;
        if !overwrite {
            ui::step_warn_hint(
                &ctx,
                &format!("Config already exists at {}", path.display()),
                "Use --force to overwrite",
            );
            return Ok(());
        }
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> ExtsyncResult<()> {
    let ctx = UiContext::detect();
    let typed = typed_value(&ctx, key, value)?;

    // Only the global file; a project overlay must not leak into it
    let mut doc = toml::Value::try_from(manager.load().await?)?;
    set_toml_value(&mut doc, key, typed)?;
    let config = validated(doc, manager.path())?;

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

async fn set_local_value(key: &str, value: &str) -> ExtsyncResult<()> {
    let ctx = UiContext::detect();
    let typed = typed_value(&ctx, key, value)?;

    let local_path = current_dir()?.join(LOCAL_CONFIG_FILE);
    let mut doc: toml::Value = if local_path.exists() {
        let content = fs::read_to_string(&local_path)
            .await
            .map_err(|e| ExtsyncError::io(format!("reading {}", local_path.display()), e))?;
        content
            .parse()
            .map_err(|e: toml::de::Error| ExtsyncError::ConfigInvalid {
                path: local_path.clone(),
                reason: e.to_string(),
            })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, key, typed)?;
    validated(doc.clone(), &local_path)?;

    let content = toml::to_string_pretty(&doc)?;
    fs::write(&local_path, content)
        .await
        .map_err(|e| ExtsyncError::io(format!("writing {}", local_path.display()), e))?;

    ui::step_ok(
        &ctx,
        &format!("Set {} = {} in {}", key, value, local_path.display()),
    );
    Ok(())
}

/// Parse `value` into the TOML type the schema declares for `key`.
fn typed_value(ctx: &UiContext, key: &str, value: &str) -> ExtsyncResult<toml::Value> {
    let typed = match key {
        "general.log_format" => toml::Value::String(parse_log_format(value)?),
        "general.journal" => toml::Value::Boolean(parse_bool(value)?),
        "ssh.port" => toml::Value::Integer(parse_number::<u16>(value)?.into()),
        "ssh.connect_timeout_secs"
        | "timeouts.connect_secs"
        | "timeouts.exists_secs"
        | "timeouts.upload_secs"
        | "timeouts.command_secs" => toml::Value::Integer(parse_number::<u32>(value)?.into()),
        "ssh.options" | "archive.exclude" => {
            toml::Value::Array(parse_list(value).into_iter().map(toml::Value::String).collect())
        }
        _ if VALID_KEYS.contains(&key) => toml::Value::String(value.to_string()),
        _ => {
            ui::step_error_detail(ctx, "Unknown config key", key);
            ui::remark(ctx, "Valid keys:");
            for key in VALID_KEYS {
                eprintln!("  {}", key);
            }
            return Err(ExtsyncError::User(format!("Unknown config key: {}", key)));
        }
    };
    Ok(typed)
}

/// The edited document must still load as a `Config`
fn validated(doc: toml::Value, path: &Path) -> ExtsyncResult<Config> {
    doc.try_into().map_err(|e: toml::de::Error| ExtsyncError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Set a dot-separated key in a TOML tree, creating intermediate tables as needed.
fn set_toml_value(doc: &mut toml::Value, key: &str, value: toml::Value) -> ExtsyncResult<()> {
    let (sections, leaf) = match key.rsplit_once('.') {
        Some((sections, leaf)) => (sections.split('.').collect::<Vec<_>>(), leaf),
        None => (Vec::new(), key),
    };

    let mut current = doc;
    for part in sections {
        current = current
            .as_table_mut()
            .ok_or_else(|| ExtsyncError::User(format!("Expected table at key: {}", part)))?
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    let table = current
        .as_table_mut()
        .ok_or_else(|| ExtsyncError::User(format!("Expected table for key: {}", key)))?;
    table.insert(leaf.to_string(), value);
    Ok(())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_log_format(value: &str) -> ExtsyncResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(ExtsyncError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}

fn parse_bool(value: &str) -> ExtsyncResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ExtsyncError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ExtsyncResult<T> {
    value
        .parse()
        .map_err(|_| ExtsyncError::User(format!("Invalid number: {}", value)))
}
