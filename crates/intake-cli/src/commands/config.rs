use std::path::Path;

use intake_core::config::{default_config_path, StoreConfig};
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct EffectiveConfig {
    pub config_file: Option<String>,
    pub database_path: String,
    pub busy_timeout_ms: u64,
}

pub fn run_config(
    command: &ConfigCommands,
    config: &StoreConfig,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { json } => {
            let effective = effective_config(config, config_path)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&effective)?);
            } else {
                println!(
                    "config_file = {}",
                    effective.config_file.as_deref().unwrap_or("(none)")
                );
                println!("database_path = {}", effective.database_path);
                println!("busy_timeout_ms = {}", effective.busy_timeout_ms);
            }
        }
    }
    Ok(())
}

pub fn effective_config(
    config: &StoreConfig,
    config_path: Option<&Path>,
) -> Result<EffectiveConfig, CliError> {
    let config_file = config_path
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .filter(|path| path.exists());

    Ok(EffectiveConfig {
        config_file: config_file.map(|path| path.display().to_string()),
        database_path: config.resolve_database_path()?.display().to_string(),
        busy_timeout_ms: config.busy_timeout_ms,
    })
}
