//! Store configuration.
//!
//! Values come from an optional JSON file, then environment overrides:
//! `INTAKE_DB_PATH` and `INTAKE_BUSY_TIMEOUT_MS`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "intake.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub const ENV_DB_PATH: &str = "INTAKE_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "INTAKE_BUSY_TIMEOUT_MS";

/// Database location and lock-wait settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Database file; defaults to the platform data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// How long a writer waits for another writer's lock before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Config with an explicit database file
    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load from the default config file (if present) and apply env overrides.
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(
            std::env::var(ENV_DB_PATH).ok(),
            std::env::var(ENV_BUSY_TIMEOUT_MS).ok(),
        )?;
        Ok(config)
    }

    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::InvalidInput(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        Ok(config)
    }

    /// Apply raw override values (normally read from the environment).
    pub fn apply_overrides(
        &mut self,
        database_path: Option<String>,
        busy_timeout_ms: Option<String>,
    ) -> Result<()> {
        if let Some(path) = normalize_text_option(database_path) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = normalize_text_option(busy_timeout_ms) {
            self.busy_timeout_ms = raw.parse().map_err(|_| {
                Error::InvalidInput(format!("{ENV_BUSY_TIMEOUT_MS} must be milliseconds, got {raw:?}"))
            })?;
        }
        Ok(())
    }

    /// Configured database path, or `<data dir>/intake/intake.db`.
    pub fn resolve_database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join("intake").join(DATABASE_FILE_NAME))
            .ok_or_else(|| Error::InvalidInput("Cannot resolve a data directory".into()))
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// `<config dir>/intake/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("intake").join(CONFIG_FILE_NAME))
}
