//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate: built-in defaults, then the
//! JSON file managed by [`ConfigManager`], then `HIFI_CATALOG__*` environment
//! variables (e.g. `HIFI_CATALOG__SOURCE__API_KEY`).

#![allow(clippy::derivable_impls)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::domain::PriceRange;
use crate::infrastructure::retry_policy::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("User config directory not available")]
    NoConfigDirectory,

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

pub mod defaults {
    pub const SHEET_BASE_URL: &str =
        "https://sheets.googleapis.com/v4/spreadsheets/1e6qXF1Ihw98aWZlGO9jVdLJr8tUvTztxQTsSutYLYpU/values/";
    pub const VALUE_RENDER_OPTION: &str = "FORMATTED_VALUE";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const USER_AGENT: &str = "hifi-catalog/0.2";

    pub const MAX_READ_CONNECTIONS: u32 = 4;
    pub const CHANGE_BUFFER_SIZE: usize = 256;

    pub const SEARCH_DEBOUNCE_MS: u64 = 0;
    pub const INITIAL_PRICE_MIN: i64 = 0;
    pub const INITIAL_PRICE_MAX: i64 = 2000;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;

    pub const APP_DIR_NAME: &str = "hifi-catalog";
    pub const CONFIG_FILE_NAME: &str = "config.json";
    pub const ENV_PREFIX: &str = "HIFI_CATALOG";
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

/// Remote spreadsheet source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Values endpoint; the sheet name is appended as a path segment.
    pub base_url: String,
    pub api_key: Option<String>,
    pub value_render_option: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to the platform data directory when unset.
    pub database_path: Option<PathBuf>,
    pub max_read_connections: u32,
    pub change_buffer_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub retry: RetryPolicy,
    /// Delete rows that a fully successful sync no longer lists.
    pub prune_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Coalescing window for selection changes; 0 queries on every change.
    pub debounce_ms: u64,
    pub initial_price_min: i64,
    pub initial_price_max: i64,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Defaults to `logs/` next to the executable.
    pub log_directory: Option<PathBuf>,

    /// Module-specific log level filters (e.g., "sqlx": "warn", "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::SHEET_BASE_URL.to_string(),
            api_key: None,
            value_render_option: defaults::VALUE_RENDER_OPTION.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_read_connections: defaults::MAX_READ_CONNECTIONS,
            change_buffer_size: defaults::CHANGE_BUFFER_SIZE,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::SEARCH_DEBOUNCE_MS,
            initial_price_min: defaults::INITIAL_PRICE_MIN,
            initial_price_max: defaults::INITIAL_PRICE_MAX,
        }
    }
}

impl SearchConfig {
    pub fn initial_price_range(&self) -> PriceRange {
        PriceRange::new(self.initial_price_min, self.initial_price_max)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_directory: None,
            module_filters: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Layer defaults, an optional config file and the environment.
    pub fn from_sources(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: &str| {
            Err(ConfigError::Validation {
                message: message.to_string(),
            })
        };

        if url::Url::parse(&self.source.base_url).is_err() {
            return fail("source.base_url must be an absolute URL");
        }
        if self.source.timeout_seconds == 0 {
            return fail("source.timeout_seconds must be greater than 0");
        }
        if self.storage.max_read_connections == 0 {
            return fail("storage.max_read_connections must be greater than 0");
        }
        if self.storage.change_buffer_size == 0 {
            return fail("storage.change_buffer_size must be greater than 0");
        }
        if self.sync.retry.max_attempts == 0 {
            return fail("sync.retry.max_attempts must be at least 1");
        }
        if self.search.initial_price_min > self.search.initial_price_max {
            return fail("search.initial_price_min cannot be greater than initial_price_max");
        }

        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(defaults::APP_DIR_NAME))
            .ok_or(ConfigError::NoConfigDirectory)
    }

    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Load configuration, writing the defaults to disk on first run.
    pub async fn load_config(&self) -> Result<AppConfig, ConfigError> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            info!("🎉 First run detected - writing default configuration to {:?}", self.config_path);
            self.save_config(&AppConfig::default()).await?;
        }

        let config = AppConfig::from_sources(Some(&self.config_path))?;
        info!("Loaded configuration from: {:?}", self.config_path);
        Ok(config)
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.config_path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await?;
        Ok(())
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.retry.max_attempts, 1);
        assert!(!config.sync.prune_missing);
        assert_eq!(config.search.debounce_ms, 0);
        assert_eq!(config.search.initial_price_range(), PriceRange::new(0, 2000));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.source.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));

        let mut config = AppConfig::default();
        config.sync.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.search.initial_price_min = 10;
        config.search.initial_price_max = 5;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn first_load_writes_defaults_and_file_overrides_apply() {
        let dir = tempdir().expect("temp dir");
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));

        let first = manager.load_config().await.expect("first load");
        assert!(manager.config_path().exists());
        assert_eq!(first.storage, StorageConfig::default());
        assert_eq!(first.search, SearchConfig::default());

        let mut changed = first.clone();
        changed.search.debounce_ms = 75;
        changed.sync.prune_missing = true;
        changed.sync.retry.max_attempts = 3;
        manager.save_config(&changed).await.expect("save");

        let reloaded = manager.load_config().await.expect("reload");
        assert_eq!(reloaded.search.debounce_ms, 75);
        assert!(reloaded.sync.prune_missing);
        assert_eq!(reloaded.sync.retry.max_attempts, 3);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "search": { "debounce_ms": 20 } }"#).expect("write");

        let config = AppConfig::from_sources(Some(&path)).expect("load");
        assert_eq!(config.search.debounce_ms, 20);
        assert_eq!(config.search.initial_price_max, defaults::INITIAL_PRICE_MAX);
        assert_eq!(config.source.value_render_option, defaults::VALUE_RENDER_OPTION);
    }
}
