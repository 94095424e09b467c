//! Logging system configuration and initialization
//!
//! This module provides the logging setup with:
//! - Console and/or file output (daily rolling file via tracing-appender)
//! - Configuration based log level control with per-module overrides
//! - Structured JSON logging (optional)
//! - `RUST_LOG` always wins over the configured level

use anyhow::{Result, anyhow};
use lazy_static::lazy_static;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

pub const LOG_FILE_NAME: &str = "hifi-catalog.log";

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Local wall-clock timestamps with millisecond precision
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Configured directory, or `logs/` next to the executable.
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    if let Some(dir) = &config.log_directory {
        return dir.clone();
    }

    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
        .join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Filter used when `RUST_LOG` is not set.
///
/// Below TRACE, SQL statements, HTTP client internals and runtime chatter
/// are suppressed so catalog logs stay readable.
pub fn default_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.to_lowercase().contains("trace") {
        for directive in [
            "sqlx::query=warn",
            "sqlx::sqlite=warn",
            "reqwest=info",
            "hyper=warn",
            "hyper_util=warn",
            "h2=warn",
            "rustls=warn",
            "tokio=info",
            "runtime=warn",
        ] {
            filter = filter.add_directive(directive.parse()?);
        }
    }

    for (module, level) in &config.module_filters {
        filter = filter.add_directive(
            format!("{module}={level}")
                .parse()
                .map_err(|e| anyhow!("Invalid module filter {}={}: {}", module, level, e))?,
        );
    }

    Ok(filter)
}

/// Initialize logging with custom configuration
///
/// Override the filtering with `RUST_LOG`, e.g.
/// ```bash
/// RUST_LOG="debug,sqlx::query=debug" hifi-catalog
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.file_output && !config.console_output {
        return Err(anyhow!("No logging output configured"));
    }

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(config)?,
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let log_dir = get_log_directory(config);

    if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

        let (file_writer, file_guard) = non_blocking(rolling::daily(&log_dir, LOG_FILE_NAME));
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);

        let file_layer = fmt::Layer::new()
            .with_writer(file_writer)
            .with_timer(LocalTimeFormatter)
            .with_ansi(false); // No ANSI color codes for file output

        if config.json_format {
            layers.push(
                file_layer
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .boxed(),
            );
        } else {
            layers.push(file_layer.with_target(false).boxed());
        }
    }

    if config.console_output {
        let console_layer = fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(LocalTimeFormatter)
            .with_target(false);

        if config.json_format {
            layers.push(console_layer.json().boxed());
        } else {
            layers.push(console_layer.boxed());
        }
    }

    Registry::default()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("Logging already initialized: {}", e))?;

    info!(
        level = %config.level,
        json = config.json_format,
        console = config.console_output,
        file = config.file_output,
        "Logging system initialized"
    );
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== HiFi Catalog System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
    info!("=======================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(!config.file_output);
    }

    #[test]
    fn test_log_directory_resolution() {
        let config = LoggingConfig::default();
        assert!(get_log_directory(&config).to_string_lossy().ends_with("logs"));

        let config = LoggingConfig {
            log_directory: Some(PathBuf::from("/tmp/hifi-logs")),
            ..LoggingConfig::default()
        };
        assert_eq!(get_log_directory(&config), PathBuf::from("/tmp/hifi-logs"));
    }

    #[test]
    fn test_default_filter_quietens_dependencies() {
        let mut config = LoggingConfig::default();
        config.module_filters.insert("hifi_catalog_lib::application".into(), "debug".into());

        let rendered = default_filter(&config).expect("filter").to_string();
        assert!(rendered.contains("sqlx::query=warn"));
        assert!(rendered.contains("hifi_catalog_lib::application=debug"));
    }

    #[test]
    fn test_trace_level_keeps_dependency_logs() {
        let config = LoggingConfig {
            level: "trace".into(),
            ..LoggingConfig::default()
        };
        let rendered = default_filter(&config).expect("filter").to_string();
        assert!(!rendered.contains("sqlx::query=warn"));
    }

    #[test]
    fn test_no_output_is_rejected() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(&config).is_err());
    }
}
