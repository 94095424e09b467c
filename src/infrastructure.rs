//! Infrastructure layer for storage, parsing, and the remote source
//!
//! This module provides the SQLite-backed category stores, the change
//! notifier, tabular parsing, the spreadsheet fetcher, and the ambient
//! configuration/logging setup.

pub mod catalog_error;
pub mod catalog_repository;
pub mod category_store;
pub mod change_notifier;
pub mod config;
pub mod database_connection;
pub mod database_paths;
pub mod logging;
pub mod parsing;
pub mod retry_policy;
pub mod sheets_fetcher;

// Re-export commonly used items
pub use catalog_error::{CatalogError, CatalogResult};
pub use catalog_repository::{CatalogRepository, UpsertSummary};
pub use category_store::CategoryStore;
pub use change_notifier::{ChangeEvent, ChangeNotifier, ChangeStream};
pub use config::{AppConfig, ConfigError, ConfigManager};
pub use database_connection::CatalogDatabase;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use parsing::{ParseOutcome, RawGrid, TabularRecordParser, parse_grid};
pub use retry_policy::RetryPolicy;
pub use sheets_fetcher::{RemoteCatalogFetcher, SheetsCatalogFetcher};
