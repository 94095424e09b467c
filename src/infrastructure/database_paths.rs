//! Database path resolution
//!
//! One place decides where the catalog database lives so the writer, the
//! readers and diagnostics never disagree about the file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::infrastructure::config::{StorageConfig, defaults};

pub const DATABASE_FILE_NAME: &str = "catalog.sqlite3";

/// `<data_local_dir>/hifi-catalog/database/catalog.sqlite3` unless overridden.
pub fn resolve_database_path(config: &StorageConfig) -> Result<PathBuf> {
    if let Some(path) = &config.database_path {
        debug!("Using configured database path: {}", path.display());
        return Ok(path.clone());
    }

    let data_dir = dirs::data_local_dir().context("Data directory not found")?;
    Ok(default_database_path(&data_dir))
}

pub fn default_database_path(data_dir: &Path) -> PathBuf {
    data_dir
        .join(defaults::APP_DIR_NAME)
        .join("database")
        .join(DATABASE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_path_wins() {
        let config = StorageConfig {
            database_path: Some(PathBuf::from("/var/tmp/catalog.db")),
            ..StorageConfig::default()
        };
        assert_eq!(
            resolve_database_path(&config).expect("path"),
            PathBuf::from("/var/tmp/catalog.db")
        );
    }

    #[test]
    fn default_path_layout_is_stable() {
        let path = default_database_path(Path::new("/data"));
        assert_eq!(path, PathBuf::from("/data/hifi-catalog/database/catalog.sqlite3"));
    }
}
