// Database connection ownership for the catalog store
//
// Access discipline:
// - exactly one writer connection; every INSERT/UPDATE/DELETE/DDL goes
//   through `writer()`, so writes to any table serialize on it
// - a separate read-only pool serves queries; WAL journaling lets readers
//   see the latest committed write without waiting on the writer
// Nothing here relies on the SQLite library's own thread-safety mode.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::infrastructure::catalog_error::CatalogResult;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct CatalogDatabase {
    writer: SqlitePool,
    reader: SqlitePool,
    path: PathBuf,
}

impl CatalogDatabase {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>, max_read_connections: u32) -> CatalogResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(sqlx::Error::Io)?;
        }

        let writer_options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        // The writer must connect first so the file and WAL exist for readers.
        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(writer_options)
            .await?;

        let reader_options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            .busy_timeout(BUSY_TIMEOUT);

        let reader = SqlitePoolOptions::new()
            .max_connections(max_read_connections.max(1))
            .connect_with(reader_options)
            .await?;

        info!("🗄️ Catalog database opened at {}", path.display());
        Ok(Self { writer, reader, path })
    }

    /// The single write connection.
    pub fn writer(&self) -> &SqlitePool {
        &self.writer
    }

    /// Read-only connections for queries.
    pub fn reader(&self) -> &SqlitePool {
        &self.reader
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn close(&self) {
        self.reader.close().await;
        self.writer.close().await;
    }
}
