//! Application root
//!
//! Owns the database, the repository, the sync coordinator, and the running
//! search controller, and wires them together from one [`AppConfig`].

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::application::search_controller::{SearchHandle, SearchStateController};
use crate::application::sync_coordinator::{SyncCoordinator, SyncReport, SyncStatus};
use crate::domain::ProductCategory;
use crate::infrastructure::catalog_repository::CatalogRepository;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::database_connection::CatalogDatabase;
use crate::infrastructure::database_paths::resolve_database_path;
use crate::infrastructure::sheets_fetcher::{RemoteCatalogFetcher, SheetsCatalogFetcher};

pub struct CatalogApp {
    config: AppConfig,
    repository: Arc<CatalogRepository>,
    coordinator: SyncCoordinator,
    search: SearchHandle,
}

impl CatalogApp {
    /// Start against the configured spreadsheet.
    pub async fn start(config: AppConfig) -> Result<Self> {
        let fetcher = SheetsCatalogFetcher::new(config.source.clone()).context("Failed to set up the remote source")?;
        Self::start_with_fetcher(config, Arc::new(fetcher)).await
    }

    pub async fn start_with_fetcher(config: AppConfig, fetcher: Arc<dyn RemoteCatalogFetcher>) -> Result<Self> {
        let database_path = resolve_database_path(&config.storage)?;
        let db = CatalogDatabase::open(&database_path, config.storage.max_read_connections)
            .await
            .with_context(|| format!("Failed to open catalog database at {}", database_path.display()))?;

        let repository = Arc::new(
            CatalogRepository::open(db, config.storage.change_buffer_size)
                .await
                .context("Failed to prepare catalog tables")?,
        );

        let coordinator = SyncCoordinator::new(Arc::clone(&repository), fetcher, config.sync.clone());
        let search = SearchStateController::spawn(Arc::clone(&repository), &config.search, Some(coordinator.status()));

        info!("🚀 Catalog started (database: {})", database_path.display());
        Ok(Self {
            config,
            repository,
            coordinator,
            search,
        })
    }

    /// Run one full sync now.
    pub async fn sync_now(&self) -> SyncReport {
        self.coordinator.sync_all().await
    }

    pub fn search(&self) -> &SearchHandle {
        &self.search
    }

    pub fn repository(&self) -> &Arc<CatalogRepository> {
        &self.repository
    }

    pub fn sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.coordinator.status()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Stored rows per category.
    pub async fn row_counts(&self) -> Result<BTreeMap<ProductCategory, u64>> {
        let mut counts = BTreeMap::new();
        for category in ProductCategory::ALL {
            let count = self
                .repository
                .count(category)
                .await
                .with_context(|| format!("Failed to count {category}"))?;
            counts.insert(category, count);
        }
        Ok(counts)
    }

    pub async fn shutdown(self) {
        self.search.shutdown().await;
        self.repository.database().close().await;
        info!("👋 Catalog shut down");
    }
}
