//! Catalog repository
//!
//! Owns one [`CategoryStore`] per category and the shared change notifier.
//! Batch upserts apply records independently: a failing record is logged
//! and counted, the rest of the batch still lands, and every record that
//! commits emits exactly one change event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{CatalogSnapshot, ProductCategory, ProductRecord, SearchCriteria};
use crate::infrastructure::catalog_error::CatalogResult;
use crate::infrastructure::category_store::CategoryStore;
use crate::infrastructure::change_notifier::{ChangeNotifier, ChangeStream};
use crate::infrastructure::database_connection::CatalogDatabase;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub stored: usize,
    pub failed: usize,
}

impl UpsertSummary {
    pub const fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    db: CatalogDatabase,
    /// Indexed by [`ProductCategory::index`].
    stores: Vec<CategoryStore>,
    notifier: ChangeNotifier,
}

impl CatalogRepository {
    pub fn new(db: CatalogDatabase, notifier: ChangeNotifier) -> Self {
        let stores = ProductCategory::ALL
            .iter()
            .map(|&category| CategoryStore::new(db.clone(), category))
            .collect();
        Self { db, stores, notifier }
    }

    /// Build the repository and make sure every category table exists.
    pub async fn open(db: CatalogDatabase, change_buffer_size: usize) -> CatalogResult<Self> {
        let repository = Self::new(db, ChangeNotifier::new(change_buffer_size));
        repository.ensure_schemas().await?;
        Ok(repository)
    }

    pub async fn ensure_schemas(&self) -> CatalogResult<()> {
        for store in &self.stores {
            store.ensure_schema().await?;
        }
        info!("✅ Catalog schema ready ({} tables)", self.stores.len());
        Ok(())
    }

    pub fn store(&self, category: ProductCategory) -> &CategoryStore {
        &self.stores[category.index()]
    }

    pub fn database(&self) -> &CatalogDatabase {
        &self.db
    }

    pub async fn upsert(&self, category: ProductCategory, records: &[ProductRecord]) -> UpsertSummary {
        self.upsert_at(category, records, Utc::now()).await
    }

    /// Upsert stamping every row with `synced_at`.
    pub async fn upsert_at(
        &self,
        category: ProductCategory,
        records: &[ProductRecord],
        synced_at: DateTime<Utc>,
    ) -> UpsertSummary {
        let store = self.store(category);
        let mut summary = UpsertSummary::default();

        for record in records {
            if record.category() != category {
                warn!(
                    %category,
                    record = record.name(),
                    record_category = %record.category(),
                    "Record does not belong to this category; skipped"
                );
                summary.failed += 1;
                continue;
            }

            match store.upsert(record, synced_at).await {
                Ok(()) => {
                    summary.stored += 1;
                    self.notifier.notify_commit();
                }
                Err(e) => {
                    warn!(%category, record = record.name(), "Failed to upsert record: {}", e);
                    summary.failed += 1;
                }
            }
        }

        debug!(%category, stored = summary.stored, failed = summary.failed, "Upsert batch finished");
        summary
    }

    /// Empty when no category is selected.
    pub async fn query(&self, criteria: &SearchCriteria) -> CatalogResult<CatalogSnapshot> {
        let Some(category) = criteria.category else {
            return Ok(CatalogSnapshot::empty());
        };

        let records = self.store(category).query(criteria.price_range).await?;
        Ok(CatalogSnapshot::from_records(records))
    }

    /// Remove rows of `category` not synced since `cutoff`. Emits one change
    /// event when anything was removed.
    pub async fn sweep_stale(&self, category: ProductCategory, cutoff: DateTime<Utc>) -> CatalogResult<u64> {
        let deleted = self.store(category).sweep_older_than(cutoff).await?;
        if deleted > 0 {
            self.notifier.notify_commit();
        }
        Ok(deleted)
    }

    pub async fn count(&self, category: ProductCategory) -> CatalogResult<u64> {
        self.store(category).count().await
    }

    pub fn subscribe_to_changes(&self) -> ChangeStream {
        self.notifier.subscribe()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}
