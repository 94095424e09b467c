//! Sync coordinator
//!
//! Runs fetch → parse → upsert for every category concurrently. Each
//! category's pipeline is isolated: a network failure or a rejected header
//! in one category is logged and reported, and never cancels or delays the
//! others. Previously stored rows of a failed category are left untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::ProductCategory;
use crate::infrastructure::catalog_error::{CatalogError, CatalogResult};
use crate::infrastructure::catalog_repository::CatalogRepository;
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::parsing::{RawGrid, parse_grid};
use crate::infrastructure::retry_policy::RetryPolicy;
use crate::infrastructure::sheets_fetcher::RemoteCatalogFetcher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CategoryOutcome {
    Synced {
        parsed: usize,
        stored: usize,
        failed: usize,
        skipped_rows: usize,
        swept: u64,
    },
    Failed {
        error: String,
        /// Local data for the category may be out of date.
        stale: bool,
    },
}

impl CategoryOutcome {
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: BTreeMap<ProductCategory, CategoryOutcome>,
}

impl SyncReport {
    pub fn outcome(&self, category: ProductCategory) -> Option<&CategoryOutcome> {
        self.outcomes.get(&category)
    }

    pub fn synced_count(&self) -> usize {
        self.outcomes.values().filter(|outcome| outcome.is_synced()).count()
    }

    pub fn failed_categories(&self) -> Vec<ProductCategory> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_synced())
            .map(|(category, _)| *category)
            .collect()
    }
}

/// Categories whose last sync attempt left their local data stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub stale: BTreeSet<ProductCategory>,
    pub last_run: Option<Uuid>,
    pub last_finished_at: Option<DateTime<Utc>>,
}

impl SyncStatus {
    pub fn is_stale(&self, category: ProductCategory) -> bool {
        self.stale.contains(&category)
    }
}

pub struct SyncCoordinator {
    repository: Arc<CatalogRepository>,
    fetcher: Arc<dyn RemoteCatalogFetcher>,
    config: SyncConfig,
    status_tx: watch::Sender<SyncStatus>,
}

impl SyncCoordinator {
    pub fn new(repository: Arc<CatalogRepository>, fetcher: Arc<dyn RemoteCatalogFetcher>, config: SyncConfig) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::default());
        Self {
            repository,
            fetcher,
            config,
            status_tx,
        }
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Sync every category concurrently and report per-category outcomes.
    pub async fn sync_all(&self) -> SyncReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "🔄 Catalog sync started ({} categories)", ProductCategory::ALL.len());

        let handles: Vec<_> = ProductCategory::ALL
            .iter()
            .map(|&category| {
                let pipeline = CategoryPipeline {
                    repository: Arc::clone(&self.repository),
                    fetcher: Arc::clone(&self.fetcher),
                    retry: self.config.retry.clone(),
                    prune_missing: self.config.prune_missing,
                    run_id,
                    started_at,
                    category,
                };
                (category, tokio::spawn(pipeline.run()))
            })
            .collect();

        let mut outcomes = BTreeMap::new();
        let (categories, tasks): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (category, joined) in categories.into_iter().zip(futures::future::join_all(tasks).await) {
            let outcome = joined.unwrap_or_else(|join_error| {
                error!(%run_id, %category, "Sync task aborted: {}", join_error);
                CategoryOutcome::Failed {
                    error: join_error.to_string(),
                    stale: true,
                }
            });
            outcomes.insert(category, outcome);
        }

        let report = SyncReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        self.publish_status(&report);

        info!(
            %run_id,
            synced = report.synced_count(),
            failed = report.failed_categories().len(),
            "✅ Catalog sync finished"
        );
        report
    }

    fn publish_status(&self, report: &SyncReport) {
        self.status_tx.send_modify(|status| {
            for (category, outcome) in &report.outcomes {
                match outcome {
                    CategoryOutcome::Synced { .. } => {
                        status.stale.remove(category);
                    }
                    CategoryOutcome::Failed { stale: true, .. } => {
                        status.stale.insert(*category);
                    }
                    CategoryOutcome::Failed { stale: false, .. } => {}
                }
            }
            status.last_run = Some(report.run_id);
            status.last_finished_at = Some(report.finished_at);
        });
    }
}

/// Everything one category's pipeline needs, owned so it can run on its own task.
struct CategoryPipeline {
    repository: Arc<CatalogRepository>,
    fetcher: Arc<dyn RemoteCatalogFetcher>,
    retry: RetryPolicy,
    prune_missing: bool,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    category: ProductCategory,
}

impl CategoryPipeline {
    async fn run(self) -> CategoryOutcome {
        let (run_id, category) = (self.run_id, self.category);
        match self.execute().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%run_id, %category, "❌ Category sync failed: {}", e);
                CategoryOutcome::Failed {
                    error: e.to_string(),
                    stale: e.marks_stale(),
                }
            }
        }
    }

    async fn execute(&self) -> CatalogResult<CategoryOutcome> {
        let grid = self.fetch_with_retry().await?;
        let parsed = parse_grid(self.category, &grid)?;

        let summary = self
            .repository
            .upsert_at(self.category, &parsed.records, self.started_at)
            .await;

        // Sweep only after a batch that fully landed and listed something.
        // A skipped row may still be listed upstream.
        let swept = if self.prune_missing
            && parsed.skipped_rows.is_empty()
            && summary.is_complete()
            && summary.stored > 0
        {
            match self.repository.sweep_stale(self.category, self.started_at).await {
                Ok(swept) => swept,
                Err(e) => {
                    warn!(run_id = %self.run_id, category = %self.category, "Sweep failed: {}", e);
                    0
                }
            }
        } else {
            0
        };

        info!(
            run_id = %self.run_id,
            category = %self.category,
            parsed = parsed.records.len(),
            stored = summary.stored,
            failed = summary.failed,
            skipped_rows = parsed.skipped_rows.len(),
            swept,
            "📦 Category synced"
        );

        Ok(CategoryOutcome::Synced {
            parsed: parsed.records.len(),
            stored: summary.stored,
            failed: summary.failed,
            skipped_rows: parsed.skipped_rows.len(),
            swept,
        })
    }

    async fn fetch_with_retry(&self) -> CatalogResult<RawGrid> {
        let mut attempt = 1;
        loop {
            match self.fetcher.fetch(self.category).await {
                Ok(grid) => return Ok(grid),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        run_id = %self.run_id,
                        category = %self.category,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "🔄 Fetch failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(annotate_attempts(e, attempt)),
            }
        }
    }
}

fn annotate_attempts(error: CatalogError, attempts: u32) -> CatalogError {
    match error {
        CatalogError::Network { url, status, message } if attempts > 1 => CatalogError::Network {
            url,
            status,
            message: format!("{message} (after {attempts} attempts)"),
        },
        other => other,
    }
}
