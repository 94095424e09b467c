//! HiFi Catalog - spreadsheet-backed audio product catalog
//!
//! Imports headphone, in-ear monitor, speaker, subwoofer and headphone
//! source listings from a remote spreadsheet, keeps them in a local SQLite
//! store, and serves live category/price filtered views.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::{CatalogApp, CategoryOutcome};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::{init_logging_with_config, log_system_info};

/// Load configuration, start the catalog, run one sync, and print a summary.
pub async fn run() -> Result<()> {
    let config = ConfigManager::new()?
        .load_config()
        .await
        .context("Failed to load configuration")?;

    init_logging_with_config(&config.logging)?;
    log_system_info();

    let app = CatalogApp::start(config).await?;
    let report = app.sync_now().await;
    info!(report = %serde_json::to_string(&report)?, "Sync report");

    println!("🔄 Sync {} finished", report.run_id);
    for (category, outcome) in &report.outcomes {
        match outcome {
            CategoryOutcome::Synced {
                stored, skipped_rows, ..
            } => println!("  ✅ {category}: {stored} stored, {skipped_rows} rows skipped"),
            CategoryOutcome::Failed { error, .. } => println!("  ❌ {category}: {error}"),
        }
    }

    println!("📊 Local catalog:");
    for (category, count) in app.row_counts().await? {
        println!("  {category}: {count} products");
    }

    app.shutdown().await;
    Ok(())
}
