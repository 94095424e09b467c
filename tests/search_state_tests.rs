//! Search view behaviour across syncs, driven through `CatalogApp`
use async_trait::async_trait;
use hifi_catalog_lib::application::{CatalogApp, SearchView};
use hifi_catalog_lib::domain::{PriceRange, ProductCategory};
use hifi_catalog_lib::infrastructure::config::AppConfig;
use hifi_catalog_lib::infrastructure::parsing::grid_from_rows;
use hifi_catalog_lib::infrastructure::{CatalogError, CatalogResult, RawGrid, RemoteCatalogFetcher};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::time::timeout;

/// Serves one in-ear grid that tests can swap between syncs.
struct SwappableSheets {
    in_ears: Mutex<Option<RawGrid>>,
}

impl SwappableSheets {
    fn new(grid: Option<RawGrid>) -> Arc<Self> {
        Arc::new(Self {
            in_ears: Mutex::new(grid),
        })
    }

    fn replace(&self, grid: Option<RawGrid>) {
        *self.in_ears.lock().expect("lock") = grid;
    }
}

#[async_trait]
impl RemoteCatalogFetcher for SwappableSheets {
    async fn fetch(&self, category: ProductCategory) -> CatalogResult<RawGrid> {
        let grid = match category {
            ProductCategory::InEars => self.in_ears.lock().expect("lock").clone(),
            _ => Some(Vec::new()),
        };
        grid.ok_or_else(|| CatalogError::Network {
            url: "fake://sheets/In-Ears".into(),
            status: Some(502),
            message: "bad gateway".into(),
        })
    }
}

fn in_ears(rows: &[(&str, &str)]) -> RawGrid {
    let mut grid = grid_from_rows(&[&["name", "url", "img", "price", "category"]]);
    for (name, price) in rows {
        grid.push(vec![(*name).into(), String::new(), String::new(), (*price).into(), "neutral".into()]);
    }
    grid
}

async fn start(dir: &TempDir, fetcher: Arc<SwappableSheets>, debounce_ms: u64) -> CatalogApp {
    let mut config = AppConfig::default();
    config.storage.database_path = Some(dir.path().join("catalog.sqlite3"));
    config.search.debounce_ms = debounce_ms;
    CatalogApp::start_with_fetcher(config, fetcher).await.expect("app")
}

async fn wait_for(views: &mut watch::Receiver<SearchView>, predicate: impl Fn(&SearchView) -> bool) -> SearchView {
    timeout(Duration::from_secs(5), views.wait_for(|view| predicate(view)))
        .await
        .expect("view in time")
        .expect("controller alive")
        .clone()
}

#[tokio::test]
async fn sync_after_selection_refreshes_the_visible_list() {
    let dir = TempDir::new().expect("temp dir");
    let sheets = SwappableSheets::new(Some(in_ears(&[("Blessing 2", "320"), ("Aria", "80"), ("Solo", "3000")])));
    let app = start(&dir, sheets, 0).await;
    let mut views = app.search().subscribe();

    app.search().set_category(ProductCategory::InEars);
    app.sync_now().await;

    let view = wait_for(&mut views, |v| v.products.len() == 2).await;
    assert_eq!(view.products.names(), vec!["Aria", "Blessing 2"]);
    assert_eq!(view.criteria.price_range, PriceRange::new(0, 2000));
    assert!(!view.stale);

    app.shutdown().await;
}

#[tokio::test]
async fn widening_the_price_range_requeries() {
    let dir = TempDir::new().expect("temp dir");
    let sheets = SwappableSheets::new(Some(in_ears(&[("Aria", "80"), ("Solo", "3000")])));
    let app = start(&dir, sheets, 0).await;
    app.sync_now().await;
    let mut views = app.search().subscribe();

    app.search().set_category(ProductCategory::InEars);
    wait_for(&mut views, |v| v.products.len() == 1).await;

    app.search().set_price_range(0..=5000_i64);
    let view = wait_for(&mut views, |v| v.products.len() == 2).await;
    assert_eq!(view.products.names(), vec!["Aria", "Solo"]);

    app.shutdown().await;
}

#[tokio::test]
async fn failed_resync_keeps_rows_and_flags_the_view_stale() {
    let dir = TempDir::new().expect("temp dir");
    let sheets = SwappableSheets::new(Some(in_ears(&[("Aria", "80")])));
    let app = start(&dir, Arc::clone(&sheets), 0).await;
    app.sync_now().await;
    let mut views = app.search().subscribe();

    app.search().set_category(ProductCategory::InEars);
    wait_for(&mut views, |v| v.products.len() == 1).await;

    sheets.replace(None);
    app.sync_now().await;
    let view = wait_for(&mut views, |v| v.stale).await;
    assert_eq!(view.products.names(), vec!["Aria"]);

    sheets.replace(Some(in_ears(&[("Aria", "80"), ("Kato", "190")])));
    app.sync_now().await;
    let view = wait_for(&mut views, |v| !v.stale && v.products.len() == 2).await;
    assert_eq!(view.products.names(), vec!["Aria", "Kato"]);

    app.shutdown().await;
}

#[tokio::test]
async fn debounced_controller_still_converges_on_the_latest_selection() {
    let dir = TempDir::new().expect("temp dir");
    let sheets = SwappableSheets::new(Some(in_ears(&[("Aria", "80"), ("Kato", "190"), ("Solo", "3000")])));
    let app = start(&dir, sheets, 30).await;
    app.sync_now().await;
    let mut views = app.search().subscribe();

    app.search().set_category(ProductCategory::InEars);
    for max in [50_i64, 100, 150, 200, 250] {
        app.search().set_price_range(0..=max);
    }

    let view = wait_for(&mut views, |v| v.criteria.price_range.max() == 250 && v.generation > 0).await;
    assert_eq!(view.products.names(), vec!["Aria", "Kato"]);

    app.shutdown().await;
}
