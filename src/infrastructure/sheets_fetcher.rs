//! Remote catalog source
//!
//! [`RemoteCatalogFetcher`] is the seam between the sync pipeline and the
//! network. The production implementation reads one spreadsheet tab per
//! category from the Google Sheets values API; tests substitute in-memory
//! fakes. Fetchers never retry, the sync coordinator owns that policy.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use crate::domain::ProductCategory;
use crate::infrastructure::catalog_error::{CatalogError, CatalogResult};
use crate::infrastructure::config::SourceConfig;
use crate::infrastructure::parsing::RawGrid;

#[async_trait]
pub trait RemoteCatalogFetcher: Send + Sync {
    /// Header row plus data rows for `category`, in sheet order.
    async fn fetch(&self, category: ProductCategory) -> CatalogResult<RawGrid>;
}

/// Body of `GET .../values/{range}`. Google omits `values` for an empty range.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsCatalogFetcher {
    client: Client,
    config: SourceConfig,
}

impl SheetsCatalogFetcher {
    pub fn new(config: SourceConfig) -> CatalogResult<Self> {
        Url::parse(&config.base_url).map_err(|e| CatalogError::invalid_url(&config.base_url, e))?;

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| CatalogError::Network {
                url: config.base_url.clone(),
                status: None,
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    /// `{base_url}/{sheet name}?valueRenderOption=...&key=...`, with the sheet
    /// name percent-encoded as a single path segment.
    pub fn request_url(&self, category: ProductCategory) -> CatalogResult<Url> {
        let mut url =
            Url::parse(&self.config.base_url).map_err(|e| CatalogError::invalid_url(&self.config.base_url, e))?;

        url.path_segments_mut()
            .map_err(|()| CatalogError::invalid_url(&self.config.base_url, "URL cannot be a base"))?
            .pop_if_empty()
            .push(category.sheet_name());

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("valueRenderOption", &self.config.value_render_option);
            if let Some(key) = self.config.api_key.as_deref().filter(|key| !key.is_empty()) {
                query.append_pair("key", key);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl RemoteCatalogFetcher for SheetsCatalogFetcher {
    async fn fetch(&self, category: ProductCategory) -> CatalogResult<RawGrid> {
        let url = self.request_url(category)?;
        // Never log the query string: it may carry the API key.
        let display_url = format!("{}{}", url.origin().ascii_serialization(), url.path());
        info!("🌐 Fetching {} from {}", category, display_url);

        let response = self.client.get(url).send().await.map_err(|e| CatalogError::Network {
            url: display_url.clone(),
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("❌ HTTP error {} for {}", status, category);
            return Err(CatalogError::Network {
                url: display_url,
                status: Some(status.as_u16()),
                message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
            });
        }

        let body = response.text().await.map_err(|e| CatalogError::Network {
            url: display_url.clone(),
            status: Some(status.as_u16()),
            message: e.without_url().to_string(),
        })?;

        let grid = decode_value_range(&body)?;
        debug!(%category, rows = grid.len(), "Fetched grid");
        Ok(grid)
    }
}

/// Decode a values-API body into text cells. Numbers and booleans are
/// rendered as text; `null` becomes an empty cell.
pub fn decode_value_range(body: &str) -> CatalogResult<RawGrid> {
    let range: ValueRange = serde_json::from_str(body).map_err(|e| CatalogError::InvalidResponse {
        reason: format!("not a value range: {e}"),
    })?;

    Ok(range
        .values
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect())
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
