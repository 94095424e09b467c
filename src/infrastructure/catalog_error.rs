//! Catalog error taxonomy
//!
//! Per-record and per-category failures are caught and logged where they
//! happen; only the application root ever sees these as hard errors.

use thiserror::Error;

use crate::domain::ProductCategory;
use crate::infrastructure::config::ConfigError;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Network request failed for {url}: {message}")]
    Network {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid response payload: {reason}")]
    InvalidResponse { reason: String },

    #[error("Invalid schema for {category}: missing fields {missing:?}")]
    InvalidSchema {
        category: ProductCategory,
        missing: Vec<String>,
    },

    #[error("Malformed row {row}: expected {expected} cells, found {actual}")]
    MalformedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CatalogError {
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_schema(category: ProductCategory, missing: Vec<String>) -> Self {
        Self::InvalidSchema { category, missing }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { status: None, .. } => true,
            Self::Network { status: Some(status), .. } => *status >= 500 || *status == 429,
            Self::Storage(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            Self::Storage(sqlx::Error::Database(db)) => {
                // SQLITE_BUSY / SQLITE_LOCKED
                matches!(db.code().as_deref(), Some("5" | "6"))
            }
            Self::InvalidUrl { .. }
            | Self::InvalidResponse { .. }
            | Self::InvalidSchema { .. }
            | Self::MalformedRow { .. }
            | Self::Storage(_)
            | Self::Config(_) => false,
        }
    }

    /// Failures that leave a category's local data stale.
    pub const fn marks_stale(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::InvalidSchema { .. } | Self::InvalidResponse { .. }
        )
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn network(status: Option<u16>) -> CatalogError {
        CatalogError::Network {
            url: "https://example.invalid".into(),
            status,
            message: "boom".into(),
        }
    }

    #[test]
    fn transport_and_server_errors_are_retryable() {
        assert!(network(None).is_retryable());
        assert!(network(Some(503)).is_retryable());
        assert!(network(Some(429)).is_retryable());
        assert!(!network(Some(404)).is_retryable());
    }

    #[test]
    fn schema_errors_are_final() {
        let err = CatalogError::invalid_schema(ProductCategory::Speakers, vec!["price".into()]);
        assert!(!err.is_retryable());
        assert!(err.marks_stale());
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn invalid_url_is_not_retryable() {
        let err = CatalogError::invalid_url("::", "relative URL without a base");
        assert!(!err.is_retryable());
        assert!(!err.marks_stale());
    }
}
