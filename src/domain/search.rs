//! Search criteria and query results

use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::domain::category::ProductCategory;
use crate::domain::product::ProductRecord;

/// Closed price interval `[min, max]`.
///
/// Negative bounds are clamped to zero. An inverted interval is kept as is
/// and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceRange {
    min: i64,
    max: i64,
}

impl PriceRange {
    pub const FULL: Self = Self { min: 0, max: i64::MAX };

    pub fn new(min: i64, max: i64) -> Self {
        Self { min: min.max(0), max: max.max(0) }
    }

    pub const fn min(&self) -> i64 {
        self.min
    }

    pub const fn max(&self) -> i64 {
        self.max
    }

    pub const fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub const fn contains(&self, price: i64) -> bool {
        self.min <= price && price <= self.max
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::FULL
    }
}

impl From<std::ops::RangeInclusive<i64>> for PriceRange {
    fn from(range: std::ops::RangeInclusive<i64>) -> Self {
        Self::new(*range.start(), *range.end())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// No category selected means no query is issued.
    pub category: Option<ProductCategory>,
    pub price_range: PriceRange,
}

impl SearchCriteria {
    pub fn new(category: impl Into<Option<ProductCategory>>, price_range: impl Into<PriceRange>) -> Self {
        Self { category: category.into(), price_range: price_range.into() }
    }
}

/// Records matching a [`SearchCriteria`], sorted by name ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogSnapshot(Vec<ProductRecord>);

impl CatalogSnapshot {
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Sorts by name so the ordering holds whatever the caller passes in.
    pub fn from_records(mut records: Vec<ProductRecord>) -> Self {
        records.sort_by(|a, b| a.name().cmp(b.name()));
        Self(records)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(ProductRecord::name).collect()
    }

    pub fn into_records(self) -> Vec<ProductRecord> {
        self.0
    }
}

impl Deref for CatalogSnapshot {
    type Target = [ProductRecord];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
