//! Grid → record parser for one product category
//!
//! Columns are located by header label, so the remote sheet may reorder or
//! add columns freely. A header without every required label rejects the
//! whole grid; a data row with the wrong number of cells is skipped and the
//! rest of the batch still parses.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::{RawGrid, cell};
use crate::domain::{FieldRow, ProductCategory, ProductRecord, SchemaDescriptor};
use crate::infrastructure::catalog_error::{CatalogError, CatalogResult};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseOutcome {
    /// In input row order.
    pub records: Vec<ProductRecord>,
    /// 1-based grid row numbers (the header is row 0) that were skipped.
    pub skipped_rows: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct TabularRecordParser {
    schema: &'static SchemaDescriptor,
}

impl TabularRecordParser {
    pub fn for_category(category: ProductCategory) -> Self {
        Self {
            schema: category.schema(),
        }
    }

    pub fn category(&self) -> ProductCategory {
        self.schema.category
    }

    pub fn parse(&self, grid: &RawGrid) -> CatalogResult<ParseOutcome> {
        let header = grid.first().map(Vec::as_slice).unwrap_or_default();
        let column_index = self.map_columns(header)?;
        let expected = self.schema.expected_cell_count();

        let mut outcome = ParseOutcome::default();
        for (offset, row) in grid.iter().skip(1).enumerate() {
            let row_number = offset + 1;
            if row.len() != expected {
                let skipped = CatalogError::MalformedRow {
                    row: row_number,
                    expected,
                    actual: row.len(),
                };
                warn!(category = %self.schema.category, "Skipping row: {}", skipped);
                outcome.skipped_rows.push(row_number);
                continue;
            }

            outcome.records.push(self.parse_row(row, &column_index));
        }

        debug!(
            category = %self.schema.category,
            rows = outcome.records.len(),
            skipped = outcome.skipped_rows.len(),
            "Parsed grid"
        );
        Ok(outcome)
    }

    /// Column index of every descriptor field, in descriptor order.
    fn map_columns(&self, header: &[String]) -> CatalogResult<Vec<usize>> {
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(header.len());
        for (index, label) in header.iter().enumerate() {
            // First occurrence of a duplicated label wins.
            positions.entry(normalize_label(label)).or_insert(index);
        }

        let mut missing = Vec::new();
        let mut indices = Vec::with_capacity(self.schema.fields.len());
        for field in self.schema.fields {
            match positions.get(field.header) {
                Some(&index) => indices.push(index),
                None => missing.push(field.header.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(indices)
        } else {
            Err(CatalogError::invalid_schema(self.schema.category, missing))
        }
    }

    fn parse_row(&self, row: &[String], column_index: &[usize]) -> ProductRecord {
        let mut fields = FieldRow::new(self.schema);
        for (field, &index) in self.schema.fields.iter().zip(column_index) {
            let raw = row.get(index).map(String::as_str).unwrap_or_default();
            fields.set(field.column, cell::coerce(field.kind, raw));
        }
        ProductRecord::from_field_row(&fields)
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}

/// Parse `grid` as records of `category`.
pub fn parse_grid(category: ProductCategory, grid: &RawGrid) -> CatalogResult<ParseOutcome> {
    TabularRecordParser::for_category(category).parse(grid)
}
