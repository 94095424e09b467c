//! Tabular parsing infrastructure
//!
//! Turns the raw string grids returned by the remote source into typed
//! product records. Everything here is pure: no I/O, no clocks.

pub mod cell;
pub mod tabular_parser;

pub use tabular_parser::{ParseOutcome, TabularRecordParser, parse_grid};

/// Header row followed by data rows, every cell as text.
pub type RawGrid = Vec<Vec<String>>;

/// Build a [`RawGrid`] from string literals.
pub fn grid_from_rows(rows: &[&[&str]]) -> RawGrid {
    rows.iter()
        .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
        .collect()
}
