//! Domain module - catalog entities and value objects
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod category;
pub mod product;
pub mod schema;
pub mod search;

pub use category::ProductCategory;
pub use product::{Headphone, HeadphoneSource, InEarMonitor, ProductId, ProductRecord, Speaker, Subwoofer};
pub use schema::{FieldKind, FieldRow, FieldSpec, FieldValue, SchemaDescriptor};
pub use search::{CatalogSnapshot, PriceRange, SearchCriteria};
