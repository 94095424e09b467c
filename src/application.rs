//! Application layer - sync orchestration, search state, and app wiring
//!
//! This module coordinates the infrastructure pieces into the two running
//! workflows: syncing the remote catalog and serving live search views.

pub mod catalog_app;
pub mod search_controller;
pub mod search_state;
pub mod sync_coordinator;

// Re-export commonly used items
pub use catalog_app::CatalogApp;
pub use search_controller::{SearchHandle, SearchStateController, SearchView};
pub use search_state::{QueryTicket, SearchInput, SearchState};
pub use sync_coordinator::{CategoryOutcome, SyncCoordinator, SyncReport, SyncStatus};
