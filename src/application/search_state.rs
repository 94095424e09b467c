//! Search selection state machine
//!
//! Holds the latest value of every input the visible product list depends
//! on: selected category, price range, and storage data version. Every input
//! goes through [`SearchState::apply`], the single place that decides whether
//! a new query is needed. Each query is stamped with a generation so a slow
//! result can never replace a newer one.

use serde::{Deserialize, Serialize};

use crate::domain::{PriceRange, ProductCategory, SearchCriteria};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchInput {
    SetCategory(Option<ProductCategory>),
    SetPriceRange(PriceRange),
    /// Storage committed; carries the change sequence number.
    DataChanged(u64),
}

/// A query to run, stamped with the generation that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTicket {
    pub generation: u64,
    pub criteria: SearchCriteria,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    category: Option<ProductCategory>,
    price_range: PriceRange,
    data_version: u64,
    generation: u64,
    published: u64,
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new(PriceRange::FULL)
    }
}

impl SearchState {
    /// No category selected, so the first view is empty.
    pub const fn new(price_range: PriceRange) -> Self {
        Self {
            category: None,
            price_range,
            data_version: 0,
            generation: 0,
            published: 0,
        }
    }

    pub const fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            category: self.category,
            price_range: self.price_range,
        }
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn data_version(&self) -> u64 {
        self.data_version
    }

    /// Fold one input into the state. Returns the query to run when the
    /// input changed something the result depends on.
    pub fn apply(&mut self, input: SearchInput) -> Option<QueryTicket> {
        let changed = match input {
            SearchInput::SetCategory(category) => {
                let changed = self.category != category;
                self.category = category;
                changed
            }
            SearchInput::SetPriceRange(range) => {
                let changed = self.price_range != range;
                self.price_range = range;
                changed
            }
            SearchInput::DataChanged(version) => {
                // Out-of-order or repeated notifications still mean "data moved".
                self.data_version = self.data_version.max(version);
                true
            }
        };

        changed.then(|| self.next_ticket())
    }

    /// Force a query for the current selection.
    pub fn refresh(&mut self) -> QueryTicket {
        self.next_ticket()
    }

    /// Whether a result for `generation` should become visible. Accepting a
    /// result retires every older generation.
    pub fn accept(&mut self, generation: u64) -> bool {
        if generation > self.published && generation <= self.generation {
            self.published = generation;
            true
        } else {
            false
        }
    }

    fn next_ticket(&mut self) -> QueryTicket {
        self.generation += 1;
        QueryTicket {
            generation: self.generation,
            criteria: self.criteria(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_has_no_category() {
        let state = SearchState::new(PriceRange::new(0, 2000));
        assert_eq!(state.criteria(), SearchCriteria::new(None::<ProductCategory>, 0..=2000_i64));
        assert_eq!(state.generation(), 0);
    }

    #[test]
    fn every_distinct_input_yields_a_newer_ticket() {
        let mut state = SearchState::default();

        let first = state.apply(SearchInput::SetCategory(Some(ProductCategory::Speakers))).expect("ticket");
        let second = state.apply(SearchInput::SetPriceRange(PriceRange::new(0, 1000))).expect("ticket");
        let third = state.apply(SearchInput::DataChanged(7)).expect("ticket");

        assert!(first.generation < second.generation && second.generation < third.generation);
        assert_eq!(third.criteria, SearchCriteria::new(ProductCategory::Speakers, 0..=1000_i64));
        assert_eq!(state.data_version(), 7);
    }

    #[test]
    fn repeating_the_same_selection_does_not_query() {
        let mut state = SearchState::default();
        assert!(state.apply(SearchInput::SetCategory(Some(ProductCategory::InEars))).is_some());
        assert!(state.apply(SearchInput::SetCategory(Some(ProductCategory::InEars))).is_none());
        assert!(state.apply(SearchInput::SetPriceRange(PriceRange::FULL)).is_none());
    }

    #[test]
    fn data_changes_always_query_even_when_out_of_order() {
        let mut state = SearchState::default();
        assert!(state.apply(SearchInput::DataChanged(5)).is_some());
        assert!(state.apply(SearchInput::DataChanged(3)).is_some());
        assert_eq!(state.data_version(), 5);
    }

    #[test]
    fn stale_results_are_rejected() {
        let mut state = SearchState::default();
        let older = state.apply(SearchInput::SetCategory(Some(ProductCategory::Headphones))).expect("ticket");
        let newer = state.apply(SearchInput::SetPriceRange(PriceRange::new(0, 500))).expect("ticket");

        assert!(state.accept(newer.generation));
        assert!(!state.accept(older.generation), "older result arrived late");
        assert!(!state.accept(newer.generation), "duplicate delivery");
    }

    #[test]
    fn intermediate_results_may_show_while_newer_queries_run() {
        let mut state = SearchState::default();
        let older = state.apply(SearchInput::SetCategory(Some(ProductCategory::Headphones))).expect("ticket");
        let newer = state.apply(SearchInput::SetPriceRange(PriceRange::new(0, 500))).expect("ticket");

        assert!(state.accept(older.generation));
        assert!(state.accept(newer.generation));
    }

    #[test]
    fn unknown_future_generations_are_rejected() {
        let mut state = SearchState::default();
        assert!(!state.accept(1));
        let ticket = state.refresh();
        assert!(!state.accept(ticket.generation + 1));
        assert!(state.accept(ticket.generation));
    }
}
