//! Search state controller
//!
//! Drives [`SearchState`] from three sources: selection changes sent through
//! a [`SearchHandle`], storage change notifications, and finished queries.
//! Queries run on their own tasks so the loop keeps accepting input; their
//! results come back to the loop, which drops superseded generations and
//! publishes the rest on a `watch` channel for the UI.

use futures::{FutureExt, StreamExt};
use serde::Serialize;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::search_state::{QueryTicket, SearchInput, SearchState};
use crate::application::sync_coordinator::SyncStatus;
use crate::domain::{CatalogSnapshot, PriceRange, ProductCategory, SearchCriteria};
use crate::infrastructure::catalog_error::CatalogResult;
use crate::infrastructure::catalog_repository::CatalogRepository;
use crate::infrastructure::change_notifier::{ChangeEvent, ChangeStream};
use crate::infrastructure::config::SearchConfig;

/// What the UI renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchView {
    pub criteria: SearchCriteria,
    pub products: CatalogSnapshot,
    /// Generation of the query that produced `products`; 0 before any query.
    pub generation: u64,
    /// The selected category's last sync failed.
    pub stale: bool,
}

struct QueryResult {
    ticket: QueryTicket,
    outcome: CatalogResult<CatalogSnapshot>,
}

/// Client side of a running controller.
pub struct SearchHandle {
    inputs: mpsc::UnboundedSender<SearchInput>,
    views: watch::Receiver<SearchView>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SearchHandle {
    pub fn set_category(&self, category: impl Into<Option<ProductCategory>>) {
        self.send(SearchInput::SetCategory(category.into()));
    }

    pub fn set_price_range(&self, range: impl Into<PriceRange>) {
        self.send(SearchInput::SetPriceRange(range.into()));
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchView> {
        self.views.clone()
    }

    pub fn current(&self) -> SearchView {
        self.views.borrow().clone()
    }

    /// Stop the loop and wait for it to exit. In-flight queries finish on
    /// their own; their results are discarded.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Search controller task ended abnormally: {}", e);
        }
    }

    fn send(&self, input: SearchInput) {
        if self.inputs.send(input).is_err() {
            debug!(?input, "Search controller stopped; input dropped");
        }
    }
}

pub struct SearchStateController {
    repository: Arc<CatalogRepository>,
    state: SearchState,
    debounce: Duration,
    changes: ChangeStream,
    status: Option<watch::Receiver<SyncStatus>>,
    views: watch::Sender<SearchView>,
    results_tx: mpsc::UnboundedSender<QueryResult>,
    results_rx: mpsc::UnboundedReceiver<QueryResult>,
    pending: Option<QueryTicket>,
    deadline: Option<Instant>,
}

impl SearchStateController {
    /// Start the controller on the current tokio runtime.
    pub fn spawn(
        repository: Arc<CatalogRepository>,
        config: &SearchConfig,
        status: Option<watch::Receiver<SyncStatus>>,
    ) -> SearchHandle {
        let state = SearchState::new(config.initial_price_range());
        let (views, views_rx) = watch::channel(SearchView {
            criteria: state.criteria(),
            ..SearchView::default()
        });
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let controller = Self {
            changes: repository.subscribe_to_changes(),
            repository,
            state,
            debounce: Duration::from_millis(config.debounce_ms),
            status,
            views,
            results_tx,
            results_rx,
            pending: None,
            deadline: None,
        };

        info!(debounce_ms = config.debounce_ms, "🔎 Search controller started");
        let task = tokio::spawn(controller.run(inputs_rx, cancel.clone()));

        SearchHandle {
            inputs: inputs_tx,
            views: views_rx,
            cancel,
            task,
        }
    }

    async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<SearchInput>, cancel: CancellationToken) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                () = cancel.cancelled() => break,

                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(input),
                    // Every handle is gone.
                    None => break,
                },

                event = next_change(&mut self.changes) => {
                    let latest = self.drain_changes(event);
                    self.handle_input(SearchInput::DataChanged(latest.sequence));
                }

                Some(result) = self.results_rx.recv() => self.handle_result(result),

                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    if let Some(ticket) = self.pending.take() {
                        self.dispatch(ticket);
                    }
                }

                () = status_changed(&mut self.status) => self.republish_stale_flag(),
            }
        }

        info!("🛑 Search controller stopped");
    }

    fn handle_input(&mut self, input: SearchInput) {
        let Some(ticket) = self.state.apply(input) else {
            return;
        };

        if self.debounce.is_zero() {
            self.dispatch(ticket);
        } else {
            // Coalesce everything that arrives within one window.
            self.pending = Some(ticket);
            self.deadline.get_or_insert_with(|| Instant::now() + self.debounce);
        }
    }

    /// Collapse a burst of already-delivered change events into the latest.
    fn drain_changes(&mut self, first: ChangeEvent) -> ChangeEvent {
        let mut latest = first;
        while let Some(Some(event)) = self.changes.next().now_or_never() {
            latest = event;
        }
        latest
    }

    fn dispatch(&mut self, ticket: QueryTicket) {
        if ticket.criteria.category.is_none() {
            // Nothing selected: publish an empty list without touching storage.
            self.handle_result(QueryResult {
                ticket,
                outcome: Ok(CatalogSnapshot::empty()),
            });
            return;
        }

        debug!(generation = ticket.generation, criteria = ?ticket.criteria, "Dispatching query");
        let repository = Arc::clone(&self.repository);
        let results = self.results_tx.clone();
        tokio::spawn(async move {
            let outcome = repository.query(&ticket.criteria).await;
            // The loop may already be gone.
            let _ = results.send(QueryResult { ticket, outcome });
        });
    }

    fn handle_result(&mut self, result: QueryResult) {
        let QueryResult { ticket, outcome } = result;
        if !self.state.accept(ticket.generation) {
            debug!(generation = ticket.generation, "Discarding superseded query result");
            return;
        }

        match outcome {
            Ok(products) => {
                debug!(generation = ticket.generation, products = products.len(), "Publishing search view");
                let stale = self.is_stale(ticket.criteria.category);
                self.views.send_replace(SearchView {
                    criteria: ticket.criteria,
                    products,
                    generation: ticket.generation,
                    stale,
                });
            }
            Err(e) => {
                warn!(generation = ticket.generation, "Catalog query failed; keeping previous view: {}", e);
            }
        }
    }

    fn republish_stale_flag(&mut self) {
        let category = self.views.borrow().criteria.category;
        let stale = self.is_stale(category);
        self.views.send_if_modified(|view| {
            let modified = view.stale != stale;
            view.stale = stale;
            modified
        });
    }

    fn is_stale(&self, category: Option<ProductCategory>) -> bool {
        match (category, &self.status) {
            (Some(category), Some(status)) => status.borrow().is_stale(category),
            _ => false,
        }
    }
}

async fn next_change(changes: &mut ChangeStream) -> ChangeEvent {
    match changes.next().await {
        Some(event) => event,
        None => pending().await,
    }
}

async fn status_changed(status: &mut Option<watch::Receiver<SyncStatus>>) {
    if let Some(receiver) = status {
        if receiver.changed().await.is_ok() {
            return;
        }
    }
    // No status source, or the coordinator is gone.
    pending::<()>().await;
}
