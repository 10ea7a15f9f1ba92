//! Shared application state for the query API.

use elitebgs_core::query::QueryEngine;
use elitebgs_db::StateStore;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Query engine over the state store.
    pub engine: QueryEngine,
}

impl AppState {
    /// Create the state around an existing engine.
    pub const fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }

    /// Create the state with a default engine over `store`.
    pub const fn from_store(store: StateStore) -> Self {
        Self::new(QueryEngine::new(store))
    }
}
