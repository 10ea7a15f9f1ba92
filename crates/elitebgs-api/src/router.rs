//! Axum router construction for the query API.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// - `GET /health`
/// - `GET /api/ebgs/v5/factions`
/// - `GET /api/ebgs/v5/systems`
/// - `GET /api/ebgs/v5/stations`
///
/// CORS allows any origin; the API is read-only and public.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/ebgs/v5/factions", get(handlers::list_factions))
        .route("/api/ebgs/v5/systems", get(handlers::list_systems))
        .route("/api/ebgs/v5/stations", get(handlers::list_stations))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
