//! REST endpoint handlers for the query API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Store connectivity check |
//! | `GET` | `/api/ebgs/v5/factions` | Paged factions, optional history |
//! | `GET` | `/api/ebgs/v5/systems` | Paged systems, optional history |
//! | `GET` | `/api/ebgs/v5/stations` | Paged stations, optional history |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use elitebgs_types::{FactionView, Page, StationView, SystemView};

use crate::error::ApiError;
use crate::params::{self, Params};
use crate::state::AppState;

/// `GET /health`: report whether the state store answers.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.engine.store();
    match store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ok", "store": store.name()})),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"status": "unavailable", "store": store.name()})),
            )
        }
    }
}

/// `GET /api/ebgs/v5/factions`
pub async fn list_factions(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page<FactionView>>, ApiError> {
    let query = params::faction_query(&Params::from(pairs))?;
    Ok(Json(state.engine.factions(&query).await?))
}

/// `GET /api/ebgs/v5/systems`
pub async fn list_systems(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page<SystemView>>, ApiError> {
    let query = params::system_query(&Params::from(pairs))?;
    Ok(Json(state.engine.systems(&query).await?))
}

/// `GET /api/ebgs/v5/stations`
pub async fn list_stations(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page<StationView>>, ApiError> {
    let query = params::station_query(&Params::from(pairs))?;
    Ok(Json(state.engine.stations(&query).await?))
}
