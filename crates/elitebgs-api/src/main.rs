//! Query API entry point for the Elite BGS tracker.

use std::sync::Arc;

use elitebgs_api::{AppState, ServerConfig, start_server};
use elitebgs_core::query::QueryEngine;
use elitebgs_core::startup;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// Loads configuration, opens the state store, and serves the query API
/// until `Ctrl-C`.
///
/// # Errors
///
/// Returns an error if initialization fails or the server cannot bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = startup::load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        config_path = %startup::config_path().display(),
        page_size = config.query.page_size,
        history_concurrency = config.query.history_concurrency,
        "elitebgs-api starting"
    );

    let store = startup::open_store(&config.infrastructure).await?;
    info!(backend = store.name(), "state store ready");

    let state = Arc::new(AppState::new(QueryEngine::from_config(store, &config.query)));
    start_server(&ServerConfig::from(&config.api), state).await?;

    Ok(())
}
