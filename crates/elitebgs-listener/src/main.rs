//! EDDN listener entry point for the Elite BGS tracker.
//!
//! Subscribes to the EDDN relay, decodes every frame, and reconciles
//! journal events into the state store. A watchdog task forces a
//! reconnect when the feed goes quiet while upstream reports healthy.
//!
//! # Architecture
//!
//! ```text
//! relay (ZMQ SUB) --> decoder --> schema dispatcher --> reconciler --> store
//!        ^                                   |
//!        +------ watchdog (reconnect) <------+ activity clock
//! ```

mod decoder;
mod dispatcher;
mod error;
mod ingest;
mod transport;
mod watchdog;

use std::sync::Arc;
use std::time::Duration;

use elitebgs_core::reconcile::Reconciler;
use elitebgs_core::startup;
use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::dispatcher::{Dispatcher, SchemaRegistry};
use crate::error::ListenerError;
use crate::ingest::Ingestor;
use crate::watchdog::{ActivityClock, HttpStatusProbe, TracingReporter, Watchdog, WatchdogConfig};

/// Application entry point.
///
/// Loads configuration, opens the state store, starts the watchdog on a
/// background task, then runs the ingestion loop until a relay connect
/// fails.
///
/// # Errors
///
/// Returns an error if initialization or a relay connect fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = startup::load_config().map_err(ListenerError::from)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        config_path = %startup::config_path().display(),
        relay_url = config.feed.relay_url,
        status_url = config.feed.status_url,
        poll_interval_ms = config.feed.poll_interval_ms,
        inactivity_timeout_ms = config.feed.inactivity_timeout_ms,
        "elitebgs-listener starting"
    );

    let store = startup::open_store(&config.infrastructure)
        .await
        .map_err(ListenerError::from)?;
    info!(backend = store.name(), "state store ready");

    let clock = Arc::new(ActivityClock::new());
    let reconnect = Arc::new(Notify::new());

    let probe = HttpStatusProbe::new(
        &config.feed.status_url,
        Duration::from_millis(config.feed.status_timeout_ms),
    )
    .map_err(ListenerError::from)?;
    let watchdog = Watchdog::new(
        WatchdogConfig {
            poll_interval: Duration::from_millis(config.feed.poll_interval_ms),
            inactivity_timeout: Duration::from_millis(config.feed.inactivity_timeout_ms),
        },
        Arc::clone(&clock),
        Arc::clone(&reconnect),
        probe,
        TracingReporter,
        config.feed.relay_url.clone(),
    );
    let watchdog_handle = tokio::spawn(watchdog.run());

    let dispatcher = Dispatcher::new(SchemaRegistry::with_defaults(), Reconciler::new(store));
    let ingestor = Ingestor::new(config.feed.relay_url.clone(), dispatcher, clock, reconnect);

    info!("entering ingestion loop");
    let result = ingestor.run().await;
    watchdog_handle.abort();
    result?;

    Ok(())
}
