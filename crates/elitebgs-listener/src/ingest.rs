//! The ingestion loop.
//!
//! Single consumer: each frame is decoded and fully reconciled before the
//! next one is read. A reconnect request from the watchdog, or a socket
//! error, tears the subscription down and opens a fresh one.

use std::sync::Arc;

use elitebgs_core::reconcile::Applied;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::decoder;
use crate::dispatcher::Dispatcher;
use crate::error::ListenerError;
use crate::transport::Subscription;
use crate::watchdog::ActivityClock;

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The envelope was dispatched.
    Applied(Applied),
    /// The frame or its payload was rejected and dropped.
    Dropped,
}

/// Reads relay frames and feeds them to the dispatcher.
#[derive(Debug)]
pub struct Ingestor {
    relay_url: String,
    dispatcher: Dispatcher,
    clock: Arc<ActivityClock>,
    reconnect: Arc<Notify>,
}

impl Ingestor {
    /// Create an ingestor for `relay_url`.
    pub const fn new(
        relay_url: String,
        dispatcher: Dispatcher,
        clock: Arc<ActivityClock>,
        reconnect: Arc<Notify>,
    ) -> Self {
        Self {
            relay_url,
            dispatcher,
            clock,
            reconnect,
        }
    }

    /// Decode and dispatch one frame. Failures are logged, never returned.
    pub async fn handle_frame(&self, frame: &[u8]) -> FrameOutcome {
        self.clock.touch();

        let envelope = match decoder::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, bytes = frame.len(), "dropping undecodable frame");
                return FrameOutcome::Dropped;
            }
        };

        match self.dispatcher.dispatch(&envelope).await {
            Ok(applied) => FrameOutcome::Applied(applied),
            Err(e) => {
                warn!(
                    error = %e,
                    schema = %envelope.schema_ref,
                    software = %envelope.header.software_name,
                    "dropping message"
                );
                FrameOutcome::Dropped
            }
        }
    }

    /// Consume one subscription until it fails or a reconnect is requested.
    async fn consume(&self, subscription: &mut Subscription) {
        loop {
            tokio::select! {
                () = self.reconnect.notified() => {
                    info!(url = subscription.url(), "reconnect requested");
                    return;
                }
                frame = subscription.recv() => match frame {
                    Ok(frame) => {
                        self.handle_frame(&frame).await;
                    }
                    Err(e) => {
                        warn!(error = %e, url = subscription.url(), "relay receive failed");
                        return;
                    }
                },
            }
        }
    }

    /// Subscribe and ingest forever, re-subscribing after every teardown.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Relay`] if a (re)connect fails.
    pub async fn run(&self) -> Result<(), ListenerError> {
        loop {
            let mut subscription = Subscription::connect(&self.relay_url).await?;
            self.clock.touch();
            self.consume(&mut subscription).await;
            subscription.close().await;
        }
    }
}
