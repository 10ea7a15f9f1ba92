//! Transport watchdog.
//!
//! The ingestion loop stamps an [`ActivityClock`] on every frame. The
//! watchdog polls that clock; once the feed has been silent longer than the
//! inactivity timeout it asks the upstream status endpoint whether EDDN
//! itself is up:
//!
//! - status `2`: the outage is local. Report it, request one reconnect, and
//!   restart the inactivity window.
//! - any other status: upstream is down. Restart the window, no reconnect.
//! - probe failure: do nothing until the next poll.
//!
//! There is no backoff and no retry limit.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Upstream status meaning "the feed is healthy".
pub const STATUS_HEALTHY: i64 = 2;

// ---------------------------------------------------------------------------
// Activity clock
// ---------------------------------------------------------------------------

/// Time of the last received frame, shared between the ingestion loop and
/// the watchdog.
#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    last_ms: AtomicU64,
}

impl ActivityClock {
    /// A clock whose last activity is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Record activity now.
    pub fn touch(&self) {
        self.last_ms.store(self.now_ms(), Ordering::Release);
    }

    /// Time since the last recorded activity.
    pub fn idle(&self) -> Duration {
        let last = self.last_ms.load(Ordering::Acquire);
        Duration::from_millis(self.now_ms().saturating_sub(last))
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Why a status probe produced no answer.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The request failed or the body was not a status document.
    #[error("status request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Source of the upstream feed status.
pub trait StatusProbe: Send + Sync {
    /// Fetch the current upstream status code.
    fn status(&self) -> impl Future<Output = Result<i64, ProbeError>> + Send;
}

/// Receiver of outage reports.
pub trait Reporter: Send + Sync {
    /// A local outage was detected after `idle` without frames.
    fn outage(&self, idle: Duration, relay_url: &str);
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: i64,
}

/// Probes the launcher status endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStatusProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusProbe {
    /// Create a probe for `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.to_owned(),
        })
    }
}

impl StatusProbe for HttpStatusProbe {
    async fn status(&self) -> Result<i64, ProbeError> {
        let body: StatusBody = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.status)
    }
}

/// Reports outages as `alert`-target error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn outage(&self, idle: Duration, relay_url: &str) {
        tracing::error!(
            target: "alert",
            idle_secs = idle.as_secs(),
            relay_url,
            "EDDN feed silent while upstream reports healthy; reconnecting"
        );
    }
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Timing configuration for the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// How often the activity clock is checked.
    pub poll_interval: Duration,
    /// Silence longer than this triggers a status probe.
    pub inactivity_timeout: Duration,
}

/// Result of one watchdog check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Frames arrived within the timeout.
    Active,
    /// Local outage: reported and reconnect requested.
    Reconnect,
    /// Upstream reported the given non-healthy status.
    UpstreamDown(i64),
    /// The status probe failed; nothing was done.
    ProbeFailed,
}

/// Polls the activity clock and requests reconnects on local outages.
#[derive(Debug)]
pub struct Watchdog<P, R> {
    config: WatchdogConfig,
    clock: Arc<ActivityClock>,
    reconnect: Arc<Notify>,
    probe: P,
    reporter: R,
    relay_url: String,
}

impl<P: StatusProbe, R: Reporter> Watchdog<P, R> {
    /// Create a watchdog over `clock`, signalling `reconnect`.
    pub const fn new(
        config: WatchdogConfig,
        clock: Arc<ActivityClock>,
        reconnect: Arc<Notify>,
        probe: P,
        reporter: R,
        relay_url: String,
    ) -> Self {
        Self {
            config,
            clock,
            reconnect,
            probe,
            reporter,
            relay_url,
        }
    }

    /// Perform one check.
    pub async fn check(&self) -> Verdict {
        let idle = self.clock.idle();
        if idle <= self.config.inactivity_timeout {
            return Verdict::Active;
        }

        match self.probe.status().await {
            Ok(STATUS_HEALTHY) => {
                self.reporter.outage(idle, &self.relay_url);
                self.reconnect.notify_one();
                self.clock.touch();
                Verdict::Reconnect
            }
            Ok(status) => {
                info!(status, idle_secs = idle.as_secs(), "upstream feed reports outage");
                self.clock.touch();
                Verdict::UpstreamDown(status)
            }
            Err(e) => {
                warn!(error = %e, "status probe failed");
                Verdict::ProbeFailed
            }
        }
    }

    /// Check every poll interval, forever.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let verdict = self.check().await;
            debug!(?verdict, "watchdog check");
        }
    }
}
