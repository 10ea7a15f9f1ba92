//! Error types for the listener.
//!
//! Only setup failures (configuration, store bootstrap, relay connect) end
//! the process. Per-message failures are logged and the message dropped.

use elitebgs_core::config::ConfigError;
use elitebgs_core::reconcile::ReconcileError;
use elitebgs_db::DbError;

/// Errors that can occur during listener operation.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The state store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// The relay socket failed to connect or receive.
    #[error("relay error: {0}")]
    Relay(#[from] zeromq::ZmqError),

    /// A journal payload did not match the expected shape.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Reconciliation failed.
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// The status probe HTTP client could not be built.
    #[error("status client error: {0}")]
    StatusClient(#[from] reqwest::Error),
}
