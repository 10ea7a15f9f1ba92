//! Query API server for the Elite BGS tracker.
//!
//! This crate provides an Axum HTTP server over the history query engine:
//!
//! - **REST endpoints** under `/api/ebgs/v5/` for factions, systems, and
//!   stations, each paged and optionally carrying history
//! - **Health endpoint** (`/health`) reporting store connectivity
//!
//! # Architecture
//!
//! Handlers parse the query string into a typed query (see [`params`]),
//! hand it to the shared [`QueryEngine`], and serialize the resulting page.
//! Contract violations map to `400`; store failures to `500`.
//!
//! [`QueryEngine`]: elitebgs_core::query::QueryEngine

pub mod error;
pub mod handlers;
pub mod params;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
