//! Document store for the Elite BGS tracker.
//!
//! Holds the current-state documents (systems, factions with their
//! per-system presences, stations) and their append-only history. Two
//! backends implement the same contract:
//!
//! ```text
//! StateStore
//!     |
//!     +-- Postgres(PostgresPool)
//!     |       |-- SystemStore   (systems, system_history)
//!     |       |-- FactionStore  (factions, faction_presences, faction_history)
//!     |       +-- StationStore  (stations, station_history)
//!     |
//!     +-- Memory(MemoryStore)
//! ```
//!
//! Single-row writes are atomic; no transaction spans a document update
//! and a history append.
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool, configuration, migrations
//! - [`system_store`] -- System documents and history
//! - [`faction_store`] -- Faction documents, presences, and history
//! - [`station_store`] -- Station documents and history
//! - [`memory`] -- In-memory backend
//! - [`store`] -- The [`StateStore`] backend switch
//! - [`error`] -- Shared error types

pub mod error;
pub mod faction_store;
pub mod memory;
pub mod postgres;
mod sql;
pub mod station_store;
pub mod store;
pub mod system_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use faction_store::FactionStore;
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use station_store::StationStore;
pub use store::StateStore;
pub use system_store::SystemStore;
