//! Ingestion and query logic for the Elite BGS tracker.
//!
//! This crate sits between the feed listener, the HTTP API, and the state
//! store. It owns the rules that turn journal events into documents and
//! history, and the rules that turn query requests into pages.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `elitebgs-config.yaml` into
//!   strongly-typed structs.
//! - [`normalize`] -- Projection of journal payloads into normalized
//!   document values.
//! - [`reconcile`] -- [`Reconciler`]: staleness, change detection, and
//!   history appends per system, faction presence, and station.
//! - [`query`] -- [`QueryEngine`]: validated, paged queries with optional
//!   history retrieval.
//! - [`startup`] -- Config file resolution and state store bootstrap shared
//!   by the binaries.
//!
//! [`Reconciler`]: reconcile::Reconciler
//! [`QueryEngine`]: query::QueryEngine

pub mod config;
pub mod normalize;
pub mod query;
pub mod reconcile;
pub mod startup;
