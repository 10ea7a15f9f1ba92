//! Shared type definitions for the Elite BGS tracker.
//!
//! This crate is the single source of truth for the documents, history
//! records, feed payloads and query shapes used across the workspace.
//! Document and view types flow to `TypeScript` via `ts-rs` for the
//! frontend.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for document and history ids
//! - [`documents`] -- Current-state system, faction and station documents
//! - [`history`] -- Append-only history snapshots
//! - [`journal`] -- EDDN envelope and journal event payloads
//! - [`filter`] -- Typed predicate slots for current-entity queries
//! - [`query`] -- History modes, pages, and query result views

pub mod documents;
pub mod filter;
pub mod history;
pub mod ids;
pub mod journal;
pub mod query;

// Re-export all public types at crate root for convenience.
pub use documents::{
    ActiveState, FactionDoc, FactionPresence, StationDoc, StationEconomy, SystemDoc,
    SystemFaction, TrendingState, name_key,
};
pub use filter::{FactionFilter, StationFilter, SystemFilter};
pub use history::{FactionHistory, StationHistory, SystemHistory};
pub use ids::{FactionId, HistoryId, StationId, SystemId};
pub use journal::{
    ControllingFaction, Envelope, Header, JOURNAL_SCHEMA, JOURNAL_SCHEMA_LEGACY,
    JournalActiveState, JournalEconomy, JournalFaction, JournalMessage, JournalTrendingState,
};
pub use query::{
    FactionView, HistoryMode, Page, PresenceView, StationView, SystemView, WINDOW_SPAN_MS,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Files are written to `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::SystemId::export_all();
        let _ = crate::ids::FactionId::export_all();
        let _ = crate::ids::StationId::export_all();
        let _ = crate::ids::HistoryId::export_all();

        // Documents
        let _ = crate::documents::SystemFaction::export_all();
        let _ = crate::documents::SystemDoc::export_all();
        let _ = crate::documents::ActiveState::export_all();
        let _ = crate::documents::TrendingState::export_all();
        let _ = crate::documents::FactionPresence::export_all();
        let _ = crate::documents::FactionDoc::export_all();
        let _ = crate::documents::StationEconomy::export_all();
        let _ = crate::documents::StationDoc::export_all();

        // History
        let _ = crate::history::SystemHistory::export_all();
        let _ = crate::history::FactionHistory::export_all();
        let _ = crate::history::StationHistory::export_all();

        // Views
        let _ = crate::query::PresenceView::export_all();
        let _ = crate::query::FactionView::export_all();
        let _ = crate::query::SystemView::export_all();
        let _ = crate::query::StationView::export_all();
    }
}
