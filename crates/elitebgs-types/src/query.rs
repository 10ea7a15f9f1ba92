//! Query result shapes: history modes, pages, and the views returned to
//! API clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::documents::{FactionPresence, StationDoc, SystemDoc};
use crate::history::{FactionHistory, StationHistory, SystemHistory};
use crate::ids::{FactionId, SystemId};

/// Span used to derive a missing time-window bound: seven days.
pub const WINDOW_SPAN_MS: i64 = 604_800_000;

/// Which history rows to attach to each returned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Rows with `from <= updated_at <= to`, oldest first.
    Window {
        /// Inclusive lower bound.
        from: DateTime<Utc>,
        /// Inclusive upper bound.
        to: DateTime<Utc>,
    },
    /// The `count` most recent rows, newest first.
    Latest {
        /// Maximum rows per entity (per presence for factions).
        count: u32,
    },
}

impl HistoryMode {
    /// Whether a history row timestamp falls inside this mode's window.
    ///
    /// Latest-N ignores time bounds, so every row qualifies.
    pub fn admits(&self, at: DateTime<Utc>) -> bool {
        match self {
            Self::Window { from, to } => *from <= at && at <= *to,
            Self::Latest { .. } => true,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Page<T> {
    /// Documents on this page.
    pub docs: Vec<T>,
    /// Documents matching the filter across all pages.
    pub total: u64,
    /// Page size.
    pub limit: u32,
    /// 1-based page number.
    pub page: u32,
    /// Number of pages, `ceil(total / limit)`.
    pub pages: u32,
    /// Whether a previous page exists.
    #[serde(rename = "hasPrevPage")]
    pub has_prev_page: bool,
    /// Whether a following page exists.
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// Assemble a page from its documents and the unpaged match count.
    pub fn new(docs: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX)
        };
        Self {
            docs,
            total,
            limit,
            page,
            pages,
            has_prev_page: page > 1,
            has_next_page: page < pages,
        }
    }

    /// Offset of the first document on `page` for a given page size.
    pub fn offset(page: u32, limit: u32) -> u64 {
        u64::from(page.saturating_sub(1)).saturating_mul(u64::from(limit))
    }
}

/// A faction presence enriched with the identity of its system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PresenceView {
    /// The presence record itself.
    #[serde(flatten)]
    pub presence: FactionPresence,
    /// Id of the system with the same lower-cased name, if known.
    pub system_id: Option<SystemId>,
    /// Full current system document, when requested.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub system_details: Option<SystemDoc>,
}

/// A faction as returned by the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FactionView {
    /// Document id.
    pub id: FactionId,
    /// Display name.
    pub name: String,
    /// Lower-cased name.
    pub name_lower: String,
    /// Government type.
    pub government: Option<String>,
    /// Allegiance.
    pub allegiance: Option<String>,
    /// Enriched presences; omitted for minimal projections.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub faction_presence: Option<Vec<PresenceView>>,
    /// Last refresh time.
    pub updated_at: DateTime<Utc>,
    /// Last uploading software.
    pub updated_by: String,
    /// History rows, when a history mode was requested.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub history: Option<Vec<FactionHistory>>,
}

impl FactionView {
    /// Lower-cased names of the systems in the presence list.
    pub fn presence_systems(&self) -> Vec<String> {
        self.faction_presence
            .iter()
            .flatten()
            .map(|p| p.presence.system_name_lower.clone())
            .collect()
    }
}

/// A system as returned by the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SystemView {
    /// Current document; its faction list is emptied for minimal projections.
    #[serde(flatten)]
    pub system: SystemDoc,
    /// History rows, when a history mode was requested.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub history: Option<Vec<SystemHistory>>,
}

/// A station as returned by the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StationView {
    /// Current document.
    #[serde(flatten)]
    pub station: StationDoc,
    /// History rows, when a history mode was requested.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub history: Option<Vec<StationHistory>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_page_of_twenty_five() {
        let page = Page::new(vec![0_u8; 10], 25, 2, 10);
        assert_eq!(page.pages, 3);
        assert!(page.has_prev_page);
        assert!(page.has_next_page);
        assert_eq!(Page::<u8>::offset(2, 10), 10);
    }

    #[test]
    fn offset_at_the_largest_page() {
        assert_eq!(
            Page::<u8>::offset(u32::MAX, u32::MAX),
            18_446_744_060_824_649_730
        );
        assert_eq!(Page::<u8>::offset(0, 10), 0);
    }

    #[test]
    fn last_and_empty_pages() {
        let last = Page::new(vec![0_u8; 5], 25, 3, 10);
        assert!(!last.has_next_page);

        let empty = Page::<u8>::new(Vec::new(), 0, 1, 10);
        assert_eq!(empty.pages, 0);
        assert!(!empty.has_prev_page);
        assert!(!empty.has_next_page);
    }

    #[test]
    fn page_serializes_with_camel_case_flags() {
        let json = serde_json::to_value(Page::new(vec![1_u8], 1, 1, 10)).unwrap_or_default();
        assert_eq!(json["hasPrevPage"], serde_json::Value::Bool(false));
        assert_eq!(json["hasNextPage"], serde_json::Value::Bool(false));
        assert_eq!(json["total"], serde_json::json!(1));
    }

    #[test]
    fn window_admits_inclusive_bounds() {
        let from = DateTime::from_timestamp_millis(1_000).unwrap_or_default();
        let to = DateTime::from_timestamp_millis(2_000).unwrap_or_default();
        let mode = HistoryMode::Window { from, to };
        assert!(mode.admits(from));
        assert!(mode.admits(to));
        assert!(!mode.admits(DateTime::from_timestamp_millis(2_001).unwrap_or_default()));
        assert!(HistoryMode::Latest { count: 1 }.admits(to));
    }
}
