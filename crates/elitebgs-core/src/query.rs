//! History query engine.
//!
//! Answers paged current-entity queries with optional historical
//! retrieval. Request validation happens before the store is touched;
//! history for the rows of a page is fetched with bounded concurrency,
//! order-preserving and all-or-nothing.

use chrono::{DateTime, Utc};
use elitebgs_db::{DbError, StateStore};
use elitebgs_types::{
    FactionFilter, FactionView, HistoryMode, Page, StationFilter, StationView, SystemFilter,
    SystemView, WINDOW_SPAN_MS,
};
use futures::{StreamExt, TryStreamExt, stream};

use crate::config::QueryConfig;

/// Errors raised by the query engine.
///
/// Every variant except [`QueryError::Store`] is a contract violation by the
/// caller.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The current-entity filter had no predicates.
    #[error("at least one filter parameter is required")]
    EmptyFilter,

    /// Minimal projection was combined with a historical mode.
    #[error("minimal projection cannot be combined with history")]
    MinimalWithHistory,

    /// Pages are 1-based.
    #[error("page must be at least 1")]
    InvalidPage,

    /// Latest-N requires a positive count.
    #[error("count must be at least 1")]
    InvalidCount,

    /// A time bound was outside the representable range.
    #[error("invalid timestamp {0}")]
    InvalidTime(i64),

    /// The state store failed.
    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl QueryError {
    /// Whether the error was caused by the request rather than the service.
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

fn millis(ms: i64) -> Result<DateTime<Utc>, QueryError> {
    DateTime::from_timestamp_millis(ms).ok_or(QueryError::InvalidTime(ms))
}

/// Derive the historical mode from raw request parameters.
///
/// `count` wins over the window bounds. A single bound derives the other
/// with a seven-day span. No parameters means no history.
pub fn history_mode(
    timemin: Option<i64>,
    timemax: Option<i64>,
    count: Option<u32>,
) -> Result<Option<HistoryMode>, QueryError> {
    if let Some(count) = count {
        if count == 0 {
            return Err(QueryError::InvalidCount);
        }
        return Ok(Some(HistoryMode::Latest { count }));
    }
    let (from, to) = match (timemin, timemax) {
        (None, None) => return Ok(None),
        (Some(min), Some(max)) => (min, max),
        (Some(min), None) => (min, min.checked_add(WINDOW_SPAN_MS).ok_or(QueryError::InvalidTime(min))?),
        (None, Some(max)) => (max.checked_sub(WINDOW_SPAN_MS).ok_or(QueryError::InvalidTime(max))?, max),
    };
    Ok(Some(HistoryMode::Window {
        from: millis(from)?,
        to: millis(to)?,
    }))
}

/// A faction query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactionQuery {
    /// Current-entity predicates.
    pub filter: FactionFilter,
    /// Historical mode, if history is requested.
    pub history: Option<HistoryMode>,
    /// 1-based page number.
    pub page: u32,
    /// Omit the presence list.
    pub minimal: bool,
    /// Embed the full system document in each presence.
    pub system_details: bool,
    /// Narrow history to the filter's systems.
    pub filter_system_in_history: bool,
}

impl FactionQuery {
    /// First page of `filter`, no history.
    pub const fn new(filter: FactionFilter) -> Self {
        Self {
            filter,
            history: None,
            page: 1,
            minimal: false,
            system_details: false,
            filter_system_in_history: false,
        }
    }
}

/// A system query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemQuery {
    /// Current-entity predicates.
    pub filter: SystemFilter,
    /// Historical mode, if history is requested.
    pub history: Option<HistoryMode>,
    /// 1-based page number.
    pub page: u32,
    /// Omit the faction list.
    pub minimal: bool,
}

impl SystemQuery {
    /// First page of `filter`, no history.
    pub const fn new(filter: SystemFilter) -> Self {
        Self {
            filter,
            history: None,
            page: 1,
            minimal: false,
        }
    }
}

/// A station query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationQuery {
    /// Current-entity predicates.
    pub filter: StationFilter,
    /// Historical mode, if history is requested.
    pub history: Option<HistoryMode>,
    /// 1-based page number.
    pub page: u32,
}

impl StationQuery {
    /// First page of `filter`, no history.
    pub const fn new(filter: StationFilter) -> Self {
        Self {
            filter,
            history: None,
            page: 1,
        }
    }
}

fn validate(
    filter_empty: bool,
    history: Option<HistoryMode>,
    page: u32,
    minimal: bool,
) -> Result<(), QueryError> {
    if filter_empty {
        return Err(QueryError::EmptyFilter);
    }
    if minimal && history.is_some() {
        return Err(QueryError::MinimalWithHistory);
    }
    if page == 0 {
        return Err(QueryError::InvalidPage);
    }
    if matches!(history, Some(HistoryMode::Latest { count: 0 })) {
        return Err(QueryError::InvalidCount);
    }
    Ok(())
}

/// Runs paged queries against the state store.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: StateStore,
    page_size: u32,
    concurrency: usize,
}

impl QueryEngine {
    /// Rows per page unless configured otherwise.
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    /// Concurrent history fetches per page unless configured otherwise.
    pub const DEFAULT_CONCURRENCY: usize = 8;

    /// Create an engine with default paging and fan-out.
    pub const fn new(store: StateStore) -> Self {
        Self {
            store,
            page_size: Self::DEFAULT_PAGE_SIZE,
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }

    /// Create an engine from the `query` config section.
    pub fn from_config(store: StateStore, config: &QueryConfig) -> Self {
        Self::new(store)
            .with_page_size(config.page_size)
            .with_concurrency(config.history_concurrency)
    }

    /// Override the page size (minimum 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Override the history fan-out bound (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// Page size in rows.
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// One page of factions.
    pub async fn factions(&self, query: &FactionQuery) -> Result<Page<FactionView>, QueryError> {
        validate(query.filter.is_empty(), query.history, query.page, query.minimal)?;

        let total = self.store.count_factions(&query.filter).await?;
        let offset = Page::<FactionView>::offset(query.page, self.page_size);
        let mut docs = self
            .store
            .list_factions(
                &query.filter,
                offset,
                self.page_size,
                query.system_details && !query.minimal,
            )
            .await?;

        if query.minimal {
            for view in &mut docs {
                view.faction_presence = None;
            }
        }

        if let Some(mode) = query.history {
            let narrowed = query.filter_system_in_history && !query.filter.systems.is_empty();
            let store = &self.store;
            let histories: Vec<_> = stream::iter(
                docs.iter()
                    .map(|view| {
                        let systems = if narrowed {
                            query.filter.systems.clone()
                        } else {
                            view.presence_systems()
                        };
                        (view.id, systems)
                    })
                    .collect::<Vec<_>>()
                    .into_iter()
                    .map(|(id, systems)| async move {
                        store.faction_history(id, &systems, mode).await
                    }),
            )
            .buffered(self.concurrency)
            .try_collect()
            .await?;
            for (view, history) in docs.iter_mut().zip(histories) {
                view.history = Some(history);
            }
        }

        tracing::debug!(total, page = query.page, rows = docs.len(), "faction query");
        Ok(Page::new(docs, total, query.page, self.page_size))
    }

    /// One page of systems.
    pub async fn systems(&self, query: &SystemQuery) -> Result<Page<SystemView>, QueryError> {
        validate(query.filter.is_empty(), query.history, query.page, query.minimal)?;

        let total = self.store.count_systems(&query.filter).await?;
        let offset = Page::<SystemView>::offset(query.page, self.page_size);
        let rows = self
            .store
            .list_systems(&query.filter, offset, self.page_size)
            .await?;

        let histories = match query.history {
            Some(mode) => {
                let store = &self.store;
                stream::iter(
                    rows.iter()
                        .map(|doc| doc.id)
                        .collect::<Vec<_>>()
                        .into_iter()
                        .map(|id| async move { store.system_history(id, mode).await.map(Some) }),
                )
                .buffered(self.concurrency)
                .try_collect()
                .await?
            }
            None => vec![None; rows.len()],
        };

        let docs = rows
            .into_iter()
            .zip(histories)
            .map(|(mut system, history)| {
                if query.minimal {
                    system.factions.clear();
                }
                SystemView { system, history }
            })
            .collect();

        Ok(Page::new(docs, total, query.page, self.page_size))
    }

    /// One page of stations.
    pub async fn stations(&self, query: &StationQuery) -> Result<Page<StationView>, QueryError> {
        validate(query.filter.is_empty(), query.history, query.page, false)?;

        let total = self.store.count_stations(&query.filter).await?;
        let offset = Page::<StationView>::offset(query.page, self.page_size);
        let rows = self
            .store
            .list_stations(&query.filter, offset, self.page_size)
            .await?;

        let histories = match query.history {
            Some(mode) => {
                let store = &self.store;
                stream::iter(
                    rows.iter()
                        .map(|doc| doc.id)
                        .collect::<Vec<_>>()
                        .into_iter()
                        .map(|id| async move { store.station_history(id, mode).await.map(Some) }),
                )
                .buffered(self.concurrency)
                .try_collect()
                .await?
            }
            None => vec![None; rows.len()],
        };

        let docs = rows
            .into_iter()
            .zip(histories)
            .map(|(station, history)| StationView { station, history })
            .collect();

        Ok(Page::new(docs, total, query.page, self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use elitebgs_db::MemoryStore;
    use elitebgs_types::{
        FactionDoc, FactionHistory, FactionId, FactionPresence, HistoryId, SystemDoc,
        SystemFaction, SystemHistory, SystemId, name_key,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_709_294_400_i64.saturating_add(secs), 0).unwrap_or_default()
    }

    fn system(name: &str, factions: &[&str]) -> SystemDoc {
        SystemDoc {
            id: SystemId::new(),
            name: name.to_owned(),
            name_lower: name_key(name),
            system_address: None,
            x: None,
            y: None,
            z: None,
            government: Some(String::from("$government_democracy;")),
            allegiance: Some(String::from("federation")),
            state: None,
            security: None,
            primary_economy: None,
            secondary_economy: None,
            population: Some(1000),
            controlling_minor_faction: None,
            controlling_minor_faction_lower: None,
            factions: factions.iter().map(|f| SystemFaction::new(f)).collect(),
            updated_at: at(0),
            updated_by: String::from("test"),
        }
    }

    fn presence(system: &str) -> FactionPresence {
        FactionPresence {
            system_name: system.to_owned(),
            system_name_lower: name_key(system),
            state: Some(String::from("none")),
            influence: Decimal::new(25, 2),
            happiness: None,
            active_states: Vec::new(),
            pending_states: Vec::new(),
            recovering_states: Vec::new(),
            updated_at: at(0),
        }
    }

    fn faction(name: &str, systems: &[&str]) -> FactionDoc {
        FactionDoc {
            id: FactionId::new(),
            name: name.to_owned(),
            name_lower: name_key(name),
            government: Some(String::from("$government_democracy;")),
            allegiance: Some(String::from("federation")),
            faction_presence: systems.iter().map(|s| presence(s)).collect(),
            updated_at: at(0),
            updated_by: String::from("test"),
        }
    }

    fn faction_row(doc: &FactionDoc, system: &str, secs: i64) -> FactionHistory {
        FactionHistory {
            id: HistoryId::new(),
            faction_id: doc.id,
            faction_name_lower: doc.name_lower.clone(),
            system: system.to_owned(),
            system_lower: name_key(system),
            state: None,
            influence: Decimal::new(secs, 3),
            happiness: None,
            active_states: Vec::new(),
            pending_states: Vec::new(),
            recovering_states: Vec::new(),
            updated_at: at(secs),
            updated_by: String::from("test"),
        }
    }

    fn system_row(doc: &SystemDoc, secs: i64) -> SystemHistory {
        SystemHistory {
            id: HistoryId::new(),
            system_id: doc.id,
            system_name_lower: doc.name_lower.clone(),
            government: doc.government.clone(),
            allegiance: doc.allegiance.clone(),
            state: None,
            security: None,
            primary_economy: None,
            secondary_economy: None,
            population: doc.population,
            controlling_minor_faction: None,
            factions: Vec::new(),
            updated_at: at(secs),
            updated_by: String::from("test"),
        }
    }

    async fn seeded() -> (QueryEngine, FactionDoc) {
        let mem = MemoryStore::new();
        mem.save_system(&system("Sol", &["Mother Gaia"])).await;
        mem.save_system(&system("Alpha Centauri", &["Mother Gaia"])).await;
        let gaia = faction("Mother Gaia", &["Sol", "Alpha Centauri"]);
        mem.save_faction(&gaia).await;
        for (system, secs) in [("Sol", 10), ("Sol", 20), ("Sol", 30), ("Alpha Centauri", 15)] {
            mem.append_faction_history(&faction_row(&gaia, system, secs))
                .await;
        }
        (QueryEngine::new(StateStore::from(mem)), gaia)
    }

    #[test]
    fn window_from_single_bound() {
        let t = 1_709_294_400_000_i64;
        let from_min = history_mode(Some(t), None, None).ok().flatten();
        assert_eq!(
            from_min,
            Some(HistoryMode::Window {
                from: millis(t).unwrap_or_default(),
                to: millis(t + WINDOW_SPAN_MS).unwrap_or_default(),
            })
        );
        let from_max = history_mode(None, Some(t), None).ok().flatten();
        assert_eq!(
            from_max,
            Some(HistoryMode::Window {
                from: millis(t - WINDOW_SPAN_MS).unwrap_or_default(),
                to: millis(t).unwrap_or_default(),
            })
        );
        let both = history_mode(Some(t), Some(t + 5), None).ok().flatten();
        assert_eq!(
            both,
            Some(HistoryMode::Window {
                from: millis(t).unwrap_or_default(),
                to: millis(t + 5).unwrap_or_default(),
            })
        );
    }

    #[test]
    fn count_overrides_window() {
        let mode = history_mode(Some(0), Some(10), Some(3)).ok().flatten();
        assert_eq!(mode, Some(HistoryMode::Latest { count: 3 }));
        assert!(matches!(
            history_mode(None, None, Some(0)),
            Err(QueryError::InvalidCount)
        ));
        assert!(matches!(history_mode(None, None, None), Ok(None)));
        assert!(matches!(
            history_mode(Some(i64::MAX), None, None),
            Err(QueryError::InvalidTime(_))
        ));
    }

    #[tokio::test]
    async fn contract_violations_are_rejected() {
        let engine = QueryEngine::new(StateStore::from(MemoryStore::new()));

        let empty = engine.factions(&FactionQuery::new(FactionFilter::default())).await;
        assert!(matches!(empty, Err(QueryError::EmptyFilter)));

        let mut minimal = SystemQuery::new(SystemFilter::default().with_names(["sol"]));
        minimal.minimal = true;
        minimal.history = Some(HistoryMode::Latest { count: 1 });
        assert!(matches!(
            engine.systems(&minimal).await,
            Err(QueryError::MinimalWithHistory)
        ));

        let mut page_zero = StationQuery::new(StationFilter::default().with_systems(["sol"]));
        page_zero.page = 0;
        assert!(matches!(
            engine.stations(&page_zero).await,
            Err(QueryError::InvalidPage)
        ));

        let mut zero_count = StationQuery::new(StationFilter::default().with_systems(["sol"]));
        zero_count.history = Some(HistoryMode::Latest { count: 0 });
        let err = engine.stations(&zero_count).await;
        assert!(matches!(err, Err(QueryError::InvalidCount)));
        assert!(err.err().is_some_and(|e| e.is_client_error()));
    }

    #[tokio::test]
    async fn second_page_of_twenty_five() {
        let mem = MemoryStore::new();
        for i in 0..25 {
            mem.save_system(&system(&format!("Col 285 Sector {i:02}"), &[])).await;
        }
        let engine = QueryEngine::new(StateStore::from(mem));
        let mut query = SystemQuery::new(SystemFilter::default().with_begins_with("col 285"));
        query.page = 2;

        let page = engine.systems(&query).await.unwrap_or_else(|e| panic!("query failed: {e}"));
        assert_eq!(page.total, 25);
        assert_eq!(page.pages, 3);
        assert_eq!(page.docs.len(), 10);
        assert!(page.has_prev_page && page.has_next_page);
        assert_eq!(
            page.docs.first().map(|v| v.system.name.as_str()),
            Some("Col 285 Sector 10")
        );
    }

    #[tokio::test]
    async fn enrichment_resolves_every_presence() {
        let (engine, _) = seeded().await;
        let mut query = FactionQuery::new(FactionFilter::default().with_systems(["sol"]));
        query.system_details = true;

        let page = engine.factions(&query).await.unwrap_or_else(|e| panic!("query failed: {e}"));
        let presences = page
            .docs
            .first()
            .and_then(|v| v.faction_presence.clone())
            .unwrap_or_default();
        assert_eq!(presences.len(), 2);
        assert!(presences.iter().all(|p| p.system_id.is_some()));
        assert!(presences.iter().all(|p| p.system_details.is_some()));
    }

    #[tokio::test]
    async fn latest_n_is_per_presence() {
        let (engine, _) = seeded().await;
        let mut query = FactionQuery::new(FactionFilter::default().with_names(["mother gaia"]));
        query.history = Some(HistoryMode::Latest { count: 2 });

        let page = engine.factions(&query).await.unwrap_or_else(|e| panic!("query failed: {e}"));
        let times: Vec<DateTime<Utc>> = page
            .docs
            .first()
            .and_then(|v| v.history.clone())
            .unwrap_or_default()
            .iter()
            .map(|h| h.updated_at)
            .collect();
        assert_eq!(times, vec![at(30), at(20), at(15)]);
    }

    #[tokio::test]
    async fn history_narrowed_to_filter_systems() {
        let (engine, _) = seeded().await;
        let mut query = FactionQuery::new(
            FactionFilter::default()
                .with_names(["mother gaia"])
                .with_systems(["alpha centauri"]),
        );
        query.history = Some(HistoryMode::Window {
            from: at(0),
            to: at(100),
        });
        query.filter_system_in_history = true;

        let page = engine.factions(&query).await.unwrap_or_else(|e| panic!("query failed: {e}"));
        let history = page.docs.first().and_then(|v| v.history.clone()).unwrap_or_default();
        assert_eq!(history.len(), 1);
        assert!(history.iter().all(|h| h.system_lower == "alpha centauri"));

        query.filter_system_in_history = false;
        let page = engine.factions(&query).await.unwrap_or_else(|e| panic!("query failed: {e}"));
        let times: Vec<DateTime<Utc>> = page
            .docs
            .first()
            .and_then(|v| v.history.clone())
            .unwrap_or_default()
            .iter()
            .map(|h| h.updated_at)
            .collect();
        assert_eq!(times, vec![at(10), at(15), at(20), at(30)]);
    }

    #[tokio::test]
    async fn minimal_projection_strips_nested_lists() {
        let (engine, _) = seeded().await;
        let mut query = FactionQuery::new(FactionFilter::default().with_names(["mother gaia"]));
        query.minimal = true;
        let page = engine.factions(&query).await.unwrap_or_else(|e| panic!("query failed: {e}"));
        assert_eq!(page.total, 1);
        assert!(page.docs.iter().all(|v| v.faction_presence.is_none()));

        let mut query = SystemQuery::new(SystemFilter::default().with_names(["sol"]));
        query.minimal = true;
        let page = engine.systems(&query).await.unwrap_or_else(|e| panic!("query failed: {e}"));
        assert!(page.docs.iter().all(|v| v.system.factions.is_empty()));
    }

    #[tokio::test]
    async fn system_history_window_is_chronological() {
        let mem = MemoryStore::new();
        let sol = system("Sol", &[]);
        mem.save_system(&sol).await;
        for secs in [300, 100, 200, 5000] {
            mem.append_system_history(&system_row(&sol, secs)).await;
        }
        let engine = QueryEngine::new(StateStore::from(mem));
        let mut query = SystemQuery::new(SystemFilter::default().with_names(["sol"]));
        query.history = Some(HistoryMode::Window {
            from: at(100),
            to: at(300),
        });

        let page = engine.systems(&query).await.unwrap_or_else(|e| panic!("query failed: {e}"));
        let times: Vec<DateTime<Utc>> = page
            .docs
            .first()
            .and_then(|v| v.history.clone())
            .unwrap_or_default()
            .iter()
            .map(|h| h.updated_at)
            .collect();
        assert_eq!(times, vec![at(100), at(200), at(300)]);
        assert_eq!(at(300) - at(100), Duration::seconds(200));
    }
}
