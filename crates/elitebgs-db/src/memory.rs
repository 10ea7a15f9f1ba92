//! In-memory document store.
//!
//! Mirrors the `PostgreSQL` stores' semantics (filter matching, ordering,
//! history modes, presence enrichment) over plain collections behind a
//! [`tokio::sync::RwLock`]. Used for tests and for running the services
//! without a database.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use elitebgs_types::{
    FactionDoc, FactionFilter, FactionHistory, FactionId, FactionView, HistoryMode, PresenceView,
    StationDoc, StationFilter, StationHistory, StationId, SystemDoc, SystemFilter, SystemHistory,
    SystemId,
};
use tokio::sync::RwLock;

/// Every collection held by the store.
#[derive(Debug, Default)]
struct Collections {
    systems: BTreeMap<SystemId, SystemDoc>,
    factions: BTreeMap<FactionId, FactionDoc>,
    stations: BTreeMap<StationId, StationDoc>,
    system_history: Vec<SystemHistory>,
    faction_history: Vec<FactionHistory>,
    station_history: Vec<StationHistory>,
}

/// Shared handle to an in-memory store. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Systems
    // -----------------------------------------------------------------------

    /// Load a system by lower-cased name.
    pub async fn find_system(&self, name_lower: &str) -> Option<SystemDoc> {
        let inner = self.inner.read().await;
        inner
            .systems
            .values()
            .find(|s| s.name_lower == name_lower)
            .cloned()
    }

    /// Insert or replace a system.
    pub async fn save_system(&self, doc: &SystemDoc) {
        let mut inner = self.inner.write().await;
        inner.systems.insert(doc.id, doc.clone());
    }

    /// Refresh a system's freshness fields.
    pub async fn touch_system(&self, id: SystemId, updated_at: DateTime<Utc>, updated_by: &str) {
        let mut inner = self.inner.write().await;
        if let Some(doc) = inner.systems.get_mut(&id) {
            doc.updated_at = updated_at;
            updated_by.clone_into(&mut doc.updated_by);
        }
    }

    /// Most recent history snapshot of a system.
    pub async fn latest_system_history(&self, id: SystemId) -> Option<SystemHistory> {
        let inner = self.inner.read().await;
        inner
            .system_history
            .iter()
            .filter(|h| h.system_id == id)
            .max_by_key(|h| (h.updated_at, h.id))
            .cloned()
    }

    /// Append a system history snapshot.
    pub async fn append_system_history(&self, row: &SystemHistory) {
        let mut inner = self.inner.write().await;
        inner.system_history.push(row.clone());
    }

    /// Number of systems matching `filter`.
    pub async fn count_systems(&self, filter: &SystemFilter) -> u64 {
        let inner = self.inner.read().await;
        count(inner.systems.values().filter(|s| matches_system(s, filter)))
    }

    /// One page of matching systems, ordered by name.
    pub async fn list_systems(&self, filter: &SystemFilter, offset: u64, limit: u32) -> Vec<SystemDoc> {
        let inner = self.inner.read().await;
        let mut matched: Vec<&SystemDoc> = inner
            .systems
            .values()
            .filter(|s| matches_system(s, filter))
            .collect();
        matched.sort_by(|a, b| (&a.name_lower, a.id).cmp(&(&b.name_lower, b.id)));
        page(matched, offset, limit).cloned().collect()
    }

    /// History of one system under `mode`.
    pub async fn system_history(&self, id: SystemId, mode: HistoryMode) -> Vec<SystemHistory> {
        let inner = self.inner.read().await;
        let rows: Vec<&SystemHistory> = inner
            .system_history
            .iter()
            .filter(|h| h.system_id == id && mode.admits(h.updated_at))
            .collect();
        select_history(rows, mode, |h| (h.updated_at, h.id.into_inner()))
    }

    // -----------------------------------------------------------------------
    // Factions
    // -----------------------------------------------------------------------

    /// Load a faction by lower-cased name.
    pub async fn find_faction(&self, name_lower: &str) -> Option<FactionDoc> {
        let inner = self.inner.read().await;
        inner
            .factions
            .values()
            .find(|f| f.name_lower == name_lower)
            .cloned()
    }

    /// Insert or replace a faction, merging presences by system.
    ///
    /// Presences stored earlier but absent from `doc` are kept, matching the
    /// row-per-presence layout of the `PostgreSQL` store.
    pub async fn save_faction(&self, doc: &FactionDoc) {
        let mut inner = self.inner.write().await;
        let merged = match inner.factions.remove(&doc.id) {
            Some(mut existing) => {
                existing.name.clone_from(&doc.name);
                existing.government.clone_from(&doc.government);
                existing.allegiance.clone_from(&doc.allegiance);
                existing.updated_at = doc.updated_at;
                existing.updated_by.clone_from(&doc.updated_by);
                for presence in &doc.faction_presence {
                    existing.upsert_presence(presence.clone());
                }
                existing
            }
            None => doc.clone(),
        };
        inner.factions.insert(doc.id, merged);
    }

    /// Most recent history snapshot of one presence.
    pub async fn latest_faction_history(
        &self,
        id: FactionId,
        system_lower: &str,
    ) -> Option<FactionHistory> {
        let inner = self.inner.read().await;
        inner
            .faction_history
            .iter()
            .filter(|h| h.faction_id == id && h.system_lower == system_lower)
            .max_by_key(|h| (h.updated_at, h.id))
            .cloned()
    }

    /// Append a faction history snapshot.
    pub async fn append_faction_history(&self, row: &FactionHistory) {
        let mut inner = self.inner.write().await;
        inner.faction_history.push(row.clone());
    }

    /// Number of factions matching `filter`.
    pub async fn count_factions(&self, filter: &FactionFilter) -> u64 {
        let inner = self.inner.read().await;
        count(inner.factions.values().filter(|f| matches_faction(f, filter)))
    }

    /// One page of matching factions with enriched presences.
    pub async fn list_factions(
        &self,
        filter: &FactionFilter,
        offset: u64,
        limit: u32,
        system_details: bool,
    ) -> Vec<FactionView> {
        let inner = self.inner.read().await;
        let mut matched: Vec<&FactionDoc> = inner
            .factions
            .values()
            .filter(|f| matches_faction(f, filter))
            .collect();
        matched.sort_by(|a, b| (&a.name_lower, a.id).cmp(&(&b.name_lower, b.id)));

        page(matched, offset, limit)
            .map(|faction| {
                let presences = faction
                    .faction_presence
                    .iter()
                    .map(|presence| {
                        let system = inner
                            .systems
                            .values()
                            .find(|s| s.name_lower == presence.system_name_lower);
                        PresenceView {
                            presence: presence.clone(),
                            system_id: system.map(|s| s.id),
                            system_details: system.filter(|_| system_details).cloned(),
                        }
                    })
                    .collect();
                FactionView {
                    id: faction.id,
                    name: faction.name.clone(),
                    name_lower: faction.name_lower.clone(),
                    government: faction.government.clone(),
                    allegiance: faction.allegiance.clone(),
                    faction_presence: Some(presences),
                    updated_at: faction.updated_at,
                    updated_by: faction.updated_by.clone(),
                    history: None,
                }
            })
            .collect()
    }

    /// History of one faction restricted to `systems`, under `mode`.
    pub async fn faction_history(
        &self,
        id: FactionId,
        systems: &[String],
        mode: HistoryMode,
    ) -> Vec<FactionHistory> {
        let inner = self.inner.read().await;
        let rows = inner
            .faction_history
            .iter()
            .filter(|h| h.faction_id == id && systems.contains(&h.system_lower));

        match mode {
            HistoryMode::Window { .. } => {
                let admitted: Vec<&FactionHistory> =
                    rows.filter(|h| mode.admits(h.updated_at)).collect();
                select_history(admitted, mode, |h| (h.updated_at, h.id.into_inner()))
            }
            HistoryMode::Latest { .. } => {
                let mut by_system: BTreeMap<&str, Vec<&FactionHistory>> = BTreeMap::new();
                for row in rows {
                    by_system.entry(row.system_lower.as_str()).or_default().push(row);
                }
                let mut selected: Vec<FactionHistory> = by_system
                    .into_values()
                    .flat_map(|per_system| {
                        select_history(per_system, mode, |h| (h.updated_at, h.id.into_inner()))
                    })
                    .collect();
                selected.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)));
                selected
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stations
    // -----------------------------------------------------------------------

    /// Load a station by market id, falling back to its name within its
    /// system.
    pub async fn find_station(
        &self,
        market_id: Option<i64>,
        name_lower: &str,
        system_lower: &str,
    ) -> Option<StationDoc> {
        let inner = self.inner.read().await;
        let by_market = market_id.and_then(|market_id| {
            inner
                .stations
                .values()
                .find(|s| s.market_id == Some(market_id))
        });
        by_market
            .or_else(|| {
                inner
                    .stations
                    .values()
                    .find(|s| s.name_lower == name_lower && s.system_lower == system_lower)
            })
            .cloned()
    }

    /// Insert or replace a station.
    pub async fn save_station(&self, doc: &StationDoc) {
        let mut inner = self.inner.write().await;
        inner.stations.insert(doc.id, doc.clone());
    }

    /// Refresh a station's freshness fields.
    pub async fn touch_station(&self, id: StationId, updated_at: DateTime<Utc>, updated_by: &str) {
        let mut inner = self.inner.write().await;
        if let Some(doc) = inner.stations.get_mut(&id) {
            doc.updated_at = updated_at;
            updated_by.clone_into(&mut doc.updated_by);
        }
    }

    /// Most recent history snapshot of a station.
    pub async fn latest_station_history(&self, id: StationId) -> Option<StationHistory> {
        let inner = self.inner.read().await;
        inner
            .station_history
            .iter()
            .filter(|h| h.station_id == id)
            .max_by_key(|h| (h.updated_at, h.id))
            .cloned()
    }

    /// Append a station history snapshot.
    pub async fn append_station_history(&self, row: &StationHistory) {
        let mut inner = self.inner.write().await;
        inner.station_history.push(row.clone());
    }

    /// Number of stations matching `filter`.
    pub async fn count_stations(&self, filter: &StationFilter) -> u64 {
        let inner = self.inner.read().await;
        count(inner.stations.values().filter(|s| matches_station(s, filter)))
    }

    /// One page of matching stations, ordered by name.
    pub async fn list_stations(
        &self,
        filter: &StationFilter,
        offset: u64,
        limit: u32,
    ) -> Vec<StationDoc> {
        let inner = self.inner.read().await;
        let mut matched: Vec<&StationDoc> = inner
            .stations
            .values()
            .filter(|s| matches_station(s, filter))
            .collect();
        matched.sort_by(|a, b| (&a.name_lower, a.id).cmp(&(&b.name_lower, b.id)));
        page(matched, offset, limit).cloned().collect()
    }

    /// History of one station under `mode`.
    pub async fn station_history(&self, id: StationId, mode: HistoryMode) -> Vec<StationHistory> {
        let inner = self.inner.read().await;
        let rows: Vec<&StationHistory> = inner
            .station_history
            .iter()
            .filter(|h| h.station_id == id && mode.admits(h.updated_at))
            .collect();
        select_history(rows, mode, |h| (h.updated_at, h.id.into_inner()))
    }
}

// ---------------------------------------------------------------------------
// Matching helpers
// ---------------------------------------------------------------------------

fn count<T>(iter: impl Iterator<Item = T>) -> u64 {
    u64::try_from(iter.count()).unwrap_or(u64::MAX)
}

/// Slice one page out of an ordered match list.
fn page<T>(items: Vec<T>, offset: u64, limit: u32) -> impl Iterator<Item = T> {
    let skip = usize::try_from(offset).unwrap_or(usize::MAX);
    let take = usize::try_from(limit).unwrap_or(usize::MAX);
    items.into_iter().skip(skip).take(take)
}

/// Order rows for `mode`: oldest first for windows, newest `count` first for
/// latest-N.
fn select_history<T, K, F>(mut rows: Vec<&T>, mode: HistoryMode, key: F) -> Vec<T>
where
    T: Clone,
    K: Ord,
    F: Fn(&T) -> K,
{
    match mode {
        HistoryMode::Window { .. } => {
            rows.sort_by_key(|r| key(r));
            rows.into_iter().cloned().collect()
        }
        HistoryMode::Latest { count } => {
            rows.sort_by_key(|r| std::cmp::Reverse(key(r)));
            rows.into_iter()
                .take(usize::try_from(count).unwrap_or(usize::MAX))
                .cloned()
                .collect()
        }
    }
}

/// A slot matches when it is unconstrained or contains `value`.
fn slot<T: PartialEq>(slot: &[T], value: Option<&T>) -> bool {
    slot.is_empty() || value.is_some_and(|v| slot.contains(v))
}

fn prefix(begins_with: Option<&str>, name_lower: &str) -> bool {
    begins_with.is_none_or(|p| name_lower.starts_with(p))
}

fn matches_system(doc: &SystemDoc, filter: &SystemFilter) -> bool {
    slot(&filter.ids, Some(&doc.id))
        && slot(&filter.system_addresses, doc.system_address.as_ref())
        && slot(&filter.names, Some(&doc.name_lower))
        && slot(&filter.allegiances, doc.allegiance.as_ref())
        && slot(&filter.governments, doc.government.as_ref())
        && slot(&filter.states, doc.state.as_ref())
        && slot(&filter.primary_economies, doc.primary_economy.as_ref())
        && slot(&filter.securities, doc.security.as_ref())
        && (filter.factions.is_empty()
            || doc
                .factions
                .iter()
                .any(|f| filter.factions.contains(&f.name_lower)))
        && prefix(filter.begins_with.as_deref(), &doc.name_lower)
}

fn matches_faction(doc: &FactionDoc, filter: &FactionFilter) -> bool {
    let presences = &doc.faction_presence;
    slot(&filter.ids, Some(&doc.id))
        && slot(&filter.names, Some(&doc.name_lower))
        && slot(&filter.allegiances, doc.allegiance.as_ref())
        && slot(&filter.governments, doc.government.as_ref())
        && prefix(filter.begins_with.as_deref(), &doc.name_lower)
        && (filter.systems.is_empty()
            || presences
                .iter()
                .any(|p| filter.systems.contains(&p.system_name_lower)))
        && (filter.active_states.is_empty()
            || presences.iter().any(|p| {
                p.active_states
                    .iter()
                    .any(|s| filter.active_states.contains(&s.state))
            }))
        && (filter.pending_states.is_empty()
            || presences.iter().any(|p| {
                p.pending_states
                    .iter()
                    .any(|s| filter.pending_states.contains(&s.state))
            }))
        && (filter.recovering_states.is_empty()
            || presences.iter().any(|p| {
                p.recovering_states
                    .iter()
                    .any(|s| filter.recovering_states.contains(&s.state))
            }))
}

fn matches_station(doc: &StationDoc, filter: &StationFilter) -> bool {
    slot(&filter.ids, Some(&doc.id))
        && slot(&filter.market_ids, doc.market_id.as_ref())
        && slot(&filter.names, Some(&doc.name_lower))
        && slot(&filter.types, doc.station_type.as_ref())
        && slot(&filter.systems, Some(&doc.system_lower))
        && slot(&filter.economies, doc.economy.as_ref())
        && slot(&filter.allegiances, doc.allegiance.as_ref())
        && slot(&filter.governments, doc.government.as_ref())
        && slot(&filter.states, doc.state.as_ref())
        && prefix(filter.begins_with.as_deref(), &doc.name_lower)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use elitebgs_types::{FactionPresence, HistoryId, name_key};
    use rust_decimal::Decimal;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    fn system(name: &str) -> SystemDoc {
        SystemDoc {
            id: SystemId::new(),
            name: name.to_owned(),
            name_lower: name_key(name),
            system_address: None,
            x: None,
            y: None,
            z: None,
            government: None,
            allegiance: Some(String::from("federation")),
            state: None,
            security: None,
            primary_economy: None,
            secondary_economy: None,
            population: None,
            controlling_minor_faction: None,
            controlling_minor_faction_lower: None,
            factions: Vec::new(),
            updated_at: at(0),
            updated_by: String::new(),
        }
    }

    fn presence(system: &str) -> FactionPresence {
        FactionPresence {
            system_name: system.to_owned(),
            system_name_lower: name_key(system),
            state: None,
            influence: Decimal::new(25, 2),
            happiness: None,
            active_states: Vec::new(),
            pending_states: Vec::new(),
            recovering_states: Vec::new(),
            updated_at: at(0),
        }
    }

    fn faction_history(id: FactionId, system: &str, secs: i64) -> FactionHistory {
        FactionHistory {
            id: HistoryId::new(),
            faction_id: id,
            faction_name_lower: String::from("mother gaia"),
            system: system.to_owned(),
            system_lower: name_key(system),
            state: None,
            influence: Decimal::ZERO,
            happiness: None,
            active_states: Vec::new(),
            pending_states: Vec::new(),
            recovering_states: Vec::new(),
            updated_at: at(secs),
            updated_by: String::new(),
        }
    }

    #[tokio::test]
    async fn list_systems_pages_in_name_order() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store.save_system(&system(&format!("System {i:02}"))).await;
        }
        let filter = SystemFilter::default().with_allegiances(["Federation"]);
        assert_eq!(store.count_systems(&filter).await, 25);

        let second = store.list_systems(&filter, 10, 10).await;
        assert_eq!(second.len(), 10);
        assert_eq!(second.first().map(|s| s.name.as_str()), Some("System 10"));
        assert_eq!(second.last().map(|s| s.name.as_str()), Some("System 19"));
    }

    #[tokio::test]
    async fn enrichment_resolves_every_presence() {
        let store = MemoryStore::new();
        let sol = system("Sol");
        let alpha = system("Alpha Centauri");
        store.save_system(&sol).await;
        store.save_system(&alpha).await;

        let mut faction = FactionDoc {
            id: FactionId::new(),
            name: String::from("Mother Gaia"),
            name_lower: name_key("Mother Gaia"),
            government: None,
            allegiance: None,
            faction_presence: Vec::new(),
            updated_at: at(0),
            updated_by: String::new(),
        };
        faction.upsert_presence(presence("Sol"));
        faction.upsert_presence(presence("Alpha Centauri"));
        store.save_faction(&faction).await;

        let filter = FactionFilter::default().with_systems(["Sol"]);
        let views = store.list_factions(&filter, 0, 10, true).await;
        assert_eq!(views.len(), 1);
        let presences = views
            .first()
            .and_then(|v| v.faction_presence.clone())
            .unwrap_or_default();
        assert_eq!(presences.len(), 2);
        let alpha_view = presences
            .iter()
            .find(|p| p.presence.system_name_lower == "alpha centauri");
        assert_eq!(alpha_view.and_then(|p| p.system_id), Some(alpha.id));
        assert!(alpha_view.is_some_and(|p| p.system_details.is_some()));
    }

    #[tokio::test]
    async fn faction_latest_n_is_per_system() {
        let store = MemoryStore::new();
        let id = FactionId::new();
        for secs in 1..=5 {
            store
                .append_faction_history(&faction_history(id, "Sol", secs))
                .await;
            store
                .append_faction_history(&faction_history(id, "Lave", secs * 10))
                .await;
        }
        let systems = vec![String::from("sol"), String::from("lave")];
        let rows = store
            .faction_history(id, &systems, HistoryMode::Latest { count: 2 })
            .await;
        let stamps: Vec<i64> = rows.iter().map(|h| h.updated_at.timestamp()).collect();
        assert_eq!(stamps, vec![50, 40, 5, 4]);
    }

    #[tokio::test]
    async fn faction_window_is_chronological_and_inclusive() {
        let store = MemoryStore::new();
        let id = FactionId::new();
        for secs in [30, 10, 20, 40] {
            store
                .append_faction_history(&faction_history(id, "Sol", secs))
                .await;
        }
        let systems = vec![String::from("sol")];
        let mode = HistoryMode::Window {
            from: at(10),
            to: at(30),
        };
        let rows = store.faction_history(id, &systems, mode).await;
        let stamps: Vec<i64> = rows.iter().map(|h| h.updated_at.timestamp()).collect();
        assert_eq!(stamps, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn station_lookup_falls_back_to_name_and_system() {
        let store = MemoryStore::new();
        let station = StationDoc {
            id: StationId::new(),
            name: String::from("Abraham Lincoln"),
            name_lower: name_key("Abraham Lincoln"),
            market_id: None,
            station_type: None,
            system: String::from("Sol"),
            system_lower: String::from("sol"),
            government: None,
            allegiance: None,
            economy: None,
            all_economies: Vec::new(),
            state: None,
            controlling_minor_faction: None,
            distance_from_star: None,
            services: Vec::new(),
            updated_at: at(0),
            updated_by: String::new(),
        };
        store.save_station(&station).await;

        let found = store
            .find_station(Some(128_016_640), "abraham lincoln", "sol")
            .await;
        assert_eq!(found.map(|s| s.id), Some(station.id));
        assert!(
            store
                .find_station(Some(128_016_640), "abraham lincoln", "lave")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn save_faction_keeps_absent_presences() {
        let store = MemoryStore::new();
        let mut faction = FactionDoc {
            id: FactionId::new(),
            name: String::from("Mother Gaia"),
            name_lower: name_key("Mother Gaia"),
            government: None,
            allegiance: None,
            faction_presence: vec![presence("Sol")],
            updated_at: at(0),
            updated_by: String::new(),
        };
        store.save_faction(&faction).await;
        faction.faction_presence = vec![presence("Lave")];
        store.save_faction(&faction).await;

        let stored = store.find_faction("mother gaia").await;
        assert_eq!(
            stored.map(|f| f.system_names_lower()),
            Some(vec![String::from("lave"), String::from("sol")])
        );
    }
}
