//! State reconciliation.
//!
//! Applies one journal event to the current-state documents and decides
//! whether it produces history. Every unit of state (a system, a faction's
//! presence in one system, a station) goes through the same steps:
//!
//! 1. Look the unit up by its natural key.
//! 2. Absent: create the document and record an initial history row.
//! 3. Present but the event is not strictly newer: discard (stale).
//! 4. Compare the relevant fields with the latest history row. Changed
//!    units get their document updated and one history row appended;
//!    unchanged units only have `updated_at` refreshed.
//!
//! Events are applied one at a time by the listener, so per-key writes are
//! serialized and no two reconciliations of the same key interleave.

use elitebgs_db::{DbError, StateStore};
use elitebgs_types::{
    FactionDoc, FactionHistory, FactionId, FactionPresence, HistoryId, JournalMessage, StationDoc,
    StationHistory, StationId, SystemDoc, SystemFaction, SystemHistory, SystemId, name_key,
};

use crate::normalize::{self, EventContext, lower};

/// Journal events that carry a system snapshot and its faction list.
pub const SYSTEM_EVENTS: [&str; 3] = ["FSDJump", "Location", "CarrierJump"];

/// Journal event that carries a station snapshot.
pub const DOCKED_EVENT: &str = "Docked";

/// Station type reported for player fleet carriers.
const FLEET_CARRIER: &str = "fleetcarrier";

/// Errors raised while reconciling an event.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The state store failed.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// A field required by the event type was absent.
    #[error("{event} event is missing {field}")]
    MissingField {
        /// Journal event name.
        event: String,
        /// Missing journal field.
        field: &'static str,
    },
}

/// What happened to one unit of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First sighting: document created, initial history recorded.
    Created,
    /// Relevant fields differ: document updated, one history row appended.
    Changed,
    /// Relevant fields equal: only the freshness timestamp moved.
    Unchanged,
    /// The event is not newer than the stored state and was dropped.
    Stale,
}

impl Outcome {
    /// Whether this outcome appended a history row.
    pub const fn wrote_history(self) -> bool {
        matches!(self, Self::Created | Self::Changed)
    }
}

/// Result of applying one journal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A system event: the system outcome plus one outcome per faction
    /// presence, in message order.
    System {
        /// Outcome for the system document.
        system: Outcome,
        /// Outcome per faction presence.
        factions: Vec<Outcome>,
    },
    /// A docking event.
    Station(Outcome),
    /// Event type not reconciled, or a station type that is not tracked.
    Ignored,
}

/// Applies journal events to the state store.
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: StateStore,
}

impl Reconciler {
    /// Create a reconciler writing to `store`.
    pub const fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// Route a journal message by event name and reconcile it.
    pub async fn apply(
        &self,
        message: &JournalMessage,
        ctx: &EventContext,
    ) -> Result<Applied, ReconcileError> {
        let event = message.event.as_str();
        if SYSTEM_EVENTS.contains(&event) {
            if message.star_system.trim().is_empty() {
                return Err(missing(message, "StarSystem"));
            }
            let system = self.reconcile_system(message, ctx).await?;
            let factions = self.reconcile_factions(message, ctx).await?;
            return Ok(Applied::System { system, factions });
        }
        if event == DOCKED_EVENT {
            return Ok(self
                .reconcile_station(message, ctx)
                .await?
                .map_or(Applied::Ignored, Applied::Station));
        }
        Ok(Applied::Ignored)
    }

    /// Reconcile the system described by a system event.
    pub async fn reconcile_system(
        &self,
        message: &JournalMessage,
        ctx: &EventContext,
    ) -> Result<Outcome, ReconcileError> {
        let name_lower = name_key(&message.star_system);
        let existing = self.store.find_system(&name_lower).await?;

        let Some(current) = existing else {
            let doc = system_doc(SystemId::new(), message, ctx);
            self.store.save_system(&doc).await?;
            self.store
                .append_system_history(&system_history(&doc))
                .await?;
            tracing::debug!(system = %doc.name, "system created");
            return Ok(Outcome::Created);
        };

        if ctx.at <= current.updated_at {
            tracing::trace!(system = %current.name, "stale system event");
            return Ok(Outcome::Stale);
        }

        let mut doc = system_doc(current.id, message, ctx);
        keep_known_system_fields(&mut doc, &current);
        let candidate = system_history(&doc);
        let latest = self.store.latest_system_history(current.id).await?;
        let changed = latest
            .as_ref()
            .is_none_or(|prev| !same_system(prev, &candidate));

        if changed {
            self.store.save_system(&doc).await?;
            self.store.append_system_history(&candidate).await?;
            tracing::debug!(system = %doc.name, "system changed");
            Ok(Outcome::Changed)
        } else {
            if refreshed_system(&current, ctx) == doc {
                self.store
                    .touch_system(current.id, ctx.at, &ctx.software)
                    .await?;
            } else {
                self.store.save_system(&doc).await?;
            }
            Ok(Outcome::Unchanged)
        }
    }

    /// Reconcile every faction presence listed by a system event.
    ///
    /// Staleness and change detection are evaluated per presence: an older
    /// event from one system never hides a newer one from another.
    pub async fn reconcile_factions(
        &self,
        message: &JournalMessage,
        ctx: &EventContext,
    ) -> Result<Vec<Outcome>, ReconcileError> {
        let mut outcomes = Vec::with_capacity(message.factions.len());
        for entry in &message.factions {
            let presence = normalize::presence(&message.star_system, entry, ctx.at);
            let government = lower(entry.government.as_deref());
            let allegiance = lower(entry.allegiance.as_deref());
            let name_lower = name_key(&entry.name);

            let Some(mut doc) = self.store.find_faction(&name_lower).await? else {
                let doc = FactionDoc {
                    id: FactionId::new(),
                    name: entry.name.clone(),
                    name_lower,
                    government,
                    allegiance,
                    faction_presence: vec![presence.clone()],
                    updated_at: ctx.at,
                    updated_by: ctx.software.clone(),
                };
                self.store.save_faction(&doc).await?;
                self.store
                    .append_faction_history(&faction_history(&doc, &presence))
                    .await?;
                tracing::debug!(faction = %doc.name, "faction created");
                outcomes.push(Outcome::Created);
                continue;
            };

            let outcome = match doc.presence(&presence.system_name_lower) {
                Some(prev) if ctx.at <= prev.updated_at => Outcome::Stale,
                Some(_) => {
                    let latest = self
                        .store
                        .latest_faction_history(doc.id, &presence.system_name_lower)
                        .await?;
                    let candidate = faction_history(&doc, &presence);
                    if latest
                        .as_ref()
                        .is_none_or(|prev| !same_presence(prev, &candidate))
                    {
                        Outcome::Changed
                    } else {
                        Outcome::Unchanged
                    }
                }
                // New presence for a known faction.
                None => Outcome::Changed,
            };

            if outcome == Outcome::Stale {
                tracing::trace!(faction = %doc.name, system = %message.star_system, "stale presence");
                outcomes.push(outcome);
                continue;
            }

            if ctx.at > doc.updated_at {
                doc.government = government;
                doc.allegiance = allegiance;
                doc.updated_at = ctx.at;
                doc.updated_by.clone_from(&ctx.software);
            }
            doc.upsert_presence(presence.clone());
            self.store.save_faction(&doc).await?;

            if outcome == Outcome::Changed {
                self.store
                    .append_faction_history(&faction_history(&doc, &presence))
                    .await?;
                tracing::debug!(faction = %doc.name, system = %message.star_system, "presence changed");
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Reconcile the station described by a docking event.
    ///
    /// Returns `None` for fleet carriers, which are not tracked.
    pub async fn reconcile_station(
        &self,
        message: &JournalMessage,
        ctx: &EventContext,
    ) -> Result<Option<Outcome>, ReconcileError> {
        let Some(name) = message
            .station_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
        else {
            return Err(missing(message, "StationName"));
        };
        if message.star_system.trim().is_empty() {
            return Err(missing(message, "StarSystem"));
        }
        if lower(message.station_type.as_deref()).as_deref() == Some(FLEET_CARRIER) {
            return Ok(None);
        }

        let name_lower = name_key(name);
        let system_lower = name_key(&message.star_system);
        let existing = self
            .store
            .find_station(message.market_id, &name_lower, &system_lower)
            .await?;

        let Some(current) = existing else {
            let doc = station_doc(StationId::new(), name, message, ctx);
            self.store.save_station(&doc).await?;
            self.store
                .append_station_history(&station_history(&doc))
                .await?;
            tracing::debug!(station = %doc.name, system = %doc.system, "station created");
            return Ok(Some(Outcome::Created));
        };

        if ctx.at <= current.updated_at {
            return Ok(Some(Outcome::Stale));
        }

        let mut doc = station_doc(current.id, name, message, ctx);
        keep_known_station_fields(&mut doc, &current);
        let candidate = station_history(&doc);
        let latest = self.store.latest_station_history(current.id).await?;
        let changed = latest
            .as_ref()
            .is_none_or(|prev| !same_station(prev, &candidate));

        if changed {
            self.store.save_station(&doc).await?;
            self.store.append_station_history(&candidate).await?;
            tracing::debug!(station = %doc.name, system = %doc.system, "station changed");
            Ok(Some(Outcome::Changed))
        } else {
            if refreshed_station(&current, ctx) == doc {
                self.store
                    .touch_station(current.id, ctx.at, &ctx.software)
                    .await?;
            } else {
                self.store.save_station(&doc).await?;
            }
            Ok(Some(Outcome::Unchanged))
        }
    }
}

fn missing(message: &JournalMessage, field: &'static str) -> ReconcileError {
    ReconcileError::MissingField {
        event: message.event.clone(),
        field,
    }
}

// ---------------------------------------------------------------------------
// Document and snapshot construction
// ---------------------------------------------------------------------------

fn system_doc(id: SystemId, message: &JournalMessage, ctx: &EventContext) -> SystemDoc {
    let coords = message.star_pos.as_deref().unwrap_or_default();
    let controlling = message.system_faction.as_ref().map(|f| f.name().to_owned());
    SystemDoc {
        id,
        name: message.star_system.trim().to_owned(),
        name_lower: name_key(&message.star_system),
        system_address: message.system_address,
        x: coords.first().copied(),
        y: coords.get(1).copied(),
        z: coords.get(2).copied(),
        government: lower(message.system_government.as_deref()),
        allegiance: lower(message.system_allegiance.as_deref()),
        state: lower(message.controlling_state()),
        security: lower(message.system_security.as_deref()),
        primary_economy: lower(message.system_economy.as_deref()),
        secondary_economy: lower(message.system_second_economy.as_deref()),
        population: message.population,
        controlling_minor_faction_lower: controlling.as_deref().map(name_key),
        controlling_minor_faction: controlling,
        factions: normalize::system_factions(message),
        updated_at: ctx.at,
        updated_by: ctx.software.clone(),
    }
}

/// Keep the catalog id and coordinates when an event omits them.
fn keep_known_system_fields(doc: &mut SystemDoc, current: &SystemDoc) {
    doc.system_address = doc.system_address.or(current.system_address);
    if doc.x.is_none() && doc.y.is_none() && doc.z.is_none() {
        doc.x = current.x;
        doc.y = current.y;
        doc.z = current.z;
    }
}

/// `current` as it looks after a freshness-only touch.
fn refreshed_system(current: &SystemDoc, ctx: &EventContext) -> SystemDoc {
    SystemDoc {
        updated_at: ctx.at,
        updated_by: ctx.software.clone(),
        ..current.clone()
    }
}

fn system_history(doc: &SystemDoc) -> SystemHistory {
    SystemHistory {
        id: HistoryId::new(),
        system_id: doc.id,
        system_name_lower: doc.name_lower.clone(),
        government: doc.government.clone(),
        allegiance: doc.allegiance.clone(),
        state: doc.state.clone(),
        security: doc.security.clone(),
        primary_economy: doc.primary_economy.clone(),
        secondary_economy: doc.secondary_economy.clone(),
        population: doc.population,
        controlling_minor_faction: doc.controlling_minor_faction.clone(),
        factions: doc.factions.clone(),
        updated_at: doc.updated_at,
        updated_by: doc.updated_by.clone(),
    }
}

fn faction_history(doc: &FactionDoc, presence: &FactionPresence) -> FactionHistory {
    FactionHistory {
        id: HistoryId::new(),
        faction_id: doc.id,
        faction_name_lower: doc.name_lower.clone(),
        system: presence.system_name.clone(),
        system_lower: presence.system_name_lower.clone(),
        state: presence.state.clone(),
        influence: presence.influence,
        happiness: presence.happiness.clone(),
        active_states: presence.active_states.clone(),
        pending_states: presence.pending_states.clone(),
        recovering_states: presence.recovering_states.clone(),
        updated_at: presence.updated_at,
        updated_by: doc.updated_by.clone(),
    }
}

fn station_doc(id: StationId, name: &str, message: &JournalMessage, ctx: &EventContext) -> StationDoc {
    let controlling = message.station_faction.as_ref();
    StationDoc {
        id,
        name: name.trim().to_owned(),
        name_lower: name_key(name),
        market_id: message.market_id,
        station_type: lower(message.station_type.as_deref()),
        system: message.star_system.trim().to_owned(),
        system_lower: name_key(&message.star_system),
        government: lower(message.station_government.as_deref()),
        allegiance: lower(message.station_allegiance.as_deref()),
        economy: lower(message.station_economy.as_deref()),
        all_economies: normalize::economies(message),
        state: lower(controlling.and_then(|f| f.state())),
        controlling_minor_faction: controlling.map(|f| f.name().to_owned()),
        distance_from_star: message.dist_from_star_ls,
        services: normalize::services(&message.station_services),
        updated_at: ctx.at,
        updated_by: ctx.software.clone(),
    }
}

/// Keep the market id, distance and economy breakdown when an event omits
/// them.
fn keep_known_station_fields(doc: &mut StationDoc, current: &StationDoc) {
    doc.market_id = doc.market_id.or(current.market_id);
    doc.distance_from_star = doc.distance_from_star.or(current.distance_from_star);
    if doc.all_economies.is_empty() {
        doc.all_economies.clone_from(&current.all_economies);
    }
}

fn refreshed_station(current: &StationDoc, ctx: &EventContext) -> StationDoc {
    StationDoc {
        updated_at: ctx.at,
        updated_by: ctx.software.clone(),
        ..current.clone()
    }
}

fn station_history(doc: &StationDoc) -> StationHistory {
    StationHistory {
        id: HistoryId::new(),
        station_id: doc.id,
        station_name_lower: doc.name_lower.clone(),
        station_type: doc.station_type.clone(),
        government: doc.government.clone(),
        allegiance: doc.allegiance.clone(),
        economy: doc.economy.clone(),
        state: doc.state.clone(),
        controlling_minor_faction: doc.controlling_minor_faction.clone(),
        services: doc.services.clone(),
        updated_at: doc.updated_at,
        updated_by: doc.updated_by.clone(),
    }
}

// ---------------------------------------------------------------------------
// Change detection
// ---------------------------------------------------------------------------

fn key_eq(a: Option<&str>, b: Option<&str>) -> bool {
    a.map(name_key) == b.map(name_key)
}

/// Relevant-field equality of two system snapshots.
///
/// Faction lists are stored sorted, so equality is order-insensitive.
fn same_system(a: &SystemHistory, b: &SystemHistory) -> bool {
    a.government == b.government
        && a.allegiance == b.allegiance
        && a.state == b.state
        && a.security == b.security
        && a.primary_economy == b.primary_economy
        && a.secondary_economy == b.secondary_economy
        && a.population == b.population
        && key_eq(
            a.controlling_minor_faction.as_deref(),
            b.controlling_minor_faction.as_deref(),
        )
        && sorted_keys(&a.factions) == sorted_keys(&b.factions)
}

fn sorted_keys(factions: &[SystemFaction]) -> Vec<&str> {
    let mut keys: Vec<&str> = factions.iter().map(|f| f.name_lower.as_str()).collect();
    keys.sort_unstable();
    keys
}

/// Relevant-field equality of two presence snapshots.
///
/// Influence compares numerically: `0.5` and `0.500` are equal.
fn same_presence(a: &FactionHistory, b: &FactionHistory) -> bool {
    a.state == b.state
        && a.influence == b.influence
        && a.happiness == b.happiness
        && sorted(&a.active_states) == sorted(&b.active_states)
        && sorted(&a.pending_states) == sorted(&b.pending_states)
        && sorted(&a.recovering_states) == sorted(&b.recovering_states)
}

fn sorted<T: Ord>(items: &[T]) -> Vec<&T> {
    let mut out: Vec<&T> = items.iter().collect();
    out.sort_unstable();
    out
}

fn same_station(a: &StationHistory, b: &StationHistory) -> bool {
    a.station_type == b.station_type
        && a.government == b.government
        && a.allegiance == b.allegiance
        && a.economy == b.economy
        && a.state == b.state
        && key_eq(
            a.controlling_minor_faction.as_deref(),
            b.controlling_minor_faction.as_deref(),
        )
        && sorted(&a.services) == sorted(&b.services)
}
