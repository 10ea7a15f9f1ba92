//! Journal payload to document projection.
//!
//! Turns the raw fields of a [`JournalMessage`] into the lower-cased,
//! order-normalized values stored on documents and history rows. List
//! fields are sorted here so that two snapshots compare equal regardless of
//! the order the game reported them in.

use chrono::{DateTime, Utc};
use elitebgs_types::{
    ActiveState, FactionPresence, Header, JournalFaction, JournalMessage, JournalTrendingState,
    StationEconomy, SystemFaction, TrendingState, name_key,
};

/// Event time and uploader attached to every write derived from one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    /// Authoritative event time.
    pub at: DateTime<Utc>,
    /// Uploading software name.
    pub software: String,
}

impl EventContext {
    /// Derive the context from an envelope header and its message.
    ///
    /// The gateway timestamp is preferred; uploaders' clocks are not
    /// trusted when the gateway supplied one.
    pub fn new(header: &Header, message: &JournalMessage) -> Self {
        Self {
            at: header.gateway_timestamp.unwrap_or(message.timestamp),
            software: header.software_name.clone(),
        }
    }
}

/// Lower-case an optional categorical value, dropping empty strings.
pub fn lower(value: Option<&str>) -> Option<String> {
    value.map(name_key).filter(|v| !v.is_empty())
}

/// The sorted faction set of a system.
pub fn system_factions(message: &JournalMessage) -> Vec<SystemFaction> {
    let mut factions: Vec<SystemFaction> = message
        .factions
        .iter()
        .map(|f| SystemFaction::new(&f.name))
        .collect();
    factions.sort();
    factions.dedup_by(|a, b| a.name_lower == b.name_lower);
    factions
}

fn trending(states: &[JournalTrendingState]) -> Vec<TrendingState> {
    let mut out: Vec<TrendingState> = states
        .iter()
        .map(|s| TrendingState {
            state: name_key(&s.state),
            trend: s.trend,
        })
        .collect();
    out.sort();
    out
}

/// Project one journal faction entry into a presence in `system`.
pub fn presence(system: &str, faction: &JournalFaction, at: DateTime<Utc>) -> FactionPresence {
    let mut active_states: Vec<ActiveState> = faction
        .active_states
        .iter()
        .map(|s| ActiveState {
            state: name_key(&s.state),
        })
        .collect();
    active_states.sort();

    FactionPresence {
        system_name: system.to_owned(),
        system_name_lower: name_key(system),
        state: lower(faction.faction_state.as_deref()),
        influence: faction.influence.normalize(),
        happiness: lower(faction.happiness.as_deref()),
        active_states,
        pending_states: trending(&faction.pending_states),
        recovering_states: trending(&faction.recovering_states),
        updated_at: at,
    }
}

/// Lower-cased, sorted, de-duplicated service list.
pub fn services(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values.iter().map(|s| name_key(s)).collect();
    out.sort();
    out.dedup();
    out
}

/// Lower-cased economy mix, sorted by name.
pub fn economies(message: &JournalMessage) -> Vec<StationEconomy> {
    let mut out: Vec<StationEconomy> = message
        .station_economies
        .iter()
        .map(|e| StationEconomy {
            name: name_key(&e.name),
            proportion: e.proportion.normalize(),
        })
        .collect();
    out.sort();
    out
}
