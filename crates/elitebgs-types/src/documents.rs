//! Current-state documents: one per system, faction, and station.
//!
//! A document holds the latest known attributes of an entity and is updated
//! in place by the reconciler. Documents are never deleted; an entity that
//! disappears from the feed simply stops being refreshed.
//!
//! All categorical values (government, allegiance, economy, state, ...) are
//! stored lower-cased exactly as the journal reports them, e.g.
//! `$government_democracy;`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{FactionId, StationId, SystemId};

/// Normalize a display name or categorical value into its lookup key.
///
/// Keys are trimmed and lower-cased; every natural-key comparison in the
/// store goes through this function.
pub fn name_key(value: &str) -> String {
    value.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// A minor faction listed as present in a system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SystemFaction {
    /// Faction display name.
    pub name: String,
    /// Lower-cased faction name.
    pub name_lower: String,
}

impl SystemFaction {
    /// Build a faction reference from its display name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            name_lower: name_key(name),
        }
    }
}

/// Current state of a star system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SystemDoc {
    /// Surrogate document id.
    pub id: SystemId,
    /// System display name.
    pub name: String,
    /// Lower-cased system name (natural key).
    pub name_lower: String,
    /// In-game 64-bit system address, when the journal reports it.
    pub system_address: Option<i64>,
    /// Galactic X coordinate in light years.
    pub x: Option<f64>,
    /// Galactic Y coordinate in light years.
    pub y: Option<f64>,
    /// Galactic Z coordinate in light years.
    pub z: Option<f64>,
    /// Government of the controlling faction.
    pub government: Option<String>,
    /// Allegiance of the controlling faction.
    pub allegiance: Option<String>,
    /// State of the controlling faction.
    pub state: Option<String>,
    /// Security level.
    pub security: Option<String>,
    /// Primary economy.
    pub primary_economy: Option<String>,
    /// Secondary economy.
    pub secondary_economy: Option<String>,
    /// Population count.
    pub population: Option<i64>,
    /// Display name of the controlling faction.
    pub controlling_minor_faction: Option<String>,
    /// Lower-cased name of the controlling faction.
    pub controlling_minor_faction_lower: Option<String>,
    /// Factions present in the system.
    pub factions: Vec<SystemFaction>,
    /// Timestamp of the event that last refreshed this document.
    pub updated_at: DateTime<Utc>,
    /// Software that uploaded the last refreshing event.
    pub updated_by: String,
}

// ---------------------------------------------------------------------------
// Factions
// ---------------------------------------------------------------------------

/// An active faction state such as `boom` or `war`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActiveState {
    /// Lower-cased state name.
    pub state: String,
}

/// A pending or recovering faction state with its trend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrendingState {
    /// Lower-cased state name.
    pub state: String,
    /// Trend reported by the game (`-1`, `0`, `1`); absent in newer journals.
    pub trend: Option<i32>,
}

/// A faction's presence in a single system.
///
/// Keyed by `(faction id, system_name_lower)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FactionPresence {
    /// System display name.
    pub system_name: String,
    /// Lower-cased system name.
    pub system_name_lower: String,
    /// Current (dominant) state in this system.
    pub state: Option<String>,
    /// Influence in the range 0 to 1.
    #[ts(as = "String")]
    pub influence: Decimal,
    /// Happiness indicator, e.g. `$faction_happinessband2;`.
    pub happiness: Option<String>,
    /// Active states.
    pub active_states: Vec<ActiveState>,
    /// Pending states.
    pub pending_states: Vec<TrendingState>,
    /// Recovering states.
    pub recovering_states: Vec<TrendingState>,
    /// Timestamp of the event that last refreshed this presence.
    pub updated_at: DateTime<Utc>,
}

/// Current state of a minor faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FactionDoc {
    /// Surrogate document id.
    pub id: FactionId,
    /// Faction display name.
    pub name: String,
    /// Lower-cased faction name (natural key).
    pub name_lower: String,
    /// Government type.
    pub government: Option<String>,
    /// Allegiance.
    pub allegiance: Option<String>,
    /// Presence records ordered by lower-cased system name.
    pub faction_presence: Vec<FactionPresence>,
    /// Timestamp of the event that last refreshed this document.
    pub updated_at: DateTime<Utc>,
    /// Software that uploaded the last refreshing event.
    pub updated_by: String,
}

impl FactionDoc {
    /// Find the presence record for a lower-cased system name.
    pub fn presence(&self, system_name_lower: &str) -> Option<&FactionPresence> {
        self.faction_presence
            .iter()
            .find(|p| p.system_name_lower == system_name_lower)
    }

    /// Insert or replace the presence for its system, keeping the list
    /// ordered by system name.
    pub fn upsert_presence(&mut self, presence: FactionPresence) {
        match self
            .faction_presence
            .binary_search_by(|p| p.system_name_lower.cmp(&presence.system_name_lower))
        {
            Ok(index) => {
                if let Some(slot) = self.faction_presence.get_mut(index) {
                    *slot = presence;
                }
            }
            Err(index) => self.faction_presence.insert(index, presence),
        }
    }

    /// Lower-cased names of every system the faction is present in.
    pub fn system_names_lower(&self) -> Vec<String> {
        self.faction_presence
            .iter()
            .map(|p| p.system_name_lower.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

/// One entry of a station's economy mix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StationEconomy {
    /// Lower-cased economy name.
    pub name: String,
    /// Share of the economy, 0 to 1.
    #[ts(as = "String")]
    pub proportion: Decimal,
}

/// Current state of a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StationDoc {
    /// Surrogate document id.
    pub id: StationId,
    /// Station display name.
    pub name: String,
    /// Lower-cased station name.
    pub name_lower: String,
    /// In-game market id, when reported.
    pub market_id: Option<i64>,
    /// Station type, e.g. `coriolis`.
    #[serde(rename = "type")]
    pub station_type: Option<String>,
    /// Display name of the system the station orbits.
    pub system: String,
    /// Lower-cased system name.
    pub system_lower: String,
    /// Government of the controlling faction.
    pub government: Option<String>,
    /// Allegiance of the controlling faction.
    pub allegiance: Option<String>,
    /// Primary economy.
    pub economy: Option<String>,
    /// Full economy mix.
    pub all_economies: Vec<StationEconomy>,
    /// State of the controlling faction.
    pub state: Option<String>,
    /// Display name of the controlling faction.
    pub controlling_minor_faction: Option<String>,
    /// Distance from the arrival star in light seconds.
    pub distance_from_star: Option<f64>,
    /// Lower-cased service names.
    pub services: Vec<String>,
    /// Timestamp of the event that last refreshed this document.
    pub updated_at: DateTime<Utc>,
    /// Software that uploaded the last refreshing event.
    pub updated_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(system: &str) -> FactionPresence {
        FactionPresence {
            system_name: system.to_owned(),
            system_name_lower: name_key(system),
            state: None,
            influence: Decimal::new(1, 1),
            happiness: None,
            active_states: Vec::new(),
            pending_states: Vec::new(),
            recovering_states: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn name_key_trims_and_lowercases() {
        assert_eq!(name_key("  Sol "), "sol");
        assert_eq!(name_key("$government_Democracy;"), "$government_democracy;");
    }

    #[test]
    fn upsert_presence_keeps_order_and_replaces() {
        let mut faction = FactionDoc {
            id: FactionId::new(),
            name: String::from("Mother Gaia"),
            name_lower: name_key("Mother Gaia"),
            government: None,
            allegiance: None,
            faction_presence: Vec::new(),
            updated_at: Utc::now(),
            updated_by: String::new(),
        };
        faction.upsert_presence(presence("Sol"));
        faction.upsert_presence(presence("Alpha Centauri"));
        let mut replacement = presence("Sol");
        replacement.influence = Decimal::new(5, 1);
        faction.upsert_presence(replacement);

        assert_eq!(faction.system_names_lower(), vec!["alpha centauri", "sol"]);
        assert_eq!(
            faction.presence("sol").map(|p| p.influence),
            Some(Decimal::new(5, 1))
        );
    }
}
