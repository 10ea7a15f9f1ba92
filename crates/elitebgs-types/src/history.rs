//! Append-only history records.
//!
//! A history row is an immutable snapshot of the observable state of an
//! entity at the moment the reconciler detected a change. Faction history is
//! kept per presence: one row describes one faction in one system.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::documents::{ActiveState, SystemFaction, TrendingState};
use crate::ids::{FactionId, HistoryId, StationId, SystemId};

/// Snapshot of a system's relevant state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SystemHistory {
    /// Row id.
    pub id: HistoryId,
    /// Owning system.
    pub system_id: SystemId,
    /// Lower-cased name of the owning system.
    pub system_name_lower: String,
    /// Controlling faction government.
    pub government: Option<String>,
    /// Controlling faction allegiance.
    pub allegiance: Option<String>,
    /// Controlling faction state.
    pub state: Option<String>,
    /// Security level.
    pub security: Option<String>,
    /// Primary economy.
    pub primary_economy: Option<String>,
    /// Secondary economy.
    pub secondary_economy: Option<String>,
    /// Population count.
    pub population: Option<i64>,
    /// Controlling faction display name.
    pub controlling_minor_faction: Option<String>,
    /// Factions present at snapshot time.
    pub factions: Vec<SystemFaction>,
    /// Event timestamp the snapshot was taken at.
    pub updated_at: DateTime<Utc>,
    /// Uploading software.
    pub updated_by: String,
}

/// Snapshot of one faction's presence in one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FactionHistory {
    /// Row id.
    pub id: HistoryId,
    /// Owning faction.
    pub faction_id: FactionId,
    /// Lower-cased name of the owning faction.
    pub faction_name_lower: String,
    /// System display name.
    pub system: String,
    /// Lower-cased system name.
    pub system_lower: String,
    /// Dominant state.
    pub state: Option<String>,
    /// Influence, 0 to 1.
    #[ts(as = "String")]
    pub influence: Decimal,
    /// Happiness indicator.
    pub happiness: Option<String>,
    /// Active states.
    pub active_states: Vec<ActiveState>,
    /// Pending states.
    pub pending_states: Vec<TrendingState>,
    /// Recovering states.
    pub recovering_states: Vec<TrendingState>,
    /// Event timestamp the snapshot was taken at.
    pub updated_at: DateTime<Utc>,
    /// Uploading software.
    pub updated_by: String,
}

/// Snapshot of a station's relevant state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StationHistory {
    /// Row id.
    pub id: HistoryId,
    /// Owning station.
    pub station_id: StationId,
    /// Lower-cased name of the owning station.
    pub station_name_lower: String,
    /// Station type.
    #[serde(rename = "type")]
    pub station_type: Option<String>,
    /// Controlling faction government.
    pub government: Option<String>,
    /// Controlling faction allegiance.
    pub allegiance: Option<String>,
    /// Primary economy.
    pub economy: Option<String>,
    /// Controlling faction state.
    pub state: Option<String>,
    /// Controlling faction display name.
    pub controlling_minor_faction: Option<String>,
    /// Lower-cased service names.
    pub services: Vec<String>,
    /// Event timestamp the snapshot was taken at.
    pub updated_at: DateTime<Utc>,
    /// Uploading software.
    pub updated_by: String,
}
