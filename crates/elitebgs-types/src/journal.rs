//! EDDN envelope and journal payload types.
//!
//! Every relay frame decodes into an [`Envelope`]: a schema URI, an upload
//! header, and a schema-specific message. Only the journal schema is
//! interpreted; its message is parsed into [`JournalMessage`], which covers
//! the fields of the `FSDJump`, `Location`, `CarrierJump` and `Docked`
//! events this service reconciles.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Journal schema URI published by the EDDN gateway.
pub const JOURNAL_SCHEMA: &str = "https://eddn.edcd.io/schemas/journal/1";

/// Legacy journal schema URI still emitted by older uploaders.
pub const JOURNAL_SCHEMA_LEGACY: &str = "http://schemas.elite-markets.net/eddn/journal/1";

/// A decoded relay message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Versioned schema URI identifying the shape of `message`.
    #[serde(rename = "$schemaRef")]
    pub schema_ref: String,
    /// Upload metadata added by the uploader and the gateway.
    pub header: Header,
    /// Schema-specific payload, interpreted by the dispatcher.
    pub message: serde_json::Value,
}

/// Upload metadata attached to every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Pseudonymous uploader id.
    #[serde(rename = "uploaderID", default)]
    pub uploader_id: String,
    /// Uploading software name.
    #[serde(rename = "softwareName", default)]
    pub software_name: String,
    /// Uploading software version.
    #[serde(rename = "softwareVersion", default)]
    pub software_version: String,
    /// Time the gateway accepted the upload.
    #[serde(rename = "gatewayTimestamp", default)]
    pub gateway_timestamp: Option<DateTime<Utc>>,
}

/// Controlling faction as reported by the journal.
///
/// Older journals send a bare name with the state in a sibling field; newer
/// ones send an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControllingFaction {
    /// Object form: `{"Name": ..., "FactionState": ...}`.
    Detailed {
        /// Faction display name.
        #[serde(rename = "Name")]
        name: String,
        /// Faction state in the system.
        #[serde(rename = "FactionState", default)]
        faction_state: Option<String>,
    },
    /// Bare faction name.
    Name(String),
}

impl ControllingFaction {
    /// Faction display name.
    pub fn name(&self) -> &str {
        match self {
            Self::Detailed { name, .. } | Self::Name(name) => name,
        }
    }

    /// Faction state, when the object form carries it.
    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Detailed { faction_state, .. } => faction_state.as_deref(),
            Self::Name(_) => None,
        }
    }
}

/// A state entry inside `ActiveStates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalActiveState {
    /// State name.
    pub state: String,
}

/// A state entry inside `PendingStates` or `RecoveringStates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalTrendingState {
    /// State name.
    pub state: String,
    /// Trend, absent in newer journals.
    #[serde(default)]
    pub trend: Option<i32>,
}

/// One entry of the `Factions` array: a faction's presence in the event's
/// system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalFaction {
    /// Faction display name.
    pub name: String,
    /// Dominant state.
    #[serde(default)]
    pub faction_state: Option<String>,
    /// Government type.
    #[serde(default)]
    pub government: Option<String>,
    /// Influence, 0 to 1.
    pub influence: Decimal,
    /// Allegiance.
    #[serde(default)]
    pub allegiance: Option<String>,
    /// Happiness indicator.
    #[serde(default)]
    pub happiness: Option<String>,
    /// Active states.
    #[serde(default)]
    pub active_states: Vec<JournalActiveState>,
    /// Pending states.
    #[serde(default)]
    pub pending_states: Vec<JournalTrendingState>,
    /// Recovering states.
    #[serde(default)]
    pub recovering_states: Vec<JournalTrendingState>,
}

/// An economy entry of a `Docked` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalEconomy {
    /// Economy name.
    pub name: String,
    /// Share, 0 to 1.
    pub proportion: Decimal,
}

/// The journal message fields used for reconciliation.
///
/// Fields not present on a given event type default to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalMessage {
    /// Journal event name, e.g. `FSDJump`.
    #[serde(rename = "event")]
    pub event: String,
    /// Client-side event time.
    #[serde(rename = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// System name.
    pub star_system: String,
    /// 64-bit system address.
    #[serde(default)]
    pub system_address: Option<i64>,
    /// Galactic coordinates `[x, y, z]`.
    #[serde(default)]
    pub star_pos: Option<Vec<f64>>,
    /// Controlling faction allegiance.
    #[serde(default)]
    pub system_allegiance: Option<String>,
    /// Primary economy.
    #[serde(default)]
    pub system_economy: Option<String>,
    /// Secondary economy.
    #[serde(default)]
    pub system_second_economy: Option<String>,
    /// Controlling faction government.
    #[serde(default)]
    pub system_government: Option<String>,
    /// Security level.
    #[serde(default)]
    pub system_security: Option<String>,
    /// Population.
    #[serde(default)]
    pub population: Option<i64>,
    /// Controlling faction.
    #[serde(default)]
    pub system_faction: Option<ControllingFaction>,
    /// Controlling faction state (older journals only).
    #[serde(default)]
    pub faction_state: Option<String>,
    /// Factions present in the system.
    #[serde(default)]
    pub factions: Vec<JournalFaction>,
    /// Station name (`Docked`).
    #[serde(default)]
    pub station_name: Option<String>,
    /// Station type (`Docked`).
    #[serde(default)]
    pub station_type: Option<String>,
    /// Market id (`Docked`).
    #[serde(rename = "MarketID", default)]
    pub market_id: Option<i64>,
    /// Station controlling faction (`Docked`).
    #[serde(default)]
    pub station_faction: Option<ControllingFaction>,
    /// Station government (`Docked`).
    #[serde(default)]
    pub station_government: Option<String>,
    /// Station allegiance (`Docked`).
    #[serde(default)]
    pub station_allegiance: Option<String>,
    /// Station services (`Docked`).
    #[serde(default)]
    pub station_services: Vec<String>,
    /// Station primary economy (`Docked`).
    #[serde(default)]
    pub station_economy: Option<String>,
    /// Station economy mix (`Docked`).
    #[serde(default)]
    pub station_economies: Vec<JournalEconomy>,
    /// Distance from the arrival star in light seconds (`Docked`).
    #[serde(rename = "DistFromStarLS", default)]
    pub dist_from_star_ls: Option<f64>,
}

impl JournalMessage {
    /// State of the controlling faction, from whichever form the journal
    /// used.
    pub fn controlling_state(&self) -> Option<&str> {
        self.system_faction
            .as_ref()
            .and_then(ControllingFaction::state)
            .or(self.faction_state.as_deref())
    }
}
