//! Typed predicate slots for current-entity queries.
//!
//! Each filter is a fixed set of independently optional slots. An empty
//! `Vec` or `None` slot means "not constrained". Multiple values inside one
//! slot are OR-ed; populated slots are AND-ed together. String values are
//! normalized through [`name_key`] when they are added, so the store only
//! ever compares lower-cased values.
//!
//! The store layers turn the populated slots into either bound SQL
//! predicates or in-memory matches. Nothing here builds query text.

use crate::documents::name_key;
use crate::ids::{FactionId, StationId, SystemId};

/// Normalize a batch of values into lookup keys.
fn keys<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values.into_iter().map(|v| name_key(v.as_ref())).collect()
}

/// Predicates over faction documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactionFilter {
    /// Document ids.
    pub ids: Vec<FactionId>,
    /// Exact lower-cased names.
    pub names: Vec<String>,
    /// Allegiances.
    pub allegiances: Vec<String>,
    /// Government types.
    pub governments: Vec<String>,
    /// Lower-cased name prefix.
    pub begins_with: Option<String>,
    /// Systems the faction must be present in (any of).
    pub systems: Vec<String>,
    /// Active states held in any presence.
    pub active_states: Vec<String>,
    /// Pending states held in any presence.
    pub pending_states: Vec<String>,
    /// Recovering states held in any presence.
    pub recovering_states: Vec<String>,
}

impl FactionFilter {
    /// Whether no slot is populated.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
            && self.names.is_empty()
            && self.allegiances.is_empty()
            && self.governments.is_empty()
            && self.begins_with.is_none()
            && self.systems.is_empty()
            && self.active_states.is_empty()
            && self.pending_states.is_empty()
            && self.recovering_states.is_empty()
    }

    /// Constrain to document ids.
    #[must_use]
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = FactionId>) -> Self {
        self.ids.extend(ids);
        self
    }

    /// Constrain to exact names.
    #[must_use]
    pub fn with_names<S: AsRef<str>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names.extend(keys(names));
        self
    }

    /// Constrain to allegiances.
    #[must_use]
    pub fn with_allegiances<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.allegiances.extend(keys(values));
        self
    }

    /// Constrain to government types.
    #[must_use]
    pub fn with_governments<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.governments.extend(keys(values));
        self
    }

    /// Constrain to names starting with `prefix`.
    #[must_use]
    pub fn with_begins_with(mut self, prefix: &str) -> Self {
        self.begins_with = Some(name_key(prefix));
        self
    }

    /// Constrain to factions present in any of `systems`.
    #[must_use]
    pub fn with_systems<S: AsRef<str>>(mut self, systems: impl IntoIterator<Item = S>) -> Self {
        self.systems.extend(keys(systems));
        self
    }

    /// Constrain to factions with any of the active states.
    #[must_use]
    pub fn with_active_states<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.active_states.extend(keys(values));
        self
    }

    /// Constrain to factions with any of the pending states.
    #[must_use]
    pub fn with_pending_states<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.pending_states.extend(keys(values));
        self
    }

    /// Constrain to factions with any of the recovering states.
    #[must_use]
    pub fn with_recovering_states<S: AsRef<str>>(
        mut self,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.recovering_states.extend(keys(values));
        self
    }
}

/// Predicates over system documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemFilter {
    /// Document ids.
    pub ids: Vec<SystemId>,
    /// In-game system addresses.
    pub system_addresses: Vec<i64>,
    /// Exact lower-cased names.
    pub names: Vec<String>,
    /// Allegiances.
    pub allegiances: Vec<String>,
    /// Government types.
    pub governments: Vec<String>,
    /// Controlling faction states.
    pub states: Vec<String>,
    /// Primary economies.
    pub primary_economies: Vec<String>,
    /// Security levels.
    pub securities: Vec<String>,
    /// Factions that must be present (any of).
    pub factions: Vec<String>,
    /// Lower-cased name prefix.
    pub begins_with: Option<String>,
}

impl SystemFilter {
    /// Whether no slot is populated.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
            && self.system_addresses.is_empty()
            && self.names.is_empty()
            && self.allegiances.is_empty()
            && self.governments.is_empty()
            && self.states.is_empty()
            && self.primary_economies.is_empty()
            && self.securities.is_empty()
            && self.factions.is_empty()
            && self.begins_with.is_none()
    }

    /// Constrain to document ids.
    #[must_use]
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = SystemId>) -> Self {
        self.ids.extend(ids);
        self
    }

    /// Constrain to system addresses.
    #[must_use]
    pub fn with_system_addresses(mut self, addresses: impl IntoIterator<Item = i64>) -> Self {
        self.system_addresses.extend(addresses);
        self
    }

    /// Constrain to exact names.
    #[must_use]
    pub fn with_names<S: AsRef<str>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names.extend(keys(names));
        self
    }

    /// Constrain to allegiances.
    #[must_use]
    pub fn with_allegiances<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.allegiances.extend(keys(values));
        self
    }

    /// Constrain to government types.
    #[must_use]
    pub fn with_governments<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.governments.extend(keys(values));
        self
    }

    /// Constrain to controlling faction states.
    #[must_use]
    pub fn with_states<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.states.extend(keys(values));
        self
    }

    /// Constrain to primary economies.
    #[must_use]
    pub fn with_primary_economies<S: AsRef<str>>(
        mut self,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.primary_economies.extend(keys(values));
        self
    }

    /// Constrain to security levels.
    #[must_use]
    pub fn with_securities<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.securities.extend(keys(values));
        self
    }

    /// Constrain to systems where any of `factions` is present.
    #[must_use]
    pub fn with_factions<S: AsRef<str>>(mut self, factions: impl IntoIterator<Item = S>) -> Self {
        self.factions.extend(keys(factions));
        self
    }

    /// Constrain to names starting with `prefix`.
    #[must_use]
    pub fn with_begins_with(mut self, prefix: &str) -> Self {
        self.begins_with = Some(name_key(prefix));
        self
    }
}

/// Predicates over station documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationFilter {
    /// Document ids.
    pub ids: Vec<StationId>,
    /// In-game market ids.
    pub market_ids: Vec<i64>,
    /// Exact lower-cased names.
    pub names: Vec<String>,
    /// Station types.
    pub types: Vec<String>,
    /// Systems the station is in.
    pub systems: Vec<String>,
    /// Primary economies.
    pub economies: Vec<String>,
    /// Allegiances.
    pub allegiances: Vec<String>,
    /// Government types.
    pub governments: Vec<String>,
    /// Controlling faction states.
    pub states: Vec<String>,
    /// Lower-cased name prefix.
    pub begins_with: Option<String>,
}

impl StationFilter {
    /// Whether no slot is populated.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
            && self.market_ids.is_empty()
            && self.names.is_empty()
            && self.types.is_empty()
            && self.systems.is_empty()
            && self.economies.is_empty()
            && self.allegiances.is_empty()
            && self.governments.is_empty()
            && self.states.is_empty()
            && self.begins_with.is_none()
    }

    /// Constrain to document ids.
    #[must_use]
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = StationId>) -> Self {
        self.ids.extend(ids);
        self
    }

    /// Constrain to market ids.
    #[must_use]
    pub fn with_market_ids(mut self, market_ids: impl IntoIterator<Item = i64>) -> Self {
        self.market_ids.extend(market_ids);
        self
    }

    /// Constrain to exact names.
    #[must_use]
    pub fn with_names<S: AsRef<str>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names.extend(keys(names));
        self
    }

    /// Constrain to station types.
    #[must_use]
    pub fn with_types<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.types.extend(keys(values));
        self
    }

    /// Constrain to systems.
    #[must_use]
    pub fn with_systems<S: AsRef<str>>(mut self, systems: impl IntoIterator<Item = S>) -> Self {
        self.systems.extend(keys(systems));
        self
    }

    /// Constrain to primary economies.
    #[must_use]
    pub fn with_economies<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.economies.extend(keys(values));
        self
    }

    /// Constrain to allegiances.
    #[must_use]
    pub fn with_allegiances<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.allegiances.extend(keys(values));
        self
    }

    /// Constrain to government types.
    #[must_use]
    pub fn with_governments<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.governments.extend(keys(values));
        self
    }

    /// Constrain to controlling faction states.
    #[must_use]
    pub fn with_states<S: AsRef<str>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.states.extend(keys(values));
        self
    }

    /// Constrain to names starting with `prefix`.
    #[must_use]
    pub fn with_begins_with(mut self, prefix: &str) -> Self {
        self.begins_with = Some(name_key(prefix));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_are_empty() {
        assert!(FactionFilter::default().is_empty());
        assert!(SystemFilter::default().is_empty());
        assert!(StationFilter::default().is_empty());
    }

    #[test]
    fn builder_normalizes_values() {
        let filter = FactionFilter::default()
            .with_names(["Mother Gaia"])
            .with_systems(["SOL", "Alpha Centauri"])
            .with_begins_with("Moth");
        assert!(!filter.is_empty());
        assert_eq!(filter.names, vec!["mother gaia"]);
        assert_eq!(filter.systems, vec!["sol", "alpha centauri"]);
        assert_eq!(filter.begins_with.as_deref(), Some("moth"));
    }

    #[test]
    fn numeric_slots_count_as_predicates() {
        assert!(!SystemFilter::default().with_system_addresses([42]).is_empty());
        assert!(!StationFilter::default().with_market_ids([7]).is_empty());
    }
}
