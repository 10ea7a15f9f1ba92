//! Query string parsing.
//!
//! Parameters arrive as an ordered list of pairs so that repeated keys
//! (`?system=Sol&system=Achenar`) populate list predicates. Keys match
//! case-sensitively, except `timemin`/`timemax` which also accept the
//! camel-cased spelling.

use std::str::FromStr;

use elitebgs_core::query::{FactionQuery, StationQuery, SystemQuery, history_mode};
use elitebgs_types::{
    FactionFilter, FactionId, HistoryMode, StationFilter, StationId, SystemFilter, SystemId,
};

use crate::error::ApiError;

/// Raw query parameters in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl From<Vec<(String, String)>> for Params {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl Params {
    /// Every non-blank value given for `key`.
    pub fn all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// The last non-blank value given for `key`.
    pub fn one(&self, key: &str) -> Option<&str> {
        self.all(key).pop()
    }

    /// `key` parsed as `T`, if present.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, ApiError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.one(key)
            .map(|raw| raw.parse().map_err(|e| ApiError::invalid(key, e)))
            .transpose()
    }

    /// Every value of `key` parsed as `T`.
    pub fn parse_all<T>(&self, key: &str) -> Result<Vec<T>, ApiError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.all(key)
            .into_iter()
            .map(|raw| raw.parse().map_err(|e| ApiError::invalid(key, e)))
            .collect()
    }

    /// A boolean flag; absent means `false`.
    pub fn flag(&self, key: &str) -> Result<bool, ApiError> {
        Ok(self.parse::<bool>(key)?.unwrap_or(false))
    }

    /// 1-based page number; absent means 1.
    pub fn page(&self) -> Result<u32, ApiError> {
        Ok(self.parse::<u32>("page")?.unwrap_or(1))
    }

    fn time(&self, key: &str, camel: &str) -> Result<Option<i64>, ApiError> {
        match self.parse::<i64>(key)? {
            Some(value) => Ok(Some(value)),
            None => self.parse::<i64>(camel),
        }
    }

    /// Historical mode from `timemin`, `timemax` and `count`.
    pub fn history(&self) -> Result<Option<HistoryMode>, ApiError> {
        let timemin = self.time("timemin", "timeMin")?;
        let timemax = self.time("timemax", "timeMax")?;
        let count = self.parse::<u32>("count")?;
        Ok(history_mode(timemin, timemax, count)?)
    }
}

/// Build a faction query from request parameters.
pub fn faction_query(params: &Params) -> Result<FactionQuery, ApiError> {
    let mut filter = FactionFilter::default()
        .with_ids(params.parse_all::<FactionId>("id")?)
        .with_names(params.all("name"))
        .with_allegiances(params.all("allegiance"))
        .with_governments(params.all("government"))
        .with_systems(params.all("system"))
        .with_active_states(params.all("activeState"))
        .with_pending_states(params.all("pendingState"))
        .with_recovering_states(params.all("recoveringState"));
    if let Some(prefix) = params.one("beginsWith") {
        filter = filter.with_begins_with(prefix);
    }

    Ok(FactionQuery {
        filter,
        history: params.history()?,
        page: params.page()?,
        minimal: params.flag("minimal")?,
        system_details: params.flag("systemDetails")?,
        filter_system_in_history: params.flag("filterSystemInHistory")?,
    })
}

/// Build a system query from request parameters.
pub fn system_query(params: &Params) -> Result<SystemQuery, ApiError> {
    let mut filter = SystemFilter::default()
        .with_ids(params.parse_all::<SystemId>("id")?)
        .with_system_addresses(params.parse_all::<i64>("systemAddress")?)
        .with_names(params.all("name"))
        .with_allegiances(params.all("allegiance"))
        .with_governments(params.all("government"))
        .with_states(params.all("state"))
        .with_primary_economies(params.all("primaryEconomy"))
        .with_securities(params.all("security"))
        .with_factions(params.all("faction"));
    if let Some(prefix) = params.one("beginsWith") {
        filter = filter.with_begins_with(prefix);
    }

    Ok(SystemQuery {
        filter,
        history: params.history()?,
        page: params.page()?,
        minimal: params.flag("minimal")?,
    })
}

/// Build a station query from request parameters.
pub fn station_query(params: &Params) -> Result<StationQuery, ApiError> {
    let mut filter = StationFilter::default()
        .with_ids(params.parse_all::<StationId>("id")?)
        .with_market_ids(params.parse_all::<i64>("marketId")?)
        .with_names(params.all("name"))
        .with_types(params.all("type"))
        .with_systems(params.all("system"))
        .with_economies(params.all("economy"))
        .with_allegiances(params.all("allegiance"))
        .with_governments(params.all("government"))
        .with_states(params.all("state"));
    if let Some(prefix) = params.one("beginsWith") {
        filter = filter.with_begins_with(prefix);
    }

    Ok(StationQuery {
        filter,
        history: params.history()?,
        page: params.page()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        Params::from(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn repeated_keys_fill_list_slots() {
        let query = faction_query(&params(&[
            ("system", "Sol"),
            ("system", "Achenar"),
            ("activeState", "Boom"),
            ("minimal", "true"),
        ]))
        .unwrap_or_else(|e| panic!("should parse: {e}"));
        assert_eq!(query.filter.systems, vec!["sol", "achenar"]);
        assert_eq!(query.filter.active_states, vec!["boom"]);
        assert!(query.minimal);
        assert_eq!(query.page, 1);
        assert_eq!(query.history, None);
    }

    #[test]
    fn both_time_spellings_are_accepted() {
        let lower = params(&[("timemin", "1000")]).history().ok().flatten();
        let camel = params(&[("timeMin", "1000")]).history().ok().flatten();
        assert!(lower.is_some());
        assert_eq!(lower, camel);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            system_query(&params(&[("name", "Sol"), ("page", "two")])),
            Err(ApiError::InvalidParam { .. })
        ));
        assert!(matches!(
            station_query(&params(&[("id", "not-a-uuid")])),
            Err(ApiError::InvalidParam { .. })
        ));
        assert!(matches!(
            faction_query(&params(&[("name", "x"), ("minimal", "yes")])),
            Err(ApiError::InvalidParam { .. })
        ));
    }

    #[test]
    fn blank_values_are_ignored() {
        let query = station_query(&params(&[("system", " "), ("beginsWith", "")]))
            .unwrap_or_else(|e| panic!("should parse: {e}"));
        assert!(query.filter.is_empty());
    }
}
