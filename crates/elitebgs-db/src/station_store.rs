//! `PostgreSQL` operations on the `stations` and `station_history` tables.

use chrono::{DateTime, Utc};
use elitebgs_types::{
    HistoryMode, StationDoc, StationEconomy, StationFilter, StationHistory, StationId,
};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::DbError;
use crate::sql::{push_any_i64, push_any_text, push_any_uuid, push_prefix};

const STATION_COLUMNS: &str = "st.id, st.name, st.name_lower, st.market_id, st.station_type, \
     st.system, st.system_lower, st.government, st.allegiance, st.economy, st.all_economies, \
     st.state, st.controlling_minor_faction, st.distance_from_star, st.services, st.updated_at, \
     st.updated_by";

const HISTORY_COLUMNS: &str = "id, station_id, station_name_lower, station_type, government, \
     allegiance, economy, state, controlling_minor_faction, services, updated_at, updated_by";

/// Operations on station documents and their history.
pub struct StationStore<'a> {
    pool: &'a PgPool,
}

impl<'a> StationStore<'a> {
    /// Create a new station store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a station by market id, falling back to its name within its
    /// system when no station carries that id yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn find(
        &self,
        market_id: Option<i64>,
        name_lower: &str,
        system_lower: &str,
    ) -> Result<Option<StationDoc>, DbError> {
        let row = sqlx::query_as::<_, StationRow>(&format!(
            "SELECT {STATION_COLUMNS} FROM stations st \
             WHERE st.market_id = $1 OR (st.name_lower = $2 AND st.system_lower = $3) \
             ORDER BY (st.market_id = $1) IS TRUE DESC \
             LIMIT 1"
        ))
        .bind(market_id)
        .bind(name_lower)
        .bind(system_lower)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(StationDoc::from))
    }

    /// Insert a new station or overwrite every column of an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the write fails.
    pub async fn save(&self, doc: &StationDoc) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO stations (id, name, name_lower, market_id, station_type, system,
                  system_lower, government, allegiance, economy, all_economies, state,
                  controlling_minor_faction, distance_from_star, services, updated_at, updated_by)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
              ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                name_lower = EXCLUDED.name_lower,
                market_id = EXCLUDED.market_id,
                station_type = EXCLUDED.station_type,
                system = EXCLUDED.system,
                system_lower = EXCLUDED.system_lower,
                government = EXCLUDED.government,
                allegiance = EXCLUDED.allegiance,
                economy = EXCLUDED.economy,
                all_economies = EXCLUDED.all_economies,
                state = EXCLUDED.state,
                controlling_minor_faction = EXCLUDED.controlling_minor_faction,
                distance_from_star = EXCLUDED.distance_from_star,
                services = EXCLUDED.services,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by",
        )
        .bind(doc.id.into_inner())
        .bind(&doc.name)
        .bind(&doc.name_lower)
        .bind(doc.market_id)
        .bind(&doc.station_type)
        .bind(&doc.system)
        .bind(&doc.system_lower)
        .bind(&doc.government)
        .bind(&doc.allegiance)
        .bind(&doc.economy)
        .bind(Json(&doc.all_economies))
        .bind(&doc.state)
        .bind(&doc.controlling_minor_faction)
        .bind(doc.distance_from_star)
        .bind(Json(&doc.services))
        .bind(doc.updated_at)
        .bind(&doc.updated_by)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Refresh only the freshness columns of a station.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn touch(
        &self,
        id: StationId,
        updated_at: DateTime<Utc>,
        updated_by: &str,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE stations SET updated_at = $2, updated_by = $3 WHERE id = $1")
            .bind(id.into_inner())
            .bind(updated_at)
            .bind(updated_by)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Most recent history snapshot of a station.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn latest_history(&self, id: StationId) -> Result<Option<StationHistory>, DbError> {
        let row = sqlx::query_as::<_, StationHistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM station_history
             WHERE station_id = $1
             ORDER BY updated_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(id.into_inner())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(StationHistory::from))
    }

    /// Append one history snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn append_history(&self, row: &StationHistory) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO station_history (id, station_id, station_name_lower, station_type,
                  government, allegiance, economy, state, controlling_minor_faction, services,
                  updated_at, updated_by)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(row.id.into_inner())
        .bind(row.station_id.into_inner())
        .bind(&row.station_name_lower)
        .bind(&row.station_type)
        .bind(&row.government)
        .bind(&row.allegiance)
        .bind(&row.economy)
        .bind(&row.state)
        .bind(&row.controlling_minor_faction)
        .bind(Json(&row.services))
        .bind(row.updated_at)
        .bind(&row.updated_by)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Number of stations matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count(&self, filter: &StationFilter) -> Result<u64, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM stations st WHERE TRUE");
        push_filter(&mut qb, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// One page of stations matching `filter`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list(
        &self,
        filter: &StationFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<StationDoc>, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {STATION_COLUMNS} FROM stations st WHERE TRUE"
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY st.name_lower, st.id LIMIT ");
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
        let rows: Vec<StationRow> = qb.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(StationDoc::from).collect())
    }

    /// History of one station under `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn history(
        &self,
        id: StationId,
        mode: HistoryMode,
    ) -> Result<Vec<StationHistory>, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {HISTORY_COLUMNS} FROM station_history WHERE station_id = "
        ));
        qb.push_bind(id.into_inner());
        match mode {
            HistoryMode::Window { from, to } => {
                qb.push(" AND updated_at BETWEEN ");
                qb.push_bind(from);
                qb.push(" AND ");
                qb.push_bind(to);
                qb.push(" ORDER BY updated_at ASC, id ASC");
            }
            HistoryMode::Latest { count } => {
                qb.push(" ORDER BY updated_at DESC, id DESC LIMIT ");
                qb.push_bind(i64::from(count));
            }
        }
        let rows: Vec<StationHistoryRow> = qb.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(StationHistory::from).collect())
    }
}

/// Append the populated filter slots as predicates on alias `st`.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &StationFilter) {
    push_any_uuid(
        qb,
        "st.id",
        filter.ids.iter().copied().map(StationId::into_inner).collect(),
    );
    push_any_i64(qb, "st.market_id", &filter.market_ids);
    push_any_text(qb, "st.name_lower", &filter.names);
    push_any_text(qb, "st.station_type", &filter.types);
    push_any_text(qb, "st.system_lower", &filter.systems);
    push_any_text(qb, "st.economy", &filter.economies);
    push_any_text(qb, "st.allegiance", &filter.allegiances);
    push_any_text(qb, "st.government", &filter.governments);
    push_any_text(qb, "st.state", &filter.states);
    push_prefix(qb, "st.name_lower", filter.begins_with.as_deref());
}

/// A row from the `stations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct StationRow {
    id: Uuid,
    name: String,
    name_lower: String,
    market_id: Option<i64>,
    station_type: Option<String>,
    system: String,
    system_lower: String,
    government: Option<String>,
    allegiance: Option<String>,
    economy: Option<String>,
    all_economies: Json<Vec<StationEconomy>>,
    state: Option<String>,
    controlling_minor_faction: Option<String>,
    distance_from_star: Option<f64>,
    services: Json<Vec<String>>,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl From<StationRow> for StationDoc {
    fn from(row: StationRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            name_lower: row.name_lower,
            market_id: row.market_id,
            station_type: row.station_type,
            system: row.system,
            system_lower: row.system_lower,
            government: row.government,
            allegiance: row.allegiance,
            economy: row.economy,
            all_economies: row.all_economies.0,
            state: row.state,
            controlling_minor_faction: row.controlling_minor_faction,
            distance_from_star: row.distance_from_star,
            services: row.services.0,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

/// A row from the `station_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct StationHistoryRow {
    id: Uuid,
    station_id: Uuid,
    station_name_lower: String,
    station_type: Option<String>,
    government: Option<String>,
    allegiance: Option<String>,
    economy: Option<String>,
    state: Option<String>,
    controlling_minor_faction: Option<String>,
    services: Json<Vec<String>>,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl From<StationHistoryRow> for StationHistory {
    fn from(row: StationHistoryRow) -> Self {
        Self {
            id: row.id.into(),
            station_id: row.station_id.into(),
            station_name_lower: row.station_name_lower,
            station_type: row.station_type,
            government: row.government,
            allegiance: row.allegiance,
            economy: row.economy,
            state: row.state,
            controlling_minor_faction: row.controlling_minor_faction,
            services: row.services.0,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}
