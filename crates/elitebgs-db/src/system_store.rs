//! `PostgreSQL` operations on the `systems` and `system_history` tables.

use chrono::{DateTime, Utc};
use elitebgs_types::{
    HistoryMode, SystemDoc, SystemFaction, SystemFilter, SystemHistory, SystemId,
};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::DbError;
use crate::sql::{push_any_i64, push_any_text, push_any_uuid, push_prefix};

const SYSTEM_COLUMNS: &str = "s.id, s.name, s.name_lower, s.system_address, s.x, s.y, s.z, \
     s.government, s.allegiance, s.state, s.security, s.primary_economy, s.secondary_economy, \
     s.population, s.controlling_minor_faction, s.controlling_minor_faction_lower, s.factions, \
     s.updated_at, s.updated_by";

const HISTORY_COLUMNS: &str = "id, system_id, system_name_lower, government, allegiance, state, \
     security, primary_economy, secondary_economy, population, controlling_minor_faction, \
     factions, updated_at, updated_by";

/// Operations on system documents and their history.
pub struct SystemStore<'a> {
    pool: &'a PgPool,
}

impl<'a> SystemStore<'a> {
    /// Create a new system store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a system by its lower-cased name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn find(&self, name_lower: &str) -> Result<Option<SystemDoc>, DbError> {
        let row = sqlx::query_as::<_, SystemRow>(&format!(
            "SELECT {SYSTEM_COLUMNS} FROM systems s WHERE s.name_lower = $1"
        ))
        .bind(name_lower)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(SystemDoc::from))
    }

    /// Insert a new system or overwrite every column of an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the write fails.
    pub async fn save(&self, doc: &SystemDoc) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO systems (id, name, name_lower, system_address, x, y, z, government,
                  allegiance, state, security, primary_economy, secondary_economy, population,
                  controlling_minor_faction, controlling_minor_faction_lower, factions,
                  updated_at, updated_by)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
              ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                system_address = EXCLUDED.system_address,
                x = EXCLUDED.x,
                y = EXCLUDED.y,
                z = EXCLUDED.z,
                government = EXCLUDED.government,
                allegiance = EXCLUDED.allegiance,
                state = EXCLUDED.state,
                security = EXCLUDED.security,
                primary_economy = EXCLUDED.primary_economy,
                secondary_economy = EXCLUDED.secondary_economy,
                population = EXCLUDED.population,
                controlling_minor_faction = EXCLUDED.controlling_minor_faction,
                controlling_minor_faction_lower = EXCLUDED.controlling_minor_faction_lower,
                factions = EXCLUDED.factions,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by",
        )
        .bind(doc.id.into_inner())
        .bind(&doc.name)
        .bind(&doc.name_lower)
        .bind(doc.system_address)
        .bind(doc.x)
        .bind(doc.y)
        .bind(doc.z)
        .bind(&doc.government)
        .bind(&doc.allegiance)
        .bind(&doc.state)
        .bind(&doc.security)
        .bind(&doc.primary_economy)
        .bind(&doc.secondary_economy)
        .bind(doc.population)
        .bind(&doc.controlling_minor_faction)
        .bind(&doc.controlling_minor_faction_lower)
        .bind(Json(&doc.factions))
        .bind(doc.updated_at)
        .bind(&doc.updated_by)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Refresh only the freshness columns of a system.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn touch(
        &self,
        id: SystemId,
        updated_at: DateTime<Utc>,
        updated_by: &str,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE systems SET updated_at = $2, updated_by = $3 WHERE id = $1")
            .bind(id.into_inner())
            .bind(updated_at)
            .bind(updated_by)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Most recent history snapshot of a system.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn latest_history(&self, id: SystemId) -> Result<Option<SystemHistory>, DbError> {
        let row = sqlx::query_as::<_, SystemHistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM system_history
             WHERE system_id = $1
             ORDER BY updated_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(id.into_inner())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(SystemHistory::from))
    }

    /// Append one history snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn append_history(&self, row: &SystemHistory) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO system_history (id, system_id, system_name_lower, government, allegiance,
                  state, security, primary_economy, secondary_economy, population,
                  controlling_minor_faction, factions, updated_at, updated_by)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(row.id.into_inner())
        .bind(row.system_id.into_inner())
        .bind(&row.system_name_lower)
        .bind(&row.government)
        .bind(&row.allegiance)
        .bind(&row.state)
        .bind(&row.security)
        .bind(&row.primary_economy)
        .bind(&row.secondary_economy)
        .bind(row.population)
        .bind(&row.controlling_minor_faction)
        .bind(Json(&row.factions))
        .bind(row.updated_at)
        .bind(&row.updated_by)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Number of systems matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count(&self, filter: &SystemFilter) -> Result<u64, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM systems s WHERE TRUE");
        push_filter(&mut qb, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// One page of systems matching `filter`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list(
        &self,
        filter: &SystemFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<SystemDoc>, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SYSTEM_COLUMNS} FROM systems s WHERE TRUE"
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY s.name_lower, s.id LIMIT ");
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
        let rows: Vec<SystemRow> = qb.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(SystemDoc::from).collect())
    }

    /// History of one system under `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn history(
        &self,
        id: SystemId,
        mode: HistoryMode,
    ) -> Result<Vec<SystemHistory>, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {HISTORY_COLUMNS} FROM system_history WHERE system_id = "
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
        let rows: Vec<SystemHistoryRow> = qb.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(SystemHistory::from).collect())
    }
}

/// Append the populated filter slots as predicates on alias `s`.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &SystemFilter) {
    push_any_uuid(
        qb,
        "s.id",
        filter.ids.iter().copied().map(SystemId::into_inner).collect(),
    );
    push_any_i64(qb, "s.system_address", &filter.system_addresses);
    push_any_text(qb, "s.name_lower", &filter.names);
    push_any_text(qb, "s.allegiance", &filter.allegiances);
    push_any_text(qb, "s.government", &filter.governments);
    push_any_text(qb, "s.state", &filter.states);
    push_any_text(qb, "s.primary_economy", &filter.primary_economies);
    push_any_text(qb, "s.security", &filter.securities);
    if !filter.factions.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM jsonb_array_elements(s.factions) sf \
             WHERE sf->>'name_lower' = ANY(",
        );
        qb.push_bind(filter.factions.clone());
        qb.push("))");
    }
    push_prefix(qb, "s.name_lower", filter.begins_with.as_deref());
}

/// A row from the `systems` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SystemRow {
    id: Uuid,
    name: String,
    name_lower: String,
    system_address: Option<i64>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    government: Option<String>,
    allegiance: Option<String>,
    state: Option<String>,
    security: Option<String>,
    primary_economy: Option<String>,
    secondary_economy: Option<String>,
    population: Option<i64>,
    controlling_minor_faction: Option<String>,
    controlling_minor_faction_lower: Option<String>,
    factions: Json<Vec<SystemFaction>>,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl From<SystemRow> for SystemDoc {
    fn from(row: SystemRow) -> Self {
        Self {
            id: SystemId::from(row.id),
            name: row.name,
            name_lower: row.name_lower,
            system_address: row.system_address,
            x: row.x,
            y: row.y,
            z: row.z,
            government: row.government,
            allegiance: row.allegiance,
            state: row.state,
            security: row.security,
            primary_economy: row.primary_economy,
            secondary_economy: row.secondary_economy,
            population: row.population,
            controlling_minor_faction: row.controlling_minor_faction,
            controlling_minor_faction_lower: row.controlling_minor_faction_lower,
            factions: row.factions.0,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

/// A row from the `system_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SystemHistoryRow {
    id: Uuid,
    system_id: Uuid,
    system_name_lower: String,
    government: Option<String>,
    allegiance: Option<String>,
    state: Option<String>,
    security: Option<String>,
    primary_economy: Option<String>,
    secondary_economy: Option<String>,
    population: Option<i64>,
    controlling_minor_faction: Option<String>,
    factions: Json<Vec<SystemFaction>>,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl From<SystemHistoryRow> for SystemHistory {
    fn from(row: SystemHistoryRow) -> Self {
        Self {
            id: row.id.into(),
            system_id: row.system_id.into(),
            system_name_lower: row.system_name_lower,
            government: row.government,
            allegiance: row.allegiance,
            state: row.state,
            security: row.security,
            primary_economy: row.primary_economy,
            secondary_economy: row.secondary_economy,
            population: row.population,
            controlling_minor_faction: row.controlling_minor_faction,
            factions: row.factions.0,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}
