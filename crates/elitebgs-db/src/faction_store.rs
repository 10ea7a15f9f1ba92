//! `PostgreSQL` operations on factions, their presences, and
//! `faction_history`.
//!
//! A faction document is split across two tables: the `factions` row and
//! one `faction_presences` row per system. [`FactionStore::list`] reassembles
//! a page of documents in a single statement, joining each presence to the
//! `systems` row with the same lower-cased name so callers get the system's
//! id (and optionally the full system document) without a second round trip.

use chrono::{DateTime, Utc};
use elitebgs_types::{
    ActiveState, FactionDoc, FactionFilter, FactionHistory, FactionId, FactionPresence,
    FactionView, HistoryMode, PresenceView, SystemDoc, TrendingState,
};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::DbError;
use crate::sql::{push_any_text, push_any_uuid, push_prefix};

const HISTORY_COLUMNS: &str = "id, faction_id, faction_name_lower, system, system_lower, state, \
     influence, happiness, active_states, pending_states, recovering_states, updated_at, \
     updated_by";

/// Operations on faction documents and their history.
pub struct FactionStore<'a> {
    pool: &'a PgPool,
}

impl<'a> FactionStore<'a> {
    /// Create a new faction store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a faction and all of its presences by lower-cased name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if either query fails.
    pub async fn find(&self, name_lower: &str) -> Result<Option<FactionDoc>, DbError> {
        let Some(row) = sqlx::query_as::<_, FactionRow>(
            r"SELECT id, name, name_lower, government, allegiance, updated_at, updated_by
              FROM factions WHERE name_lower = $1",
        )
        .bind(name_lower)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let presences = sqlx::query_as::<_, PresenceRow>(
            r"SELECT system_name, system_name_lower, state, influence, happiness,
                     active_states, pending_states, recovering_states, updated_at
              FROM faction_presences
              WHERE faction_id = $1
              ORDER BY system_name_lower",
        )
        .bind(row.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(FactionDoc {
            id: row.id.into(),
            name: row.name,
            name_lower: row.name_lower,
            government: row.government,
            allegiance: row.allegiance,
            faction_presence: presences.into_iter().map(FactionPresence::from).collect(),
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }))
    }

    /// Upsert the faction row and every presence it carries.
    ///
    /// Presences missing from `doc` are left untouched in the table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any write fails; the transaction is
    /// rolled back.
    pub async fn save(&self, doc: &FactionDoc) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT INTO factions (id, name, name_lower, government, allegiance, updated_at, updated_by)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                government = EXCLUDED.government,
                allegiance = EXCLUDED.allegiance,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by",
        )
        .bind(doc.id.into_inner())
        .bind(&doc.name)
        .bind(&doc.name_lower)
        .bind(&doc.government)
        .bind(&doc.allegiance)
        .bind(doc.updated_at)
        .bind(&doc.updated_by)
        .execute(&mut *tx)
        .await?;

        for presence in &doc.faction_presence {
            sqlx::query(
                r"INSERT INTO faction_presences (faction_id, system_name, system_name_lower, state,
                      influence, happiness, active_states, pending_states, recovering_states, updated_at)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                  ON CONFLICT (faction_id, system_name_lower) DO UPDATE SET
                    system_name = EXCLUDED.system_name,
                    state = EXCLUDED.state,
                    influence = EXCLUDED.influence,
                    happiness = EXCLUDED.happiness,
                    active_states = EXCLUDED.active_states,
                    pending_states = EXCLUDED.pending_states,
                    recovering_states = EXCLUDED.recovering_states,
                    updated_at = EXCLUDED.updated_at",
            )
            .bind(doc.id.into_inner())
            .bind(&presence.system_name)
            .bind(&presence.system_name_lower)
            .bind(&presence.state)
            .bind(presence.influence)
            .bind(&presence.happiness)
            .bind(Json(&presence.active_states))
            .bind(Json(&presence.pending_states))
            .bind(Json(&presence.recovering_states))
            .bind(presence.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Most recent history snapshot of one presence.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn latest_history(
        &self,
        id: FactionId,
        system_lower: &str,
    ) -> Result<Option<FactionHistory>, DbError> {
        let row = sqlx::query_as::<_, FactionHistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM faction_history
             WHERE faction_id = $1 AND system_lower = $2
             ORDER BY updated_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(id.into_inner())
        .bind(system_lower)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(FactionHistory::from))
    }

    /// Append one history snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn append_history(&self, row: &FactionHistory) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO faction_history (id, faction_id, faction_name_lower, system, system_lower,
                  state, influence, happiness, active_states, pending_states, recovering_states,
                  updated_at, updated_by)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(row.id.into_inner())
        .bind(row.faction_id.into_inner())
        .bind(&row.faction_name_lower)
        .bind(&row.system)
        .bind(&row.system_lower)
        .bind(&row.state)
        .bind(row.influence)
        .bind(&row.happiness)
        .bind(Json(&row.active_states))
        .bind(Json(&row.pending_states))
        .bind(Json(&row.recovering_states))
        .bind(row.updated_at)
        .bind(&row.updated_by)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Number of factions matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count(&self, filter: &FactionFilter) -> Result<u64, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM factions f WHERE TRUE");
        push_filter(&mut qb, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// One page of factions matching `filter`, each presence enriched with
    /// its system's id and, when `system_details` is set, the full system
    /// document.
    ///
    /// The system join is by name only and ignores the outer filter, so
    /// every presence is resolved even when `filter.systems` matched just
    /// one of them.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::Serialization`] if a joined system row cannot be decoded.
    pub async fn list(
        &self,
        filter: &FactionFilter,
        offset: u64,
        limit: u32,
        system_details: bool,
    ) -> Result<Vec<FactionView>, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "WITH page AS (SELECT f.id, f.name, f.name_lower, f.government, f.allegiance, \
             f.updated_at, f.updated_by FROM factions f WHERE TRUE",
        );
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY f.name_lower, f.id LIMIT ");
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
        qb.push(
            ") SELECT page.id, page.name, page.name_lower, page.government, page.allegiance, \
             page.updated_at, page.updated_by, \
             p.system_name, p.system_name_lower, p.state, p.influence, p.happiness, \
             p.active_states, p.pending_states, p.recovering_states, \
             p.updated_at AS presence_updated_at, \
             s.id AS system_id, \
             CASE WHEN ",
        );
        qb.push_bind(system_details);
        qb.push(
            "::BOOLEAN AND s.id IS NOT NULL THEN to_jsonb(s) END AS system_details \
             FROM page \
             LEFT JOIN faction_presences p ON p.faction_id = page.id \
             LEFT JOIN systems s ON s.name_lower = p.system_name_lower \
             ORDER BY page.name_lower, page.id, p.system_name_lower",
        );

        let rows: Vec<FactionPageRow> = qb.build_query_as().fetch_all(self.pool).await?;
        group_page(rows)
    }

    /// History of one faction restricted to `systems`, under `mode`.
    ///
    /// Latest-N applies per system: at most `count` rows for each
    /// faction-system pair, newest first overall.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn history(
        &self,
        id: FactionId,
        systems: &[String],
        mode: HistoryMode,
    ) -> Result<Vec<FactionHistory>, DbError> {
        if systems.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new("");
        match mode {
            HistoryMode::Window { from, to } => {
                qb.push(format!(
                    "SELECT {HISTORY_COLUMNS} FROM faction_history WHERE faction_id = "
                ));
                qb.push_bind(id.into_inner());
                qb.push(" AND system_lower = ANY(");
                qb.push_bind(systems.to_vec());
                qb.push(") AND updated_at BETWEEN ");
                qb.push_bind(from);
                qb.push(" AND ");
                qb.push_bind(to);
                qb.push(" ORDER BY updated_at ASC, id ASC");
            }
            HistoryMode::Latest { count } => {
                qb.push(format!(
                    "SELECT {HISTORY_COLUMNS} FROM (SELECT h.*, ROW_NUMBER() OVER \
                     (PARTITION BY h.system_lower ORDER BY h.updated_at DESC, h.id DESC) AS rn \
                     FROM faction_history h WHERE h.faction_id = "
                ));
                qb.push_bind(id.into_inner());
                qb.push(" AND h.system_lower = ANY(");
                qb.push_bind(systems.to_vec());
                qb.push(")) ranked WHERE rn <= ");
                qb.push_bind(i64::from(count));
                qb.push(" ORDER BY updated_at DESC, id DESC");
            }
        }
        let rows: Vec<FactionHistoryRow> = qb.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(FactionHistory::from).collect())
    }
}

/// Append the populated filter slots as predicates on alias `f`.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &FactionFilter) {
    push_any_uuid(
        qb,
        "f.id",
        filter.ids.iter().copied().map(FactionId::into_inner).collect(),
    );
    push_any_text(qb, "f.name_lower", &filter.names);
    push_any_text(qb, "f.allegiance", &filter.allegiances);
    push_any_text(qb, "f.government", &filter.governments);
    push_prefix(qb, "f.name_lower", filter.begins_with.as_deref());

    if !filter.systems.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM faction_presences fp \
             WHERE fp.faction_id = f.id AND fp.system_name_lower = ANY(",
        );
        qb.push_bind(filter.systems.clone());
        qb.push("))");
    }

    for (column, states) in [
        ("active_states", &filter.active_states),
        ("pending_states", &filter.pending_states),
        ("recovering_states", &filter.recovering_states),
    ] {
        if states.is_empty() {
            continue;
        }
        qb.push(format!(
            " AND EXISTS (SELECT 1 FROM faction_presences fp, jsonb_array_elements(fp.{column}) st \
             WHERE fp.faction_id = f.id AND st->>'state' = ANY("
        ));
        qb.push_bind(states.clone());
        qb.push("))");
    }
}

/// Fold joined page rows (one per presence) back into faction views,
/// preserving row order.
fn group_page(rows: Vec<FactionPageRow>) -> Result<Vec<FactionView>, DbError> {
    let mut views: Vec<FactionView> = Vec::new();
    for row in rows {
        let presence = row.presence()?;
        let id = FactionId::from(row.id);
        let is_same = views.last().is_some_and(|last| last.id == id);
        if !is_same {
            views.push(FactionView {
                id,
                name: row.name,
                name_lower: row.name_lower,
                government: row.government,
                allegiance: row.allegiance,
                faction_presence: Some(Vec::new()),
                updated_at: row.updated_at,
                updated_by: row.updated_by,
                history: None,
            });
        }
        if let Some(presence) = presence
            && let Some(view) = views.last_mut()
            && let Some(list) = view.faction_presence.as_mut()
        {
            list.push(presence);
        }
    }
    Ok(views)
}

/// A row from the `factions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FactionRow {
    id: Uuid,
    name: String,
    name_lower: String,
    government: Option<String>,
    allegiance: Option<String>,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

/// A row from the `faction_presences` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PresenceRow {
    system_name: String,
    system_name_lower: String,
    state: Option<String>,
    influence: Decimal,
    happiness: Option<String>,
    active_states: Json<Vec<ActiveState>>,
    pending_states: Json<Vec<TrendingState>>,
    recovering_states: Json<Vec<TrendingState>>,
    updated_at: DateTime<Utc>,
}

impl From<PresenceRow> for FactionPresence {
    fn from(row: PresenceRow) -> Self {
        Self {
            system_name: row.system_name,
            system_name_lower: row.system_name_lower,
            state: row.state,
            influence: row.influence,
            happiness: row.happiness,
            active_states: row.active_states.0,
            pending_states: row.pending_states.0,
            recovering_states: row.recovering_states.0,
            updated_at: row.updated_at,
        }
    }
}

/// One row of the enriched page query: a faction joined with one of its
/// presences (absent for factions without presences) and that presence's
/// system.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FactionPageRow {
    id: Uuid,
    name: String,
    name_lower: String,
    government: Option<String>,
    allegiance: Option<String>,
    updated_at: DateTime<Utc>,
    updated_by: String,
    system_name: Option<String>,
    system_name_lower: Option<String>,
    state: Option<String>,
    influence: Option<Decimal>,
    happiness: Option<String>,
    active_states: Option<Json<Vec<ActiveState>>>,
    pending_states: Option<Json<Vec<TrendingState>>>,
    recovering_states: Option<Json<Vec<TrendingState>>>,
    presence_updated_at: Option<DateTime<Utc>>,
    system_id: Option<Uuid>,
    system_details: Option<serde_json::Value>,
}

impl FactionPageRow {
    /// The enriched presence carried by this row, if the join produced one.
    fn presence(&self) -> Result<Option<PresenceView>, DbError> {
        let (Some(system_name), Some(system_name_lower), Some(influence), Some(updated_at)) = (
            self.system_name.clone(),
            self.system_name_lower.clone(),
            self.influence,
            self.presence_updated_at,
        ) else {
            return Ok(None);
        };
        let system_details = self
            .system_details
            .clone()
            .map(serde_json::from_value::<SystemDoc>)
            .transpose()?;
        Ok(Some(PresenceView {
            presence: FactionPresence {
                system_name,
                system_name_lower,
                state: self.state.clone(),
                influence,
                happiness: self.happiness.clone(),
                active_states: self
                    .active_states
                    .clone()
                    .map(|j| j.0)
                    .unwrap_or_default(),
                pending_states: self
                    .pending_states
                    .clone()
                    .map(|j| j.0)
                    .unwrap_or_default(),
                recovering_states: self
                    .recovering_states
                    .clone()
                    .map(|j| j.0)
                    .unwrap_or_default(),
                updated_at,
            },
            system_id: self.system_id.map(Into::into),
            system_details,
        }))
    }
}

/// A row from the `faction_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FactionHistoryRow {
    id: Uuid,
    faction_id: Uuid,
    faction_name_lower: String,
    system: String,
    system_lower: String,
    state: Option<String>,
    influence: Decimal,
    happiness: Option<String>,
    active_states: Json<Vec<ActiveState>>,
    pending_states: Json<Vec<TrendingState>>,
    recovering_states: Json<Vec<TrendingState>>,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl From<FactionHistoryRow> for FactionHistory {
    fn from(row: FactionHistoryRow) -> Self {
        Self {
            id: row.id.into(),
            faction_id: row.faction_id.into(),
            faction_name_lower: row.faction_name_lower,
            system: row.system,
            system_lower: row.system_lower,
            state: row.state,
            influence: row.influence,
            happiness: row.happiness,
            active_states: row.active_states.0,
            pending_states: row.pending_states.0,
            recovering_states: row.recovering_states.0,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}
