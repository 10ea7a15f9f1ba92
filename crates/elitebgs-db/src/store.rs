//! The document store capability used by the reconciler and query engine.
//!
//! [`StateStore`] dispatches every operation to either the `PostgreSQL`
//! stores or the [`MemoryStore`]. Callers never see which one is active.

use chrono::{DateTime, Utc};
use elitebgs_types::{
    FactionDoc, FactionFilter, FactionHistory, FactionId, FactionView, HistoryMode, StationDoc,
    StationFilter, StationHistory, StationId, SystemDoc, SystemFilter, SystemHistory, SystemId,
};

use crate::error::DbError;
use crate::faction_store::FactionStore;
use crate::memory::MemoryStore;
use crate::postgres::PostgresPool;
use crate::station_store::StationStore;
use crate::system_store::SystemStore;

/// A document store backend.
#[derive(Debug, Clone)]
pub enum StateStore {
    /// Durable `PostgreSQL` storage.
    Postgres(PostgresPool),
    /// Process-local storage.
    Memory(MemoryStore),
}

impl StateStore {
    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Check that the backend can serve requests.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the database is unreachable.
    pub async fn ping(&self) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => pg.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Systems
    // -----------------------------------------------------------------------

    /// Load a system by lower-cased name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn find_system(&self, name_lower: &str) -> Result<Option<SystemDoc>, DbError> {
        match self {
            Self::Postgres(pg) => SystemStore::new(pg.pool()).find(name_lower).await,
            Self::Memory(mem) => Ok(mem.find_system(name_lower).await),
        }
    }

    /// Insert or overwrite a system document.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn save_system(&self, doc: &SystemDoc) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => SystemStore::new(pg.pool()).save(doc).await,
            Self::Memory(mem) => {
                mem.save_system(doc).await;
                Ok(())
            }
        }
    }

    /// Refresh a system's `updated_at` and `updated_by` only.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn touch_system(
        &self,
        id: SystemId,
        updated_at: DateTime<Utc>,
        updated_by: &str,
    ) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => {
                SystemStore::new(pg.pool())
                    .touch(id, updated_at, updated_by)
                    .await
            }
            Self::Memory(mem) => {
                mem.touch_system(id, updated_at, updated_by).await;
                Ok(())
            }
        }
    }

    /// Most recent history snapshot of a system.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn latest_system_history(
        &self,
        id: SystemId,
    ) -> Result<Option<SystemHistory>, DbError> {
        match self {
            Self::Postgres(pg) => SystemStore::new(pg.pool()).latest_history(id).await,
            Self::Memory(mem) => Ok(mem.latest_system_history(id).await),
        }
    }

    /// Append a system history snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn append_system_history(&self, row: &SystemHistory) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => SystemStore::new(pg.pool()).append_history(row).await,
            Self::Memory(mem) => {
                mem.append_system_history(row).await;
                Ok(())
            }
        }
    }

    /// Number of systems matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn count_systems(&self, filter: &SystemFilter) -> Result<u64, DbError> {
        match self {
            Self::Postgres(pg) => SystemStore::new(pg.pool()).count(filter).await,
            Self::Memory(mem) => Ok(mem.count_systems(filter).await),
        }
    }

    /// One page of systems matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn list_systems(
        &self,
        filter: &SystemFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<SystemDoc>, DbError> {
        match self {
            Self::Postgres(pg) => SystemStore::new(pg.pool()).list(filter, offset, limit).await,
            Self::Memory(mem) => Ok(mem.list_systems(filter, offset, limit).await),
        }
    }

    /// History of one system under `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn system_history(
        &self,
        id: SystemId,
        mode: HistoryMode,
    ) -> Result<Vec<SystemHistory>, DbError> {
        match self {
            Self::Postgres(pg) => SystemStore::new(pg.pool()).history(id, mode).await,
            Self::Memory(mem) => Ok(mem.system_history(id, mode).await),
        }
    }

    // -----------------------------------------------------------------------
    // Factions
    // -----------------------------------------------------------------------

    /// Load a faction with its presences by lower-cased name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn find_faction(&self, name_lower: &str) -> Result<Option<FactionDoc>, DbError> {
        match self {
            Self::Postgres(pg) => FactionStore::new(pg.pool()).find(name_lower).await,
            Self::Memory(mem) => Ok(mem.find_faction(name_lower).await),
        }
    }

    /// Upsert a faction and the presences it carries.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn save_faction(&self, doc: &FactionDoc) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => FactionStore::new(pg.pool()).save(doc).await,
            Self::Memory(mem) => {
                mem.save_faction(doc).await;
                Ok(())
            }
        }
    }

    /// Most recent history snapshot of one faction presence.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn latest_faction_history(
        &self,
        id: FactionId,
        system_lower: &str,
    ) -> Result<Option<FactionHistory>, DbError> {
        match self {
            Self::Postgres(pg) => {
                FactionStore::new(pg.pool())
                    .latest_history(id, system_lower)
                    .await
            }
            Self::Memory(mem) => Ok(mem.latest_faction_history(id, system_lower).await),
        }
    }

    /// Append a faction history snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn append_faction_history(&self, row: &FactionHistory) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => FactionStore::new(pg.pool()).append_history(row).await,
            Self::Memory(mem) => {
                mem.append_faction_history(row).await;
                Ok(())
            }
        }
    }

    /// Number of factions matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn count_factions(&self, filter: &FactionFilter) -> Result<u64, DbError> {
        match self {
            Self::Postgres(pg) => FactionStore::new(pg.pool()).count(filter).await,
            Self::Memory(mem) => Ok(mem.count_factions(filter).await),
        }
    }

    /// One page of factions matching `filter`, with enriched presences.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn list_factions(
        &self,
        filter: &FactionFilter,
        offset: u64,
        limit: u32,
        system_details: bool,
    ) -> Result<Vec<FactionView>, DbError> {
        match self {
            Self::Postgres(pg) => {
                FactionStore::new(pg.pool())
                    .list(filter, offset, limit, system_details)
                    .await
            }
            Self::Memory(mem) => Ok(mem
                .list_factions(filter, offset, limit, system_details)
                .await),
        }
    }

    /// History of one faction over `systems` under `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn faction_history(
        &self,
        id: FactionId,
        systems: &[String],
        mode: HistoryMode,
    ) -> Result<Vec<FactionHistory>, DbError> {
        match self {
            Self::Postgres(pg) => {
                FactionStore::new(pg.pool())
                    .history(id, systems, mode)
                    .await
            }
            Self::Memory(mem) => Ok(mem.faction_history(id, systems, mode).await),
        }
    }

    // -----------------------------------------------------------------------
    // Stations
    // -----------------------------------------------------------------------

    /// Load a station by market id, or by name within its system.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn find_station(
        &self,
        market_id: Option<i64>,
        name_lower: &str,
        system_lower: &str,
    ) -> Result<Option<StationDoc>, DbError> {
        match self {
            Self::Postgres(pg) => {
                StationStore::new(pg.pool())
                    .find(market_id, name_lower, system_lower)
                    .await
            }
            Self::Memory(mem) => Ok(mem.find_station(market_id, name_lower, system_lower).await),
        }
    }

    /// Insert or overwrite a station document.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn save_station(&self, doc: &StationDoc) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => StationStore::new(pg.pool()).save(doc).await,
            Self::Memory(mem) => {
                mem.save_station(doc).await;
                Ok(())
            }
        }
    }

    /// Refresh a station's `updated_at` and `updated_by` only.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn touch_station(
        &self,
        id: StationId,
        updated_at: DateTime<Utc>,
        updated_by: &str,
    ) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => {
                StationStore::new(pg.pool())
                    .touch(id, updated_at, updated_by)
                    .await
            }
            Self::Memory(mem) => {
                mem.touch_station(id, updated_at, updated_by).await;
                Ok(())
            }
        }
    }

    /// Most recent history snapshot of a station.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn latest_station_history(
        &self,
        id: StationId,
    ) -> Result<Option<StationHistory>, DbError> {
        match self {
            Self::Postgres(pg) => StationStore::new(pg.pool()).latest_history(id).await,
            Self::Memory(mem) => Ok(mem.latest_station_history(id).await),
        }
    }

    /// Append a station history snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn append_station_history(&self, row: &StationHistory) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => StationStore::new(pg.pool()).append_history(row).await,
            Self::Memory(mem) => {
                mem.append_station_history(row).await;
                Ok(())
            }
        }
    }

    /// Number of stations matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn count_stations(&self, filter: &StationFilter) -> Result<u64, DbError> {
        match self {
            Self::Postgres(pg) => StationStore::new(pg.pool()).count(filter).await,
            Self::Memory(mem) => Ok(mem.count_stations(filter).await),
        }
    }

    /// One page of stations matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn list_stations(
        &self,
        filter: &StationFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<StationDoc>, DbError> {
        match self {
            Self::Postgres(pg) => StationStore::new(pg.pool()).list(filter, offset, limit).await,
            Self::Memory(mem) => Ok(mem.list_stations(filter, offset, limit).await),
        }
    }

    /// History of one station under `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend query fails.
    pub async fn station_history(
        &self,
        id: StationId,
        mode: HistoryMode,
    ) -> Result<Vec<StationHistory>, DbError> {
        match self {
            Self::Postgres(pg) => StationStore::new(pg.pool()).history(id, mode).await,
            Self::Memory(mem) => Ok(mem.station_history(id, mode).await),
        }
    }
}

impl From<PostgresPool> for StateStore {
    fn from(pool: PostgresPool) -> Self {
        Self::Postgres(pool)
    }
}

impl From<MemoryStore> for StateStore {
    fn from(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}
