//! Process bootstrap shared by the listener and the API binaries.

use std::path::PathBuf;
use std::time::Duration;

use elitebgs_db::{DbError, MemoryStore, PostgresConfig, PostgresPool, StateStore};

use crate::config::{ConfigError, InfrastructureConfig, StoreBackend, TrackerConfig};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "ELITEBGS_CONFIG";

/// Configuration file read when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "elitebgs-config.yaml";

/// Resolve the configuration path from the environment.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load the configuration file, falling back to defaults when absent.
/// Environment overrides are applied by the loader.
pub fn load_config() -> Result<TrackerConfig, ConfigError> {
    TrackerConfig::load(&config_path())
}

/// Open the configured state store.
///
/// The PostgreSQL backend runs pending migrations before returning.
pub async fn open_store(config: &InfrastructureConfig) -> Result<StateStore, DbError> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory state store; data is lost on exit");
            Ok(StateStore::from(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pg_config = PostgresConfig::new(&config.database_url)
                .with_max_connections(config.max_connections)
                .with_connect_timeout(Duration::from_secs(10));
            let pool = PostgresPool::connect(&pg_config).await?;
            pool.run_migrations().await?;
            Ok(StateStore::from(pool))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_opens_without_infrastructure() {
        let config = InfrastructureConfig {
            store: StoreBackend::Memory,
            ..InfrastructureConfig::default()
        };
        let store = open_store(&config).await;
        assert_eq!(store.as_ref().map(StateStore::name).ok(), Some("memory"));
        assert!(matches!(store, Ok(ref s) if s.ping().await.is_ok()));
    }
}
