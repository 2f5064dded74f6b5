//! Shared command context
//!
//! Loads the configuration once and opens the store, shared cache and sync
//! service on demand. Commands that only touch the filesystem or the
//! configuration never open the database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use ifcbdb_core::config::{Config, ConfigBuilder};
use ifcbdb_core::domain::{Dataset, DatasetId};
use ifcbdb_core::ports::{IDatasetStore, ISharedCache};
use ifcbdb_store::{DatabasePool, SqliteCache, SqliteDatasetStore};
use ifcbdb_sync::{MemoryCache, SyncService, TokioTaskRuntime};
use tracing::{debug, info};

/// Configuration plus where it came from
pub struct CliContext {
    config: Config,
    config_path: PathBuf,
}

impl CliContext {
    /// Loads the configuration
    ///
    /// An explicit `--config` file must exist and parse; the default file
    /// falls back to built-in defaults when missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config, config_path) = match path {
            Some(path) => {
                let config = Config::load(path)
                    .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
                (config, path.to_path_buf())
            }
            None => {
                let path = Config::default_path();
                (Config::load_or_default(&path), path)
            }
        };
        Ok(Self {
            config,
            config_path,
        })
    }

    /// Points the context at another database file
    pub fn with_database(mut self, path: PathBuf) -> Self {
        self.config = ConfigBuilder::from_config(self.config)
            .database_path(path)
            .build();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Opens the database and wires the sync service over it
    pub async fn connect(&self) -> Result<Backend> {
        let pool = DatabasePool::from_config(&self.config.database)
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteDatasetStore::new(pool.pool().clone()));

        let cache: Arc<dyn ISharedCache> = match self.config.cache.backend.as_str() {
            "memory" => Arc::new(MemoryCache::new()),
            _ => {
                let cache = SqliteCache::new(pool.pool().clone());
                let purged = cache
                    .purge_expired()
                    .await
                    .context("Failed to purge expired cache entries")?;
                debug!(purged, "Shared cache ready");
                Arc::new(cache)
            }
        };

        let runtime = TokioTaskRuntime::new().with_retention(self.config.cache.task_handle_ttl());
        let service = SyncService::new(store.clone(), cache, Arc::new(runtime), &self.config);

        info!(
            database = %self.config.database.path.display(),
            cache = %self.config.cache.backend,
            "Connected"
        );
        Ok(Backend { store, service })
    }
}

/// Open store and sync service
pub struct Backend {
    pub store: Arc<SqliteDatasetStore>,
    pub service: SyncService,
}

impl Backend {
    /// Finds a dataset by name, or by id when no name matches
    pub async fn dataset(&self, name_or_id: &str) -> Result<Dataset> {
        if let Some(dataset) = self
            .store
            .get_dataset_by_name(name_or_id)
            .await
            .context("Failed to query dataset")?
        {
            return Ok(dataset);
        }

        if let Ok(id) = name_or_id.parse::<DatasetId>() {
            if let Some(dataset) = self
                .store
                .get_dataset(&id)
                .await
                .context("Failed to query dataset")?
            {
                return Ok(dataset);
            }
        }

        anyhow::bail!("No dataset named '{}'", name_or_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(CliContext::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_explicit_config_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "sync:\n  batch_size: 7\n").unwrap();

        let ctx = CliContext::load(Some(&path)).unwrap();
        assert_eq!(ctx.config().sync.batch_size, 7);
        assert_eq!(ctx.config_path(), path.as_path());
    }

    #[test]
    fn test_database_override_keeps_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "sync:\n  batch_size: 7\n").unwrap();

        let db = dir.path().join("other.db");
        let ctx = CliContext::load(Some(&path)).unwrap().with_database(db.clone());
        assert_eq!(ctx.config().database.path, db);
        assert_eq!(ctx.config().sync.batch_size, 7);
    }

    #[tokio::test]
    async fn test_dataset_lookup_by_name_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let db = dir.path().join("ifcbdb.db");
        std::fs::write(&path, format!("database:\n  path: {}\n", db.display())).unwrap();

        let backend = CliContext::load(Some(&path)).unwrap().connect().await.unwrap();
        let dataset = Dataset::new("mvco", "Martha's Vineyard").unwrap();
        backend.store.save_dataset(&dataset).await.unwrap();

        assert_eq!(backend.dataset("mvco").await.unwrap().id(), dataset.id());
        let by_id = backend.dataset(&dataset.id().to_string()).await.unwrap();
        assert_eq!(by_id.name(), "mvco");
        assert!(backend.dataset("other").await.is_err());
    }
}
