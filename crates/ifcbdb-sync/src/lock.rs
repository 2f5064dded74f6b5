//! Per-dataset sync lock
//!
//! The lock is a shared-cache entry keyed `sync_lock_<dataset id>`.
//! Acquisition is a single atomic set-if-absent, so a caller that loses the
//! race is told immediately instead of waiting. The entry's value is the
//! acquisition time.
//!
//! [`SyncLockManager::try_lock`] hands out a [`SyncLockGuard`]. Releasing the
//! guard explicitly is the normal path; a guard dropped without release
//! (panic, aborted task) schedules the delete on the current tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use ifcbdb_core::domain::DatasetId;
use ifcbdb_core::ports::ISharedCache;
use tracing::{debug, info, warn};

pub const LOCK_KEY_PREFIX: &str = "sync_lock_";

/// Cache key of a dataset's sync lock
pub fn lock_key(dataset_id: &DatasetId) -> String {
    format!("{LOCK_KEY_PREFIX}{dataset_id}")
}

/// Acquires and releases per-dataset sync locks
#[derive(Clone)]
pub struct SyncLockManager {
    cache: Arc<dyn ISharedCache>,
    ttl: Option<Duration>,
}

impl SyncLockManager {
    /// Creates a manager whose locks never expire on their own
    pub fn new(cache: Arc<dyn ISharedCache>) -> Self {
        Self { cache, ttl: None }
    }

    /// Sets an expiry after which an unreleased lock disappears
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Attempts to take the lock; true if this caller obtained it
    pub async fn acquire(&self, dataset_id: &DatasetId) -> anyhow::Result<bool> {
        let acquired_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let acquired = self
            .cache
            .add(&lock_key(dataset_id), &acquired_at, self.ttl)
            .await?;

        debug!(dataset_id = %dataset_id, acquired, "Sync lock acquisition");
        Ok(acquired)
    }

    /// Deletes the lock unconditionally
    pub async fn release(&self, dataset_id: &DatasetId) -> anyhow::Result<()> {
        let removed = self.cache.delete(&lock_key(dataset_id)).await?;
        debug!(dataset_id = %dataset_id, removed, "Sync lock released");
        Ok(())
    }

    /// Takes the lock and returns a guard that owns it
    pub async fn try_lock(&self, dataset_id: &DatasetId) -> anyhow::Result<Option<SyncLockGuard>> {
        if !self.acquire(dataset_id).await? {
            return Ok(None);
        }
        Ok(Some(SyncLockGuard {
            manager: self.clone(),
            dataset_id: *dataset_id,
            released: false,
        }))
    }

    /// When the current holder took the lock, if it is held
    pub async fn held_since(&self, dataset_id: &DatasetId) -> anyhow::Result<Option<DateTime<Utc>>> {
        let Some(value) = self.cache.get(&lock_key(dataset_id)).await? else {
            return Ok(None);
        };
        // A value we cannot parse still means the lock is held
        let since = DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(Some(since))
    }

    /// Removes a lock left behind by a crashed process
    pub async fn force_release(&self, dataset_id: &DatasetId) -> anyhow::Result<bool> {
        let removed = self.cache.delete(&lock_key(dataset_id)).await?;
        if removed {
            info!(dataset_id = %dataset_id, "Sync lock force-released");
        }
        Ok(removed)
    }
}

/// Scoped ownership of a dataset's sync lock
pub struct SyncLockGuard {
    manager: SyncLockManager,
    dataset_id: DatasetId,
    released: bool,
}

impl SyncLockGuard {
    pub fn dataset_id(&self) -> &DatasetId {
        &self.dataset_id
    }

    /// Releases the lock
    pub async fn release(mut self) -> anyhow::Result<()> {
        self.released = true;
        self.manager.release(&self.dataset_id).await
    }
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let dataset_id = self.dataset_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(dataset_id = %dataset_id, "Sync lock dropped without release; releasing");
                let manager = self.manager.clone();
                handle.spawn(async move {
                    if let Err(e) = manager.release(&dataset_id).await {
                        warn!(dataset_id = %dataset_id, error = %e, "Deferred lock release failed");
                    }
                });
            }
            Err(_) => {
                warn!(dataset_id = %dataset_id, "Sync lock leaked: no runtime to release it");
            }
        }
    }
}

impl std::fmt::Debug for SyncLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLockGuard")
            .field("dataset_id", &self.dataset_id)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_cache::MemoryCache;

    fn manager() -> SyncLockManager {
        SyncLockManager::new(Arc::new(MemoryCache::new()))
    }

    #[test]
    fn test_lock_key_format() {
        let id = DatasetId::new();
        assert_eq!(lock_key(&id), format!("sync_lock_{id}"));
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let locks = manager();
        let id = DatasetId::new();
        assert!(locks.acquire(&id).await.unwrap());
        assert!(!locks.acquire(&id).await.unwrap());

        locks.release(&id).await.unwrap();
        assert!(locks.acquire(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_locks_are_per_dataset() {
        let locks = manager();
        assert!(locks.acquire(&DatasetId::new()).await.unwrap());
        assert!(locks.acquire(&DatasetId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_is_unconditional() {
        let locks = manager();
        // releasing a lock nobody holds is fine
        locks.release(&DatasetId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_guard_release() {
        let locks = manager();
        let id = DatasetId::new();
        let guard = locks.try_lock(&id).await.unwrap().unwrap();
        assert!(locks.try_lock(&id).await.unwrap().is_none());
        assert!(locks.held_since(&id).await.unwrap().is_some());

        guard.release().await.unwrap();
        assert!(locks.held_since(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_lock() {
        let locks = manager();
        let id = DatasetId::new();
        {
            let _guard = locks.try_lock(&id).await.unwrap().unwrap();
        }
        // the release runs on a spawned task
        for _ in 0..50 {
            if locks.held_since(&id).await.unwrap().is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("lock was not released after the guard was dropped");
    }

    #[tokio::test]
    async fn test_lock_ttl_expires() {
        let locks = manager().with_ttl(Some(Duration::from_millis(20)));
        let id = DatasetId::new();
        assert!(locks.acquire(&id).await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(locks.acquire(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_force_release() {
        let locks = manager();
        let id = DatasetId::new();
        assert!(!locks.force_release(&id).await.unwrap());
        locks.acquire(&id).await.unwrap();
        assert!(locks.force_release(&id).await.unwrap());
    }
}
