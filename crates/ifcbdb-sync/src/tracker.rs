//! Dataset to task mapping
//!
//! The tracker remembers which task is syncing a dataset so callers can poll
//! by dataset id. The mapping is a short-lived shared-cache entry keyed
//! `dataset_sync_task_<dataset id>`; a new sync overwrites it.
//!
//! A missing mapping is reported as `PENDING`: it cannot be told apart from
//! "never synced", "expired" or "about to start".

use std::sync::Arc;
use std::time::Duration;

use ifcbdb_core::domain::{DatasetId, TaskId, TaskStatus};
use ifcbdb_core::ports::{ISharedCache, ITaskRuntime};
use tracing::{debug, warn};

pub const TASK_KEY_PREFIX: &str = "dataset_sync_task_";

/// Cache key of a dataset's task handle
pub fn task_key(dataset_id: &DatasetId) -> String {
    format!("{TASK_KEY_PREFIX}{dataset_id}")
}

/// Maps datasets to their in-flight sync task
#[derive(Clone)]
pub struct TaskStatusTracker {
    cache: Arc<dyn ISharedCache>,
    runtime: Arc<dyn ITaskRuntime>,
    ttl: Duration,
}

impl TaskStatusTracker {
    pub fn new(cache: Arc<dyn ISharedCache>, runtime: Arc<dyn ITaskRuntime>, ttl: Duration) -> Self {
        Self { cache, runtime, ttl }
    }

    /// Stores the task handle of a dataset, replacing any previous one
    pub async fn record(&self, dataset_id: &DatasetId, task_id: &TaskId) -> anyhow::Result<()> {
        self.cache
            .set(&task_key(dataset_id), &task_id.to_string(), Some(self.ttl))
            .await?;
        debug!(dataset_id = %dataset_id, task_id = %task_id, "Recorded sync task");
        Ok(())
    }

    /// Drops a dataset's task handle so its status reads `PENDING`
    pub async fn forget(&self, dataset_id: &DatasetId) -> anyhow::Result<()> {
        self.cache.delete(&task_key(dataset_id)).await?;
        Ok(())
    }

    /// Task currently mapped to a dataset
    pub async fn lookup(&self, dataset_id: &DatasetId) -> anyhow::Result<Option<TaskId>> {
        let Some(value) = self.cache.get(&task_key(dataset_id)).await? else {
            return Ok(None);
        };
        match value.parse::<TaskId>() {
            Ok(task_id) => Ok(Some(task_id)),
            Err(e) => {
                warn!(dataset_id = %dataset_id, value = %value, error = %e, "Ignoring corrupt task handle");
                Ok(None)
            }
        }
    }

    pub async fn status(&self, task_id: &TaskId) -> anyhow::Result<TaskStatus> {
        self.runtime.status(task_id).await
    }

    /// Status of a dataset's latest sync; `PENDING` when nothing is mapped
    pub async fn dataset_status(&self, dataset_id: &DatasetId) -> anyhow::Result<TaskStatus> {
        match self.lookup(dataset_id).await? {
            Some(task_id) => self.status(&task_id).await,
            None => Ok(TaskStatus::pending()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryCache, TokioTaskRuntime};
    use ifcbdb_core::domain::TaskState;

    fn tracker() -> (TaskStatusTracker, Arc<MemoryCache>, Arc<TokioTaskRuntime>) {
        let cache = Arc::new(MemoryCache::new());
        let runtime = Arc::new(TokioTaskRuntime::new());
        let tracker = TaskStatusTracker::new(cache.clone(), runtime.clone(), Duration::from_secs(60));
        (tracker, cache, runtime)
    }

    #[tokio::test]
    async fn test_absent_mapping_is_pending() {
        let (tracker, _, _) = tracker();
        let dataset = DatasetId::new();
        assert!(tracker.lookup(&dataset).await.unwrap().is_none());
        assert_eq!(
            tracker.dataset_status(&dataset).await.unwrap(),
            TaskStatus::pending()
        );
    }

    #[tokio::test]
    async fn test_record_then_lookup() {
        let (tracker, _, _) = tracker();
        let dataset = DatasetId::new();
        let first = TaskId::new();
        let second = TaskId::new();

        tracker.record(&dataset, &first).await.unwrap();
        assert_eq!(tracker.lookup(&dataset).await.unwrap(), Some(first));

        tracker.record(&dataset, &second).await.unwrap();
        assert_eq!(tracker.lookup(&dataset).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_corrupt_handle_reads_as_absent() {
        let (tracker, cache, _) = tracker();
        let dataset = DatasetId::new();
        cache.set(&task_key(&dataset), "not-a-uuid", None).await.unwrap();
        assert!(tracker.lookup(&dataset).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dataset_status_follows_task() {
        let (tracker, _, runtime) = tracker();
        let dataset = DatasetId::new();
        let task_id = runtime
            .schedule("sync", Box::pin(async { Ok(serde_json::json!("done")) }))
            .await
            .unwrap();
        tracker.record(&dataset, &task_id).await.unwrap();

        for _ in 0..200 {
            let status = tracker.dataset_status(&dataset).await.unwrap();
            if status.state == TaskState::Succeeded {
                assert_eq!(status.info, Some(serde_json::json!("done")));
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task never reported SUCCEEDED");
    }

    #[tokio::test]
    async fn test_forget_clears_mapping() {
        let (tracker, _cache, _runtime) = tracker();
        let dataset_id = DatasetId::new();
        tracker.record(&dataset_id, &TaskId::new()).await.unwrap();

        tracker.forget(&dataset_id).await.unwrap();
        assert!(tracker.lookup(&dataset_id).await.unwrap().is_none());
        // forgetting an absent mapping is fine
        tracker.forget(&dataset_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_handle_is_pending() {
        let cache = Arc::new(MemoryCache::new());
        let runtime = Arc::new(TokioTaskRuntime::new());
        let tracker = TaskStatusTracker::new(cache, runtime, Duration::from_millis(10));
        let dataset = DatasetId::new();

        tracker.record(&dataset, &TaskId::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(tracker.lookup(&dataset).await.unwrap().is_none());
    }
}
