//! Sync service
//!
//! Entry points the outer surface calls:
//!
//! 1. [`SyncService::request_sync`] takes the dataset lock, schedules the
//!    executor on the task runtime, records the task handle and returns
//!    without waiting. A held lock answers `LOCKED`.
//! 2. [`SyncService::sync_status`] reports the state of the dataset's latest
//!    sync and never blocks.
//!
//! The scheduled job owns the [`SyncLockGuard`](crate::SyncLockGuard) and
//! releases it on every exit path: explicitly after the executor returns,
//! through the guard's `Drop` if the job panics or is aborted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ifcbdb_core::config::Config;
use ifcbdb_core::domain::{DatasetId, SyncState, TaskId, TaskStatus};
use ifcbdb_core::ports::{BoxedJob, IDatasetStore, ISharedCache, ITaskRuntime};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    executor::{SyncExecutor, SyncOptions},
    lock::SyncLockManager,
    tracker::TaskStatusTracker,
    SyncError,
};

/// Answer to [`SyncService::request_sync`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRequest {
    pub state: SyncState,
    /// Id of the scheduled task; absent when the dataset was locked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

/// Schedules dataset synchronizations and reports on them
pub struct SyncService {
    store: Arc<dyn IDatasetStore>,
    locks: SyncLockManager,
    tracker: TaskStatusTracker,
    runtime: Arc<dyn ITaskRuntime>,
    executor: Arc<SyncExecutor>,
    shutdown: CancellationToken,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn IDatasetStore>,
        cache: Arc<dyn ISharedCache>,
        runtime: Arc<dyn ITaskRuntime>,
        config: &Config,
    ) -> Self {
        let locks = SyncLockManager::new(cache.clone()).with_ttl(config.sync.lock_ttl());
        let tracker =
            TaskStatusTracker::new(cache, runtime.clone(), config.cache.task_handle_ttl());
        let executor = Arc::new(SyncExecutor::new(
            store.clone(),
            SyncOptions::from_config(config),
        ));

        Self {
            store,
            locks,
            tracker,
            runtime,
            executor,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn locks(&self) -> &SyncLockManager {
        &self.locks
    }

    pub fn tracker(&self) -> &TaskStatusTracker {
        &self.tracker
    }

    /// Requests a sync of `dataset_id`
    ///
    /// # Errors
    ///
    /// [`SyncError::DatasetNotFound`] for an unknown dataset, or a backend
    /// error from the store, cache or runtime. Lock contention is not an
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn request_sync(&self, dataset_id: &DatasetId) -> Result<SyncRequest, SyncError> {
        let dataset = self
            .store
            .get_dataset(dataset_id)
            .await?
            .ok_or_else(|| SyncError::DatasetNotFound(dataset_id.to_string()))?;

        let Some(guard) = self.locks.try_lock(dataset_id).await? else {
            info!(dataset = %dataset.name(), "Sync already in progress");
            return Ok(SyncRequest {
                state: SyncState::Locked,
                task_id: None,
            });
        };

        // Polls read PENDING, not the last run's result, until the new task is recorded
        self.tracker.forget(dataset_id).await?;

        let executor = self.executor.clone();
        let cancel = self.shutdown.child_token();
        let name = format!("sync {}", dataset.name());
        let job: BoxedJob = Box::pin(async move {
            let outcome = executor.run(&dataset, &cancel).await;
            let released = guard.release().await;
            let report = outcome?;
            released?;
            Ok(report.to_info())
        });

        // On failure the job is dropped here and the guard releases the lock
        let task_id = self.runtime.schedule(&name, job).await?;
        self.tracker.record(dataset_id, &task_id).await?;
        let status = self.runtime.status(&task_id).await?;

        info!(task_id = %task_id, state = %status.state, "Sync scheduled");
        Ok(SyncRequest {
            state: status.state.into(),
            task_id: Some(task_id),
        })
    }

    /// State of the dataset's latest sync; `PENDING` when none is known
    pub async fn sync_status(&self, dataset_id: &DatasetId) -> Result<TaskStatus, SyncError> {
        Ok(self.tracker.dataset_status(dataset_id).await?)
    }

    /// Polls a task until it reaches a terminal state
    pub async fn wait_for(&self, task_id: &TaskId, poll: Duration) -> Result<TaskStatus, SyncError> {
        loop {
            let status = self.runtime.status(task_id).await?;
            if status.state.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// When the dataset's lock was taken, if it is held
    pub async fn lock_held_since(
        &self,
        dataset_id: &DatasetId,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        Ok(self.locks.held_since(dataset_id).await?)
    }

    /// Deletes a dataset's lock regardless of who holds it
    pub async fn force_unlock(&self, dataset_id: &DatasetId) -> Result<bool, SyncError> {
        let removed = self.locks.force_release(dataset_id).await?;
        if !removed {
            warn!(dataset_id = %dataset_id, "No sync lock to release");
        }
        Ok(removed)
    }

    /// Token whose cancellation stops every run started by this service
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancels every in-flight run at its next checkpoint
    pub fn shutdown(&self) {
        info!("Cancelling in-flight syncs");
        self.shutdown.cancel();
    }
}
