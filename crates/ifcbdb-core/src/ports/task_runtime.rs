//! Task runtime port
//!
//! Schedules units of background work and reports their state. The caller
//! that schedules a job returns immediately; progress is observed only
//! through [`ITaskRuntime::status`].

use std::future::Future;
use std::pin::Pin;

use crate::domain::{newtypes::TaskId, TaskStatus};

/// A schedulable job
///
/// On success the job yields the JSON `info` payload for its task.
pub type BoxedJob = Pin<Box<dyn Future<Output = anyhow::Result<serde_json::Value>> + Send>>;

/// Port trait for background task execution
#[async_trait::async_trait]
pub trait ITaskRuntime: Send + Sync {
    /// Schedules `job` and returns its id without waiting for it
    async fn schedule(&self, name: &str, job: BoxedJob) -> anyhow::Result<TaskId>;

    /// Current state of a task
    ///
    /// Ids the runtime does not know about report `PENDING`.
    async fn status(&self, id: &TaskId) -> anyhow::Result<TaskStatus>;
}
