//! Tokio-backed task runtime
//!
//! Each scheduled job runs under a small supervisor task:
//!
//! ```text
//! schedule() ──→ record PENDING ──→ supervisor ──→ RUNNING
//!                                       │
//!                                 tokio::spawn(job)
//!                                       │
//!                 Ok(info) → SUCCEEDED  │  Err(e) / panic → FAILED
//! ```
//!
//! Running the job in its own task turns a panic into a `JoinError`, so a
//! panicking job ends `FAILED` instead of taking the supervisor down.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use ifcbdb_core::domain::{TaskId, TaskState, TaskStatus};
use ifcbdb_core::ports::{BoxedJob, ITaskRuntime};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct TaskRecord {
    name: String,
    status: TaskStatus,
    finished_at: Option<Instant>,
}

/// How long finished tasks are remembered unless configured otherwise
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Task runtime that spawns jobs on the current tokio runtime
///
/// Finished tasks are forgotten once they are older than the retention
/// period; the sweep runs whenever a new task is scheduled.
#[derive(Debug, Clone)]
pub struct TokioTaskRuntime {
    tasks: Arc<DashMap<TaskId, TaskRecord>>,
    retention: Duration,
}

impl Default for TokioTaskRuntime {
    fn default() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            retention: DEFAULT_RETENTION,
        }
    }
}

impl TokioTaskRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Number of tasks the runtime still remembers
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Forgets tasks that finished more than `older_than` ago
    ///
    /// Forgotten tasks report `PENDING` afterwards, like any unknown id.
    pub fn purge_finished(&self, older_than: Duration) -> usize {
        let now = Instant::now();
        let before = self.tasks.len();
        self.tasks.retain(|_, record| {
            record
                .finished_at
                .map_or(true, |at| now.saturating_duration_since(at) < older_than)
        });
        let purged = before.saturating_sub(self.tasks.len());
        if purged > 0 {
            debug!(purged, "Purged finished task records");
        }
        purged
    }

    fn update(tasks: &DashMap<TaskId, TaskRecord>, id: &TaskId, status: TaskStatus) {
        if let Some(mut record) = tasks.get_mut(id) {
            if status.state.is_terminal() {
                record.finished_at = Some(Instant::now());
            }
            record.status = status;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[async_trait::async_trait]
impl ITaskRuntime for TokioTaskRuntime {
    async fn schedule(&self, name: &str, job: BoxedJob) -> anyhow::Result<TaskId> {
        self.purge_finished(self.retention);

        let id = TaskId::new();
        self.tasks.insert(
            id,
            TaskRecord {
                name: name.to_string(),
                status: TaskStatus::pending(),
                finished_at: None,
            },
        );

        let tasks = self.tasks.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            Self::update(&tasks, &id, TaskStatus::running());
            debug!(task_id = %id, task = %name, "Task started");

            let status = match tokio::spawn(job).await {
                Ok(Ok(info)) => TaskStatus::succeeded(info),
                Ok(Err(e)) => TaskStatus::failed(format!("{e:#}")),
                Err(join_err) if join_err.is_panic() => {
                    let payload = join_err.into_panic();
                    TaskStatus::failed(format!("panicked: {}", panic_message(payload.as_ref())))
                }
                Err(join_err) => TaskStatus::failed(join_err.to_string()),
            };

            match status.state {
                TaskState::Succeeded => info!(task_id = %id, task = %name, "Task succeeded"),
                _ => warn!(task_id = %id, task = %name, info = ?status.info, "Task failed"),
            }
            Self::update(&tasks, &id, status);
        });

        Ok(id)
    }

    async fn status(&self, id: &TaskId) -> anyhow::Result<TaskStatus> {
        Ok(self
            .tasks
            .get(id)
            .map(|record| record.status.clone())
            .unwrap_or_else(TaskStatus::pending))
    }
}
