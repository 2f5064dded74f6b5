//! Task and synchronization states
//!
//! These are the values that cross the asynchronous task boundary. A sync
//! run reports nothing but its final [`TaskState`] plus an `info` payload:
//! the [`SyncReport`] on success, the error text on failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Lifecycle of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Scheduled but not started, or unknown to the runtime
    Pending,
    /// Currently executing
    Running,
    /// Finished without error
    Succeeded,
    /// Finished with an error, was cancelled, or panicked
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Failed => "FAILED",
        }
    }

    /// Returns true once the task can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TaskState::Pending),
            "RUNNING" => Ok(TaskState::Running),
            "SUCCEEDED" => Ok(TaskState::Succeeded),
            "FAILED" => Ok(TaskState::Failed),
            other => Err(DomainError::InvalidTaskState(other.to_string())),
        }
    }
}

/// State of a task together with its result payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,
}

impl TaskStatus {
    pub fn pending() -> Self {
        Self {
            state: TaskState::Pending,
            info: None,
        }
    }

    pub fn running() -> Self {
        Self {
            state: TaskState::Running,
            info: None,
        }
    }

    pub fn succeeded(info: serde_json::Value) -> Self {
        Self {
            state: TaskState::Succeeded,
            info: Some(info),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: TaskState::Failed,
            info: Some(serde_json::Value::String(message.into())),
        }
    }
}

/// Answer to a sync request
///
/// `Locked` means another sync already holds the dataset; it is not an
/// error and is never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Locked,
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl From<TaskState> for SyncState {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Pending => SyncState::Pending,
            TaskState::Running => SyncState::Running,
            TaskState::Succeeded => SyncState::Succeeded,
            TaskState::Failed => SyncState::Failed,
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Locked => f.write_str("LOCKED"),
            SyncState::Pending => f.write_str("PENDING"),
            SyncState::Running => f.write_str("RUNNING"),
            SyncState::Succeeded => f.write_str("SUCCEEDED"),
            SyncState::Failed => f.write_str("FAILED"),
        }
    }
}

/// Summary of one completed dataset synchronization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub dataset: String,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub directories_scanned: u32,
    pub filesets_found: u64,
    pub bins_created: u64,
    pub bins_updated: u64,
    pub bins_unchanged: u64,
    /// Filesets skipped because a higher-priority directory already had the bin
    pub duplicates_shadowed: u64,
    /// Filesets missing a companion file
    pub partial_filesets: u64,
    /// Files that looked like filesets but carried no valid identifier
    pub malformed_filesets: u64,
    /// Non-fatal errors (unreadable headers, unreadable entries)
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn new(dataset: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            dataset: dataset.into(),
            started_at: Some(started_at),
            ..Self::default()
        }
    }

    /// Number of bins written to the store during the run
    pub fn bins_written(&self) -> u64 {
        self.bins_created + self.bins_updated
    }

    /// Serializes the report for a task `info` payload
    pub fn to_info(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_serializes_upper_case() {
        let json = serde_json::to_string(&TaskState::Succeeded).unwrap();
        assert_eq!(json, "\"SUCCEEDED\"");
        assert_eq!(serde_json::to_string(&SyncState::Locked).unwrap(), "\"LOCKED\"");
    }

    #[test]
    fn test_task_state_parse_and_terminal() {
        assert_eq!("running".parse::<TaskState>().unwrap(), TaskState::Running);
        assert!("STARTED".parse::<TaskState>().is_err());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
    }

    #[test]
    fn test_status_without_info_omits_field() {
        let json = serde_json::to_value(TaskStatus::pending()).unwrap();
        assert_eq!(json, serde_json::json!({"state": "PENDING"}));

        let failed = serde_json::to_value(TaskStatus::failed("boom")).unwrap();
        assert_eq!(failed, serde_json::json!({"state": "FAILED", "info": "boom"}));
    }

    #[test]
    fn test_report_info_round_trip() {
        let mut report = SyncReport::new("d1", Utc::now());
        report.bins_created = 2;
        report.bins_updated = 1;
        assert_eq!(report.bins_written(), 3);

        let back: SyncReport = serde_json::from_value(report.to_info()).unwrap();
        assert_eq!(back, report);
    }
}
