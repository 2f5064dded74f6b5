//! IFCB Dashboard Sync - dataset synchronization
//!
//! Provides:
//! - A per-dataset sync lock over the shared cache
//! - A background task runtime with pollable task states
//! - The dataset to task mapping callers poll
//! - The executor that reconciles filesets on disk with stored bins
//!
//! ## Modules
//!
//! - [`lock`] - [`SyncLockManager`] and its scoped [`SyncLockGuard`]
//! - [`memory_cache`] - in-process [`ISharedCache`](ifcbdb_core::ports::ISharedCache)
//! - [`runtime`] - [`TokioTaskRuntime`], the tokio-backed task runtime
//! - [`tracker`] - [`TaskStatusTracker`]
//! - [`executor`] - [`SyncExecutor`], one reconciliation run
//! - [`service`] - [`SyncService`], the request/poll entry points

pub mod executor;
pub mod lock;
pub mod memory_cache;
pub mod runtime;
pub mod service;
pub mod tracker;

pub use executor::{SyncExecutor, SyncOptions};
pub use lock::{SyncLockGuard, SyncLockManager};
pub use memory_cache::MemoryCache;
pub use runtime::TokioTaskRuntime;
pub use service::{SyncRequest, SyncService};
pub use tracker::TaskStatusTracker;

use thiserror::Error;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// The requested dataset does not exist
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// A raw data directory could not be walked
    #[error(transparent)]
    Scan(#[from] ifcbdb_data::ScanError),

    /// The run was cancelled between directories
    #[error("cancelled")]
    Cancelled,

    /// A blocking scan task died before reporting
    #[error("Scan task failed: {0}")]
    Interrupted(String),

    /// Store, cache or runtime failure
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
