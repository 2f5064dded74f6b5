//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync core depends on; their implementations
//! live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IDatasetStore`] - Persistent storage for datasets, directories and bins
//! - [`ISharedCache`] - Process-wide key/value cache with atomic set-if-absent
//! - [`ITaskRuntime`] - Background task scheduling and status lookup

pub mod dataset_store;
pub mod shared_cache;
pub mod task_runtime;

pub use dataset_store::{BinQuery, IDatasetStore};
pub use shared_cache::ISharedCache;
pub use task_runtime::{BoxedJob, ITaskRuntime};
