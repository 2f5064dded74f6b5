//! Domain entities and business logic
//!
//! This module contains the core domain types for the dashboard:
//! - Newtypes for identifiers and the instrument's permanent identifier
//! - Datasets and the data directories they own
//! - Bins (one instrument sample each) and their metrics
//! - Task and sync states reported to callers
//! - Timeline aggregation over bins
//! - Domain-specific error types

pub mod bin;
pub mod dataset;
pub mod directory;
pub mod errors;
pub mod newtypes;
pub mod pid;
pub mod task;
pub mod timeline;

// Re-export commonly used types
pub use bin::{Bin, BinMetrics, Location, FILL_VALUE};
pub use dataset::Dataset;
pub use directory::{DataDirectory, DirectoryKind};
pub use errors::DomainError;
pub use newtypes::*;
pub use pid::{Pid, PidScheme};
pub use task::{SyncReport, SyncState, TaskState, TaskStatus};
pub use timeline::{TimelineMetric, TimelinePoint, TimelineResolution};
