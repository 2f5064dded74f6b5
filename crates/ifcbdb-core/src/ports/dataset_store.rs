//! Dataset store port (driven/secondary port)
//!
//! Persistence for datasets, their data directories, and bins.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Bins are only ever written in batches by the sync pipeline; a batch is
//!   applied atomically with upsert-by-identifier semantics.
//! - Dataset membership is a separate, idempotent link operation so that a
//!   bin already known from another dataset is never duplicated.

use chrono::{DateTime, Utc};

use crate::domain::{
    newtypes::{DatasetId, DirectoryId},
    Bin, DataDirectory, Dataset, DirectoryKind, Location, Pid,
};

// ============================================================================
// BinQuery
// ============================================================================

/// Filter criteria for listing bins
///
/// All fields are optional and combined with AND logic. Results are always
/// ordered by sample time, oldest first.
#[derive(Debug, Clone, Default)]
pub struct BinQuery {
    /// Restrict to bins linked to this dataset
    pub dataset_id: Option<DatasetId>,
    /// Inclusive lower bound on sample time
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on sample time
    pub end: Option<DateTime<Utc>>,
    /// Drop bins flagged bad
    pub exclude_bad: bool,
    /// Maximum number of bins returned
    pub limit: Option<u32>,
}

impl BinQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, dataset_id: DatasetId) -> Self {
        self.dataset_id = Some(dataset_id);
        self
    }

    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn excluding_bad(mut self) -> Self {
        self.exclude_bad = true;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ============================================================================
// IDatasetStore trait
// ============================================================================

/// Port trait for persistent dataset storage
#[async_trait::async_trait]
pub trait IDatasetStore: Send + Sync {
    // --- Dataset operations ---

    /// Saves a dataset (insert or update by id)
    async fn save_dataset(&self, dataset: &Dataset) -> anyhow::Result<()>;

    async fn get_dataset(&self, id: &DatasetId) -> anyhow::Result<Option<Dataset>>;

    /// Looks a dataset up by its unique name
    async fn get_dataset_by_name(&self, name: &str) -> anyhow::Result<Option<Dataset>>;

    /// Lists all datasets ordered by name
    async fn list_datasets(&self) -> anyhow::Result<Vec<Dataset>>;

    // --- Directory operations ---

    /// Saves a data directory (insert or update by id)
    async fn save_directory(&self, directory: &DataDirectory) -> anyhow::Result<()>;

    async fn get_directory(&self, id: &DirectoryId) -> anyhow::Result<Option<DataDirectory>>;

    /// Lists a dataset's directories in ascending priority order
    ///
    /// Ties are broken by path so the order is deterministic. When `kind`
    /// is given only directories of that kind are returned.
    async fn list_directories(
        &self,
        dataset_id: &DatasetId,
        kind: Option<DirectoryKind>,
    ) -> anyhow::Result<Vec<DataDirectory>>;

    /// Deletes a data directory; returns false if it did not exist
    async fn delete_directory(&self, id: &DirectoryId) -> anyhow::Result<bool>;

    /// Records the completion time of a sync for a directory
    async fn mark_directory_synced(
        &self,
        id: &DirectoryId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    // --- Bin operations ---

    async fn get_bin(&self, pid: &Pid) -> anyhow::Result<Option<Bin>>;

    /// Upserts a batch of bins in a single transaction
    async fn save_bins(&self, bins: &[Bin]) -> anyhow::Result<()>;

    /// Adds bins to a dataset; links that already exist are left alone
    async fn link_bins(&self, dataset_id: &DatasetId, pids: &[Pid]) -> anyhow::Result<()>;

    /// Datasets a bin belongs to, ordered by name
    async fn datasets_for_bin(&self, pid: &Pid) -> anyhow::Result<Vec<Dataset>>;

    /// Lists bins matching the query, oldest first
    async fn query_bins(&self, query: &BinQuery) -> anyhow::Result<Vec<Bin>>;

    /// Most recently sampled bin of a dataset, optionally at or before `at`
    async fn most_recent_bin(
        &self,
        dataset_id: &DatasetId,
        at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Option<Bin>>;

    /// Bin of a dataset nearest to a location, by great-circle distance
    ///
    /// Bins without a location are ignored. Ties go to the latest sample.
    async fn closest_bin(
        &self,
        dataset_id: &DatasetId,
        location: &Location,
    ) -> anyhow::Result<Option<Bin>>;

    /// Number of bins linked to a dataset
    async fn count_bins(&self, dataset_id: &DatasetId) -> anyhow::Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_query_builder() {
        let id = DatasetId::new();
        let q = BinQuery::new().with_dataset(id).excluding_bad().with_limit(10);
        assert_eq!(q.dataset_id, Some(id));
        assert!(q.exclude_bad);
        assert_eq!(q.limit, Some(10));
        assert!(q.start.is_none());
    }
}
