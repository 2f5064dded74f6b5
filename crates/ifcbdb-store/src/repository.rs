//! SQLite implementation of IDatasetStore
//!
//! This module provides the concrete SQLite-based implementation of the
//! dataset store port defined in ifcbdb-core. It handles conversion between
//! domain types and columns, and builds the SQL for bin queries.
//!
//! ## Type Mapping
//!
//! | Domain Type             | SQL Type | Strategy                                    |
//! |-------------------------|----------|---------------------------------------------|
//! | DatasetId, DirectoryId  | TEXT     | UUID string via `.to_string()` / `FromStr`  |
//! | Pid                     | TEXT     | Identifier string / `Pid::new()`            |
//! | DirectoryKind           | TEXT     | `as_str()` / `FromStr`                      |
//! | whitelist, blacklist    | TEXT     | Comma-separated list                        |
//! | DateTime<Utc>           | TEXT     | RFC 3339 with microseconds, `Z` suffix      |
//! | Location                | REAL x2  | `longitude`, `latitude`, both NULL if unset |
//! | metadata                | TEXT     | serde_json object                           |
//!
//! Timestamps are always written with the same fixed-width format so that
//! string comparison in SQL orders them chronologically.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use ifcbdb_core::domain::{
    newtypes::{DatasetId, DirectoryId},
    Bin, BinMetrics, DataDirectory, Dataset, DirectoryKind, Location, Pid,
};
use ifcbdb_core::ports::{BinQuery, IDatasetStore};

use crate::StoreError;

/// SQLite-based implementation of the dataset store port
pub struct SqliteDatasetStore {
    pool: SqlitePool,
}

impl SqliteDatasetStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Format a timestamp for storage
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a DateTime<Utc> from its stored string representation
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

/// Parse an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

fn parse_dataset_id(s: &str) -> Result<DatasetId, StoreError> {
    DatasetId::from_str(s).map_err(|e| StoreError::SerializationError(e.to_string()))
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn dataset_from_row(row: &SqliteRow) -> Result<Dataset, StoreError> {
    let id: String = row.get("id");
    let name: String = row.get("name");
    let title: String = row.get("title");
    let is_active: bool = row.get("is_active");

    Dataset::with_id(parse_dataset_id(&id)?, name, title, is_active)
        .map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn directory_from_row(row: &SqliteRow) -> Result<DataDirectory, StoreError> {
    let id: String = row.get("id");
    let dataset_id: String = row.get("dataset_id");
    let path: String = row.get("path");
    let kind: String = row.get("kind");
    let priority: i64 = row.get("priority");
    let whitelist: String = row.get("whitelist");
    let blacklist: String = row.get("blacklist");
    let last_synced: Option<String> = row.get("last_synced");

    let id = DirectoryId::from_str(&id).map_err(|e| StoreError::SerializationError(e.to_string()))?;
    let kind =
        DirectoryKind::from_str(&kind).map_err(|e| StoreError::SerializationError(e.to_string()))?;
    let priority = i32::try_from(priority).map_err(|_| {
        StoreError::SerializationError(format!("priority out of range: {}", priority))
    })?;

    Ok(DataDirectory::from_parts(
        id,
        parse_dataset_id(&dataset_id)?,
        PathBuf::from(path),
        kind,
        priority,
        &whitelist,
        &blacklist,
        parse_optional_datetime(last_synced)?,
    ))
}

/// Reconstruct a Bin from a database row
///
/// The timestamp column is informational: it is always re-derived from the
/// identifier.
fn bin_from_row(row: &SqliteRow) -> Result<Bin, StoreError> {
    let pid: String = row.get("pid");
    let sample_time: String = row.get("sample_time");
    let longitude: Option<f64> = row.get("longitude");
    let latitude: Option<f64> = row.get("latitude");
    let depth: f64 = row.get("depth");
    let qc_bad: bool = row.get("qc_bad");
    let qc_no_rois: bool = row.get("qc_no_rois");
    let metadata: String = row.get("metadata");
    let size: i64 = row.get("size");

    let pid = Pid::new(pid).map_err(|e| StoreError::SerializationError(e.to_string()))?;
    let metadata: serde_json::Value = serde_json::from_str(&metadata).map_err(|e| {
        StoreError::SerializationError(format!("Failed to parse metadata of {}: {}", pid, e))
    })?;

    let mut bin = Bin::new(pid);
    bin.set_sample_time(parse_datetime(&sample_time)?);
    if let (Some(lon), Some(lat)) = (longitude, latitude) {
        bin.set_location(Location::new(lon, lat).ok());
    }
    bin.set_depth(depth);
    bin.set_qc_bad(qc_bad);
    bin.update_qc_no_rois(qc_no_rois);
    bin.set_metadata(metadata);
    bin.apply_metrics(BinMetrics {
        size: u64::try_from(size).unwrap_or(0),
        temperature: row.get("temperature"),
        humidity: row.get("humidity"),
        run_time: row.get("run_time"),
        look_time: row.get("look_time"),
        ml_analyzed: row.get("ml_analyzed"),
    });

    Ok(bin)
}

fn bins_from_rows(rows: &[SqliteRow]) -> Result<Vec<Bin>, StoreError> {
    let mut bins = Vec::with_capacity(rows.len());
    for row in rows {
        bins.push(bin_from_row(row)?);
    }
    Ok(bins)
}

// ============================================================================
// IDatasetStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IDatasetStore for SqliteDatasetStore {
    // --- Dataset operations ---

    async fn save_dataset(&self, dataset: &Dataset) -> anyhow::Result<()> {
        let id = dataset.id().to_string();

        sqlx::query(
            "INSERT INTO datasets (id, name, title, is_active) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             name = excluded.name, title = excluded.title, is_active = excluded.is_active",
        )
        .bind(&id)
        .bind(dataset.name())
        .bind(dataset.title())
        .bind(dataset.is_active())
        .execute(&self.pool)
        .await?;

        tracing::trace!(dataset_id = %id, name = %dataset.name(), "Saved dataset");
        Ok(())
    }

    async fn get_dataset(&self, id: &DatasetId) -> anyhow::Result<Option<Dataset>> {
        let row = sqlx::query("SELECT * FROM datasets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(dataset_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn get_dataset_by_name(&self, name: &str) -> anyhow::Result<Option<Dataset>> {
        let row = sqlx::query("SELECT * FROM datasets WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(dataset_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_datasets(&self) -> anyhow::Result<Vec<Dataset>> {
        let rows = sqlx::query("SELECT * FROM datasets ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut datasets = Vec::with_capacity(rows.len());
        for row in &rows {
            datasets.push(dataset_from_row(row)?);
        }
        Ok(datasets)
    }

    // --- Directory operations ---

    async fn save_directory(&self, directory: &DataDirectory) -> anyhow::Result<()> {
        let id = directory.id().to_string();
        let path = directory.path().to_string_lossy().to_string();
        let last_synced = directory.last_synced().map(|dt| format_datetime(&dt));

        sqlx::query(
            "INSERT INTO data_directories \
             (id, dataset_id, path, kind, priority, whitelist, blacklist, last_synced) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             dataset_id = excluded.dataset_id, path = excluded.path, kind = excluded.kind, \
             priority = excluded.priority, whitelist = excluded.whitelist, \
             blacklist = excluded.blacklist, last_synced = excluded.last_synced",
        )
        .bind(&id)
        .bind(directory.dataset_id().to_string())
        .bind(&path)
        .bind(directory.kind().as_str())
        .bind(directory.priority())
        .bind(directory.whitelist_string())
        .bind(directory.blacklist_string())
        .bind(&last_synced)
        .execute(&self.pool)
        .await?;

        tracing::trace!(directory_id = %id, path = %path, "Saved data directory");
        Ok(())
    }

    async fn get_directory(&self, id: &DirectoryId) -> anyhow::Result<Option<DataDirectory>> {
        let row = sqlx::query("SELECT * FROM data_directories WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(directory_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_directories(
        &self,
        dataset_id: &DatasetId,
        kind: Option<DirectoryKind>,
    ) -> anyhow::Result<Vec<DataDirectory>> {
        let mut sql = String::from("SELECT * FROM data_directories WHERE dataset_id = ?");
        if kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        sql.push_str(" ORDER BY priority ASC, path ASC");

        let mut query = sqlx::query(&sql).bind(dataset_id.to_string());
        if let Some(kind) = kind {
            query = query.bind(kind.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut directories = Vec::with_capacity(rows.len());
        for row in &rows {
            directories.push(directory_from_row(row)?);
        }
        Ok(directories)
    }

    async fn delete_directory(&self, id: &DirectoryId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM data_directories WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        tracing::trace!(directory_id = %id, "Deleted data directory");
        Ok(result.rows_affected() > 0)
    }

    async fn mark_directory_synced(
        &self,
        id: &DirectoryId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let result = sqlx::query("UPDATE data_directories SET last_synced = ? WHERE id = ?")
            .bind(format_datetime(&at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("data directory {} does not exist", id);
        }
        Ok(())
    }

    // --- Bin operations ---

    async fn get_bin(&self, pid: &Pid) -> anyhow::Result<Option<Bin>> {
        let row = sqlx::query("SELECT * FROM bins WHERE pid = ?")
            .bind(pid.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(bin_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn save_bins(&self, bins: &[Bin]) -> anyhow::Result<()> {
        if bins.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for bin in bins {
            let metadata = serde_json::to_string(bin.metadata())
                .map_err(|e| anyhow::anyhow!("Failed to serialize metadata: {}", e))?;
            let metrics = bin.metrics();
            let location = bin.location();

            sqlx::query(
                "INSERT INTO bins \
                 (pid, timestamp, sample_time, longitude, latitude, depth, qc_bad, qc_no_rois, \
                  metadata, size, temperature, humidity, run_time, look_time, ml_analyzed) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(pid) DO UPDATE SET \
                 timestamp = excluded.timestamp, sample_time = excluded.sample_time, \
                 longitude = excluded.longitude, latitude = excluded.latitude, \
                 depth = excluded.depth, qc_bad = excluded.qc_bad, \
                 qc_no_rois = excluded.qc_no_rois, metadata = excluded.metadata, \
                 size = excluded.size, temperature = excluded.temperature, \
                 humidity = excluded.humidity, run_time = excluded.run_time, \
                 look_time = excluded.look_time, ml_analyzed = excluded.ml_analyzed",
            )
            .bind(bin.pid().as_str())
            .bind(format_datetime(&bin.timestamp()))
            .bind(format_datetime(&bin.sample_time()))
            .bind(location.map(|l| l.longitude))
            .bind(location.map(|l| l.latitude))
            .bind(bin.depth())
            .bind(bin.qc_bad())
            .bind(bin.qc_no_rois())
            .bind(&metadata)
            .bind(i64::try_from(metrics.size).unwrap_or(i64::MAX))
            .bind(metrics.temperature)
            .bind(metrics.humidity)
            .bind(metrics.run_time)
            .bind(metrics.look_time)
            .bind(metrics.ml_analyzed)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(count = bins.len(), "Saved bin batch");
        Ok(())
    }

    async fn link_bins(&self, dataset_id: &DatasetId, pids: &[Pid]) -> anyhow::Result<()> {
        if pids.is_empty() {
            return Ok(());
        }

        let dataset_id = dataset_id.to_string();
        let mut tx = self.pool.begin().await?;

        for pid in pids {
            sqlx::query("INSERT OR IGNORE INTO dataset_bins (dataset_id, bin_pid) VALUES (?, ?)")
                .bind(&dataset_id)
                .bind(pid.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::trace!(dataset_id = %dataset_id, count = pids.len(), "Linked bins");
        Ok(())
    }

    async fn datasets_for_bin(&self, pid: &Pid) -> anyhow::Result<Vec<Dataset>> {
        let rows = sqlx::query(
            "SELECT d.* FROM datasets d \
             JOIN dataset_bins db ON db.dataset_id = d.id \
             WHERE db.bin_pid = ? ORDER BY d.name ASC",
        )
        .bind(pid.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut datasets = Vec::with_capacity(rows.len());
        for row in &rows {
            datasets.push(dataset_from_row(row)?);
        }
        Ok(datasets)
    }

    async fn query_bins(&self, query: &BinQuery) -> anyhow::Result<Vec<Bin>> {
        let mut sql = String::from("SELECT b.* FROM bins b");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref dataset_id) = query.dataset_id {
            sql.push_str(" JOIN dataset_bins db ON db.bin_pid = b.pid WHERE db.dataset_id = ?");
            binds.push(dataset_id.to_string());
        } else {
            sql.push_str(" WHERE 1=1");
        }

        if let Some(ref start) = query.start {
            sql.push_str(" AND b.sample_time >= ?");
            binds.push(format_datetime(start));
        }

        if let Some(ref end) = query.end {
            sql.push_str(" AND b.sample_time <= ?");
            binds.push(format_datetime(end));
        }

        if query.exclude_bad {
            sql.push_str(" AND b.qc_bad = 0");
        }

        sql.push_str(" ORDER BY b.sample_time ASC, b.pid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut q = sqlx::query(&sql);
        for bind in &binds {
            q = q.bind(bind);
        }

        let rows = q.fetch_all(&self.pool).await?;
        Ok(bins_from_rows(&rows)?)
    }

    async fn most_recent_bin(
        &self,
        dataset_id: &DatasetId,
        at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Option<Bin>> {
        let mut sql = String::from(
            "SELECT b.* FROM bins b \
             JOIN dataset_bins db ON db.bin_pid = b.pid \
             WHERE db.dataset_id = ?",
        );
        if at.is_some() {
            sql.push_str(" AND b.sample_time <= ?");
        }
        sql.push_str(" ORDER BY b.sample_time DESC, b.pid DESC LIMIT 1");

        let mut q = sqlx::query(&sql).bind(dataset_id.to_string());
        if let Some(ref at) = at {
            q = q.bind(format_datetime(at));
        }

        match q.fetch_optional(&self.pool).await? {
            Some(ref r) => Ok(Some(bin_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn closest_bin(
        &self,
        dataset_id: &DatasetId,
        location: &Location,
    ) -> anyhow::Result<Option<Bin>> {
        // Newest first so that strict comparison keeps the latest on ties
        let rows = sqlx::query(
            "SELECT b.* FROM bins b \
             JOIN dataset_bins db ON db.bin_pid = b.pid \
             WHERE db.dataset_id = ? AND b.latitude IS NOT NULL AND b.longitude IS NOT NULL \
             ORDER BY b.sample_time DESC, b.pid DESC",
        )
        .bind(dataset_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut best: Option<(f64, Bin)> = None;
        for row in &rows {
            let bin = bin_from_row(row)?;
            let Some(here) = bin.location() else {
                continue;
            };
            let distance = here.distance_km(location);
            if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                best = Some((distance, bin));
            }
        }

        Ok(best.map(|(_, bin)| bin))
    }

    async fn count_bins(&self, dataset_id: &DatasetId) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dataset_bins WHERE dataset_id = ?")
            .bind(dataset_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}
