//! IFCB Dashboard Store - SQLite persistence
//!
//! SQLite-backed adapters for:
//! - Datasets and their data directories
//! - Bins and dataset membership
//! - The shared key/value cache used for sync locks and task handles
//!
//! ## Architecture
//!
//! This crate implements the `IDatasetStore` and `ISharedCache` ports from
//! `ifcbdb-core`. Both adapters can share one database file, which lets
//! separate processes contend on the same sync lock.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteDatasetStore`] - Full `IDatasetStore` implementation
//! - [`SqliteCache`] - `ISharedCache` implementation with per-entry expiry
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use ifcbdb_store::{DatabasePool, SqliteCache, SqliteDatasetStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/ifcbdb/ifcbdb.db")).await?;
//! let store = SqliteDatasetStore::new(pool.pool().clone());
//! let cache = SqliteCache::new(pool.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;
pub mod shared_cache;

pub use pool::DatabasePool;
pub use repository::SqliteDatasetStore;
pub use shared_cache::SqliteCache;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be turned back into a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
