//! Shared cache port
//!
//! A small key/value cache shared by every sync participant. It backs the
//! per-dataset sync lock and the dataset to task mapping, so `add` must be
//! atomic with respect to every other caller of the same backend.

use std::time::Duration;

/// Port trait for the shared cache
///
/// Entries whose TTL has elapsed behave exactly like absent entries.
#[async_trait::async_trait]
pub trait ISharedCache: Send + Sync {
    /// Stores `value` only if `key` is absent; returns true if it was stored
    async fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<bool>;

    /// Stores `value`, replacing any existing entry
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()>;

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Removes `key`; returns true if a live entry was removed
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;
}
