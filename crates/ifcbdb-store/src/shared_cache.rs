//! SQLite implementation of ISharedCache
//!
//! Entries live in the `cache_entries` table next to the dataset tables.
//! Every operation is a single statement, so atomicity comes from SQLite's
//! own write lock and holds across processes sharing the database file.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;

use ifcbdb_core::ports::ISharedCache;

/// SQLite-backed shared cache
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Deletes every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired cache entries");
        }
        Ok(removed)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)))
}

#[async_trait::async_trait]
impl ISharedCache for SqliteCache {
    async fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<bool> {
        // An expired row is replaced; a live one makes the upsert a no-op
        let result = sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at \
             WHERE cache_entries.expires_at IS NOT NULL AND cache_entries.expires_at <= ?",
        )
        .bind(key)
        .bind(value)
        .bind(expiry(ttl))
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        let added = result.rows_affected() > 0;
        tracing::trace!(key, added, "Cache add");
        Ok(added)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expiry(ttl))
        .execute(&self.pool)
        .await?;

        tracing::trace!(key, "Cache set");
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM cache_entries \
             WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let expires_at: Option<Option<i64>> =
            sqlx::query_scalar("DELETE FROM cache_entries WHERE key = ? RETURNING expires_at")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        let was_live = match expires_at {
            Some(None) => true,
            Some(Some(at)) => at > now_millis(),
            None => false,
        };
        tracing::trace!(key, was_live, "Cache delete");
        Ok(was_live)
    }
}
