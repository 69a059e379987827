use std::time::Duration;

use async_trait::async_trait;

use super::Result;

/// Byte-oriented key/value cache with per-key TTL.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns true if a live value is stored under `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Deletes all values matching a glob pattern (e.g., "prod:entries:list:*").
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Releases resources. Later operations fail with `CacheError::Closed`.
    async fn close(&self) -> Result<()>;
}
