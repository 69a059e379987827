//! Redis cache backend.
//!
//! Pattern deletion walks the keyspace with `SCAN MATCH` and deletes each
//! batch as it arrives, so no single command blocks the server. The walk is
//! not atomic: keys written while it runs may survive, which the callers
//! tolerate because every cached value also carries a TTL.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use lexikon_core::cache::{Cache, CacheError, Result};

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 500;

/// Maps Redis errors to CacheError.
fn map_redis_error(err: redis::RedisError) -> CacheError {
    if err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped() {
        CacheError::ConnectionFailed(err.to_string())
    } else {
        CacheError::OperationFailed(err.to_string())
    }
}

/// Redis cache backend using a connection manager that reconnects on failure.
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
    closed: AtomicBool,
}

impl RedisCache {
    /// Creates a new Redis cache connection.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self {
            conn,
            closed: AtomicBool::new(false),
        })
    }

    fn connection(&self) -> Result<redis::aio::ConnectionManager> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        Ok(self.conn.clone())
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection()?;
        conn.get(key).await.map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection()?;
        match ttl {
            Some(duration) => {
                // PX keeps sub-second TTLs meaningful
                let millis = duration.as_millis().max(1) as u64;
                conn.pset_ex::<_, _, ()>(key, value, millis)
                    .await
                    .map_err(map_redis_error)
            }
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(map_redis_error),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection()?;
        conn.del::<_, ()>(key).await.map_err(map_redis_error)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection()?;
        conn.exists(key).await.map_err(map_redis_error)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let mut conn = self.connection()?;
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;

            if !keys.is_empty() {
                removed += keys.len();
                conn.del::<_, ()>(&keys).await.map_err(map_redis_error)?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::trace!(pattern = %pattern, removed, "Deleted keys by pattern");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // The manager drops its connection once the last clone goes away
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Helper to get Redis URL from environment.
    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    /// Skip test if Redis not available.
    async fn get_test_cache() -> Option<RedisCache> {
        tokio::time::timeout(Duration::from_secs(2), RedisCache::new(&redis_url()))
            .await
            .ok()?
            .ok()
    }

    /// Namespace unique to one test run.
    fn test_env() -> String {
        format!("test-{}", Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_redis_set_get_exists() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let key = format!("{}:entry:1", test_env());

        cache.set(&key, b"apple", None).await.unwrap();

        assert_eq!(cache.get(&key).await.unwrap(), Some(b"apple".to_vec()));
        assert!(cache.exists(&key).await.unwrap());

        cache.delete(&key).await.unwrap();
        assert!(!cache.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_redis_ttl() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let key = format!("{}:entries:list:x", test_env());

        cache
            .set(&key, b"page", Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redis_delete_pattern() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let env = test_env();
        let list_a = format!("{env}:entries:list:a");
        let list_b = format!("{env}:entries:list:b");
        let point = format!("{env}:entry:1");

        cache.set(&list_a, b"1", None).await.unwrap();
        cache.set(&list_b, b"2", None).await.unwrap();
        cache.set(&point, b"3", None).await.unwrap();

        cache
            .delete_pattern(&format!("{env}:entries:list:*"))
            .await
            .unwrap();

        assert!(cache.get(&list_a).await.unwrap().is_none());
        assert!(cache.get(&list_b).await.unwrap().is_none());
        assert!(cache.get(&point).await.unwrap().is_some());

        cache.delete(&point).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_closed_rejects_operations() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        cache.close().await.unwrap();

        assert_eq!(cache.get("any").await, Err(CacheError::Closed));
    }
}
