//! In-process cache with LRU eviction and lazy TTL expiry.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use lexikon_core::cache::{pattern_matches, Cache, CacheError, Result};

#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// In-memory cache implementation with LRU eviction.
///
/// Expired values are dropped when they are next touched. Once
/// `max_entries` is reached the least recently used key is evicted.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<LruCache<String, Slot>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_entries` keys (at least one).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of stored keys, expired ones included.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        let mut store = self.store.write().await;

        match store.get(key) {
            Some(slot) if slot.is_expired() => {
                store.pop(key);
                Ok(None)
            }
            Some(slot) => Ok(Some(slot.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        let mut store = self.store.write().await;
        store.put(key.to_string(), Slot::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        self.store.write().await.pop(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        let store = self.store.read().await;
        Ok(store.peek(key).is_some_and(|slot| !slot.is_expired()))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        self.ensure_open()?;
        let mut store = self.store.write().await;
        let doomed: Vec<String> = store
            .iter()
            .filter(|(key, _)| pattern_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            store.pop(key);
        }
        tracing::trace!(pattern = %pattern, removed = doomed.len(), "Deleted keys by pattern");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.store.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MAX_ENTRIES: usize = 1000;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);

        cache.set("test:entry:1", b"apple", None).await.unwrap();

        assert_eq!(
            cache.get("test:entry:1").await.unwrap(),
            Some(b"apple".to_vec())
        );
        assert!(cache.exists("test:entry:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        assert_eq!(cache.get("test:entry:missing").await.unwrap(), None);
        assert!(!cache.exists("test:entry:missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("test:meaning:1", b"fruit", None).await.unwrap();

        cache.delete("test:meaning:1").await.unwrap();

        assert!(cache.get("test:meaning:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration_is_lazy() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache
            .set("test:entries:list:x", b"page", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(cache.exists("test:entries:list:x").await.unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!cache.exists("test:entries:list:x").await.unwrap());
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("test:entries:list:x").await.unwrap().is_none());
        // Reading an expired key drops it
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("test:entries:list:a", b"1", None).await.unwrap();
        cache.set("test:entries:list:b", b"2", None).await.unwrap();
        cache.set("test:entry:1", b"3", None).await.unwrap();
        cache.set("prod:entries:list:a", b"4", None).await.unwrap();

        cache.delete_pattern("test:entries:list:*").await.unwrap();

        assert!(cache.get("test:entries:list:a").await.unwrap().is_none());
        assert!(cache.get("test:entries:list:b").await.unwrap().is_none());
        assert!(cache.get("test:entry:1").await.unwrap().is_some());
        assert!(cache.get("prod:entries:list:a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(3);
        cache.set("key1", b"value1", None).await.unwrap();
        cache.set("key2", b"value2", None).await.unwrap();
        cache.set("key3", b"value3", None).await.unwrap();

        // Touch key1 so key2 becomes least recently used
        cache.get("key1").await.unwrap();
        cache.set("key4", b"value4", None).await.unwrap();

        assert!(cache.get("key1").await.unwrap().is_some());
        assert!(cache.get("key2").await.unwrap().is_none());
        assert!(cache.get("key3").await.unwrap().is_some());
        assert!(cache.get("key4").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let cache = MemoryCache::new(0);
        cache.set("a", b"1", None).await.unwrap();
        cache.set("b", b"2", None).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_closed_cache_rejects_operations() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("test:entry:1", b"apple", None).await.unwrap();

        cache.close().await.unwrap();

        assert_eq!(cache.get("test:entry:1").await, Err(CacheError::Closed));
        assert_eq!(
            cache.set("test:entry:1", b"x", None).await,
            Err(CacheError::Closed)
        );
    }
}
