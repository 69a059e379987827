//! Cached repository decorators.
//!
//! Each decorator wraps one repository trait with the cache-aside pattern:
//!
//! - **Reads**: check the cache first, on miss fetch from the repository and
//!   populate the cache with the TTL of the value's tier
//! - **Writes**: persist to the repository, then evict every key the
//!   committed change could have made stale
//!
//! Cache failures never reach the caller. A failed or timed-out read is a
//! miss, a failed population or eviction is logged and skipped.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! let repo: Arc<dyn DictionaryRepository> = Arc::new(SqliteRepository::new("db.sqlite", false).await?);
//! let cache = CacheAside::new(
//!     Arc::new(MemoryCache::new(10_000)),
//!     KeySpace::new("dev"),
//!     CacheTtls::default(),
//!     Duration::from_millis(250),
//! );
//!
//! let entries = CachedEntryRepository::new(repo.clone(), cache.clone());
//! ```

mod annotation;
mod entry;
mod example;
mod meaning;
mod translation;

#[cfg(test)]
mod testing;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use lexikon_core::cache::{
    decode, encode, Cache, CacheError, CacheTtls, InvalidationSet, KeySpace, Mutation, TtlTier,
};
use lexikon_core::storage::{MeaningRepository, Result};

pub use annotation::CachedAnnotationRepository;
pub use entry::CachedEntryRepository;
pub use example::CachedExampleRepository;
pub use meaning::CachedMeaningRepository;
pub use translation::CachedTranslationRepository;

/// Cache handle shared by all decorators.
#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn Cache>,
    keys: KeySpace,
    ttls: CacheTtls,
    op_timeout: Duration,
}

impl CacheAside {
    /// # Arguments
    ///
    /// * `cache` - The cache backend
    /// * `keys` - Key namespace of this environment
    /// * `ttls` - Expiry per tier
    /// * `op_timeout` - Upper bound on every single cache call
    pub fn new(
        cache: Arc<dyn Cache>,
        keys: KeySpace,
        ttls: CacheTtls,
        op_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            keys,
            ttls,
            op_timeout,
        }
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = lexikon_core::cache::Result<T>>,
    ) -> lexikon_core::cache::Result<T> {
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.op_timeout.as_millis() as u64)),
        }
    }

    /// Returns the cached value, or `None` on a miss or any cache failure.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.bounded(self.cache.get(key)).await {
            Ok(Some(bytes)) => match decode(&bytes) {
                Ok(value) => {
                    tracing::trace!(key, "Cache hit");
                    Some(value)
                }
                // Treated as a miss; the next population overwrites it
                Err(err) => {
                    tracing::warn!(key, error = %err, "Cached value could not be decoded");
                    None
                }
            },
            Ok(None) => {
                tracing::trace!(key, "Cache miss");
                None
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "Cache read failed, falling back to repository");
                None
            }
        }
    }

    /// Stores a value with the TTL of its tier. Failures are logged only.
    pub async fn populate<T: Serialize + ?Sized>(&self, key: &str, value: &T, tier: TtlTier) {
        let bytes = match encode(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(key, error = %err, "Failed to encode value for cache");
                return;
            }
        };
        let ttl = self.ttls.for_tier(tier);
        if let Err(err) = self.bounded(self.cache.set(key, &bytes, Some(ttl))).await {
            tracing::warn!(key, error = %err, "Failed to populate cache");
        }
    }

    /// Read-through: serves `key` from the cache or loads and populates it.
    ///
    /// Errors of `load` are returned as-is and never cached.
    pub async fn get_or_load<T, F, Fut>(&self, key: String, tier: TtlTier, load: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.read(&key).await {
            return Ok(value);
        }
        let value = load().await?;
        self.populate(&key, &value, tier).await;
        Ok(value)
    }

    /// Evicts every key made stale by a committed mutation.
    pub async fn invalidate(&self, mutation: Mutation<'_>) {
        let set = InvalidationSet::plan(&self.keys, mutation);
        self.evict(&set).await;
    }

    async fn evict(&self, set: &InvalidationSet) {
        for key in &set.keys {
            if let Err(err) = self.bounded(self.cache.delete(key)).await {
                tracing::warn!(key, error = %err, "Failed to invalidate cache key");
            }
        }
        for pattern in &set.patterns {
            if let Err(err) = self.bounded(self.cache.delete_pattern(pattern)).await {
                tracing::warn!(pattern, error = %err, "Failed to invalidate cache pattern");
            }
        }
        tracing::trace!(
            keys = set.keys.len(),
            patterns = set.patterns.len(),
            "Cache invalidated"
        );
    }
}

/// Entry that owns a meaning, `None` when it cannot be resolved.
///
/// A cached meaning answers without touching the repository.
async fn owning_entry<R>(cache: &CacheAside, repository: &R, meaning_id: Uuid) -> Option<Uuid>
where
    R: MeaningRepository + ?Sized,
{
    let key = cache.keys().meaning(meaning_id);
    if let Some(meaning) = cache.read::<lexikon_core::dictionary::Meaning>(&key).await {
        return Some(meaning.entry_id);
    }
    match repository.get_meaning(meaning_id).await {
        Ok(meaning) => Some(meaning.entry_id),
        Err(err) => {
            tracing::debug!(%meaning_id, error = %err, "Owning entry unresolved, evicting all entry keys");
            None
        }
    }
}
