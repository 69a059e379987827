//! Cache backend implementations.
//!
//! Concrete implementations of [`lexikon_core::cache::Cache`]. The backend
//! is picked at startup from configuration by [`connect`].

mod memory;
mod redis_impl;

use std::sync::Arc;

use lexikon_core::cache::Cache;

use crate::config::{CacheBackend, CacheConfig};

pub use memory::MemoryCache;
pub use redis_impl::RedisCache;

/// Opens the configured cache backend.
pub async fn connect(config: &CacheConfig) -> anyhow::Result<Arc<dyn Cache>> {
    match config.backend {
        CacheBackend::Memory => {
            tracing::info!(max_entries = config.max_entries, "Using in-memory cache");
            Ok(Arc::new(MemoryCache::new(config.max_entries)))
        }
        CacheBackend::Redis => {
            tracing::info!(url = %config.redis_url, "Connecting to Redis cache");
            let cache = RedisCache::new(&config.redis_url).await?;
            Ok(Arc::new(cache))
        }
    }
}
