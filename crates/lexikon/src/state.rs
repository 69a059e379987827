//! Application state with repository-based storage.
//!
//! This module defines the shared application state that is passed to all
//! request handlers. Every read and write goes through the cache-aside
//! decorators; only history (never cached) talks to the backend directly.

use std::sync::Arc;

use lexikon_core::cache::{Cache, KeySpace};
use lexikon_core::storage::{
    AnnotationRepository, DictionaryRepository, EntryRepository, ExampleRepository,
    MeaningRepository, TranslationRepository,
};

use crate::cache;
use crate::config::Config;
use crate::storage::{
    self,
    cached::{
        CacheAside, CachedAnnotationRepository, CachedEntryRepository, CachedExampleRepository,
        CachedMeaningRepository, CachedTranslationRepository,
    },
    InMemoryAnnotations,
};

/// Shared application state.
///
/// This is cloned for each request handler and contains shared resources
/// including repository trait objects for database access.
#[derive(Clone)]
pub struct AppState {
    /// Entry repository (cached, wraps underlying storage).
    pub entries: Arc<dyn EntryRepository>,
    /// Meaning repository (cached, wraps underlying storage).
    pub meanings: Arc<dyn MeaningRepository>,
    /// Example repository (cached, wraps underlying storage).
    pub examples: Arc<dyn ExampleRepository>,
    /// Translation repository (cached, wraps underlying storage).
    pub translations: Arc<dyn TranslationRepository>,
    /// Comments and likes (cached, process-local store).
    pub annotations: Arc<dyn AnnotationRepository>,
    /// Raw backend, used for history and shutdown.
    pub repository: Arc<dyn DictionaryRepository>,
    cache: Arc<dyn Cache>,
}

impl AppState {
    /// Connects the configured storage and cache backends.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let repository = storage::connect(&config.storage).await?;
        let cache = cache::connect(&config.cache).await?;

        Ok(Self::from_parts(repository, cache, config))
    }

    /// Wraps already opened backends in the cache-aside decorators.
    pub fn from_parts(
        repository: Arc<dyn DictionaryRepository>,
        cache: Arc<dyn Cache>,
        config: &Config,
    ) -> Self {
        let aside = CacheAside::new(
            cache.clone(),
            KeySpace::new(config.env.clone()),
            config.cache.ttls,
            config.cache.op_timeout,
        );

        tracing::info!(
            backend = repository.backend_name(),
            env = %config.env,
            "Application state ready"
        );

        Self {
            entries: Arc::new(CachedEntryRepository::new(repository.clone(), aside.clone())),
            meanings: Arc::new(CachedMeaningRepository::new(repository.clone(), aside.clone())),
            examples: Arc::new(CachedExampleRepository::new(repository.clone(), aside.clone())),
            translations: Arc::new(CachedTranslationRepository::new(
                repository.clone(),
                aside.clone(),
            )),
            annotations: Arc::new(CachedAnnotationRepository::new(
                Arc::new(InMemoryAnnotations::new()),
                aside,
            )),
            repository,
            cache,
        }
    }

    /// In-memory storage and cache, for tests.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::from_parts(
            Arc::new(storage::InMemoryRepository::new()),
            Arc::new(cache::MemoryCache::new(1_000)),
            &Config::for_tests(),
        )
    }

    /// Closes the repository and the cache.
    ///
    /// Failures are logged; shutdown continues regardless.
    pub async fn close(&self) {
        if let Err(err) = self.repository.close().await {
            tracing::error!(error = %err, "Failed to close repository");
        }
        if let Err(err) = self.cache.close().await {
            tracing::error!(error = %err, "Failed to close cache");
        }
        tracing::info!(backend = self.repository.backend_name(), "Storage closed");
    }
}
