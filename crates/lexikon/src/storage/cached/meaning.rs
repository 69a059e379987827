//! Cached meaning repository decorator.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use lexikon_core::cache::{Mutation, TtlTier};
use lexikon_core::dictionary::{Meaning, MeaningPatch, NewMeaning};
use lexikon_core::storage::{MeaningRepository, Result};

use super::CacheAside;

/// Cached meaning repository decorator.
///
/// A meaning is cached with its examples and translations embedded, and
/// the meaning list of an entry under the entry's `meanings` key.
pub struct CachedMeaningRepository<R: ?Sized> {
    repository: Arc<R>,
    cache: CacheAside,
}

impl<R: MeaningRepository + ?Sized> CachedMeaningRepository<R> {
    pub fn new(repository: Arc<R>, cache: CacheAside) -> Self {
        Self { repository, cache }
    }
}

#[async_trait]
impl<R> MeaningRepository for CachedMeaningRepository<R>
where
    R: MeaningRepository + ?Sized + 'static,
{
    async fn create_meaning(&self, entry_id: Uuid, meaning: NewMeaning) -> Result<Meaning> {
        let created = self.repository.create_meaning(entry_id, meaning).await?;

        self.cache.invalidate(Mutation::Meaning(&created)).await;
        tracing::debug!(meaning_id = %created.id, %entry_id, "Meaning created");
        Ok(created)
    }

    async fn get_meaning(&self, id: Uuid) -> Result<Meaning> {
        let key = self.cache.keys().meaning(id);
        self.cache
            .get_or_load(key, TtlTier::Entity, || self.repository.get_meaning(id))
            .await
    }

    async fn update_meaning(&self, patch: MeaningPatch) -> Result<Meaning> {
        let updated = self.repository.update_meaning(patch).await?;

        self.cache.invalidate(Mutation::Meaning(&updated)).await;
        tracing::debug!(meaning_id = %updated.id, "Meaning updated");
        Ok(updated)
    }

    async fn delete_meaning(&self, id: Uuid) -> Result<Meaning> {
        let removed = self.repository.delete_meaning(id).await?;

        self.cache.invalidate(Mutation::Meaning(&removed)).await;
        tracing::debug!(meaning_id = %id, entry_id = %removed.entry_id, "Meaning deleted");
        Ok(removed)
    }

    async fn list_meanings(&self, entry_id: Uuid) -> Result<Vec<Meaning>> {
        let key = self.cache.keys().entry_meanings(entry_id);
        self.cache
            .get_or_load(key, TtlTier::Entity, || {
                self.repository.list_meanings(entry_id)
            })
            .await
    }
}
