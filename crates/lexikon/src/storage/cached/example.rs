//! Cached example repository decorator.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use lexikon_core::cache::{Mutation, TtlTier};
use lexikon_core::dictionary::{Example, ExamplePatch, NewExample};
use lexikon_core::storage::{ExampleRepository, MeaningRepository, Result};

use super::{owning_entry, CacheAside};

/// Cached example repository decorator.
///
/// Mutations also evict the owning entry, which is looked up through the
/// meaning repository.
pub struct CachedExampleRepository<R: ?Sized> {
    repository: Arc<R>,
    cache: CacheAside,
}

impl<R: ExampleRepository + MeaningRepository + ?Sized> CachedExampleRepository<R> {
    pub fn new(repository: Arc<R>, cache: CacheAside) -> Self {
        Self { repository, cache }
    }

    async fn invalidate(&self, example: &Example) {
        let entry_id = owning_entry(&self.cache, self.repository.as_ref(), example.meaning_id).await;
        self.cache
            .invalidate(Mutation::Example { example, entry_id })
            .await;
    }
}

#[async_trait]
impl<R> ExampleRepository for CachedExampleRepository<R>
where
    R: ExampleRepository + MeaningRepository + ?Sized + 'static,
{
    async fn create_example(&self, meaning_id: Uuid, example: NewExample) -> Result<Example> {
        let created = self.repository.create_example(meaning_id, example).await?;

        self.invalidate(&created).await;
        tracing::debug!(example_id = %created.id, %meaning_id, "Example created");
        Ok(created)
    }

    async fn get_example(&self, id: Uuid) -> Result<Example> {
        let key = self.cache.keys().example(id);
        self.cache
            .get_or_load(key, TtlTier::Entity, || self.repository.get_example(id))
            .await
    }

    async fn update_example(&self, patch: ExamplePatch) -> Result<Example> {
        let updated = self.repository.update_example(patch).await?;

        self.invalidate(&updated).await;
        tracing::debug!(example_id = %updated.id, "Example updated");
        Ok(updated)
    }

    async fn delete_example(&self, id: Uuid) -> Result<Example> {
        let removed = self.repository.delete_example(id).await?;

        self.invalidate(&removed).await;
        tracing::debug!(example_id = %id, "Example deleted");
        Ok(removed)
    }

    async fn list_examples(&self, meaning_id: Uuid) -> Result<Vec<Example>> {
        let key = self.cache.keys().meaning_examples(meaning_id);
        self.cache
            .get_or_load(key, TtlTier::Entity, || {
                self.repository.list_examples(meaning_id)
            })
            .await
    }
}
