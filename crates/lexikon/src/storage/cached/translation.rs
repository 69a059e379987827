//! Cached translation repository decorator.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use lexikon_core::cache::{Mutation, TtlTier};
use lexikon_core::dictionary::{NewTranslation, Translation, TranslationPatch};
use lexikon_core::storage::{MeaningRepository, Result, TranslationRepository};

use super::{owning_entry, CacheAside};

/// Cached translation repository decorator.
///
/// Translation lists are cached per language filter, so a mutation evicts
/// the lists of every language of the meaning.
pub struct CachedTranslationRepository<R: ?Sized> {
    repository: Arc<R>,
    cache: CacheAside,
}

impl<R: TranslationRepository + MeaningRepository + ?Sized> CachedTranslationRepository<R> {
    pub fn new(repository: Arc<R>, cache: CacheAside) -> Self {
        Self { repository, cache }
    }

    async fn invalidate(&self, translation: &Translation) {
        let entry_id =
            owning_entry(&self.cache, self.repository.as_ref(), translation.meaning_id).await;
        self.cache
            .invalidate(Mutation::Translation {
                translation,
                entry_id,
            })
            .await;
    }
}

#[async_trait]
impl<R> TranslationRepository for CachedTranslationRepository<R>
where
    R: TranslationRepository + MeaningRepository + ?Sized + 'static,
{
    async fn create_translation(
        &self,
        meaning_id: Uuid,
        translation: NewTranslation,
    ) -> Result<Translation> {
        let created = self
            .repository
            .create_translation(meaning_id, translation)
            .await?;

        self.invalidate(&created).await;
        tracing::debug!(translation_id = %created.id, %meaning_id, language = %created.language, "Translation created");
        Ok(created)
    }

    async fn get_translation(&self, id: Uuid) -> Result<Translation> {
        let key = self.cache.keys().translation(id);
        self.cache
            .get_or_load(key, TtlTier::Entity, || self.repository.get_translation(id))
            .await
    }

    async fn update_translation(&self, patch: TranslationPatch) -> Result<Translation> {
        let updated = self.repository.update_translation(patch).await?;

        self.invalidate(&updated).await;
        tracing::debug!(translation_id = %updated.id, "Translation updated");
        Ok(updated)
    }

    async fn delete_translation(&self, id: Uuid) -> Result<Translation> {
        let removed = self.repository.delete_translation(id).await?;

        self.invalidate(&removed).await;
        tracing::debug!(translation_id = %id, "Translation deleted");
        Ok(removed)
    }

    async fn list_translations(
        &self,
        meaning_id: Uuid,
        language: Option<&str>,
    ) -> Result<Vec<Translation>> {
        let key = self.cache.keys().meaning_translations(meaning_id, language);
        self.cache
            .get_or_load(key, TtlTier::Entity, || {
                self.repository.list_translations(meaning_id, language)
            })
            .await
    }
}
