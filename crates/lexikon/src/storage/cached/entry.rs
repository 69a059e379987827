//! Cached entry repository decorator.
//!
//! Entry graphs are cached whole under their point key and list pages under
//! a key derived from the canonical query.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use lexikon_core::cache::{Mutation, TtlTier};
use lexikon_core::dictionary::{Entry, EntryPatch, NewEntry};
use lexikon_core::storage::{EntryQuery, EntryRepository, Page, Result};

use super::CacheAside;

/// Cached entry repository decorator.
///
/// # Type Parameters
///
/// * `R` - The underlying repository implementation
pub struct CachedEntryRepository<R: ?Sized> {
    repository: Arc<R>,
    cache: CacheAside,
}

impl<R: EntryRepository + ?Sized> CachedEntryRepository<R> {
    pub fn new(repository: Arc<R>, cache: CacheAside) -> Self {
        Self { repository, cache }
    }
}

#[async_trait]
impl<R> EntryRepository for CachedEntryRepository<R>
where
    R: EntryRepository + ?Sized + 'static,
{
    async fn create_entry_graph(&self, entry: NewEntry) -> Result<Entry> {
        let created = self.repository.create_entry_graph(entry).await?;

        // A new entry can appear on any list page
        self.cache.invalidate(Mutation::Entry(&created)).await;
        tracing::debug!(entry_id = %created.id, word = %created.word, "Entry created");
        Ok(created)
    }

    async fn get_entry_graph(&self, id: Uuid) -> Result<Entry> {
        let key = self.cache.keys().entry(id);
        self.cache
            .get_or_load(key, TtlTier::Entity, || self.repository.get_entry_graph(id))
            .await
    }

    async fn update_entry_graph(&self, patch: EntryPatch) -> Result<Entry> {
        let updated = self.repository.update_entry_graph(patch).await?;

        self.cache.invalidate(Mutation::Entry(&updated)).await;
        tracing::debug!(entry_id = %updated.id, "Entry updated");
        Ok(updated)
    }

    async fn delete_entry_graph(&self, id: Uuid) -> Result<Entry> {
        let removed = self.repository.delete_entry_graph(id).await?;

        // The removed graph lists every descendant key to evict
        self.cache.invalidate(Mutation::Entry(&removed)).await;
        tracing::debug!(entry_id = %id, meanings = removed.meanings.len(), "Entry deleted");
        Ok(removed)
    }

    async fn list_entries(&self, query: &EntryQuery) -> Result<Page<Entry>> {
        let key = self.cache.keys().entries_list(query);
        self.cache
            .get_or_load(key, TtlTier::List, || self.repository.list_entries(query))
            .await
    }
}
