//! Test doubles shared by the decorator tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use lexikon_core::cache::{Cache, CacheError, CacheTtls, KeySpace, Result as CacheResult};
use lexikon_core::dictionary::{
    ChangeHistory, Comment, Entry, EntryPatch, Example, ExamplePatch, Meaning, MeaningPatch,
    NewEntry, NewExample, NewMeaning, NewTranslation, Translation, TranslationPatch,
};
use lexikon_core::storage::{
    AnnotationRepository, DictionaryRepository, EntryQuery, EntryRepository, ExampleRepository,
    HistoryRepository, MeaningRepository, Page, Pagination, RepositoryError, Result,
    TranslationRepository,
};

use super::CacheAside;
use crate::storage::inmemory::{InMemoryAnnotations, InMemoryRepository};

/// Decorator cache in the `test` namespace with default TTLs.
pub fn aside(cache: Arc<dyn Cache>) -> CacheAside {
    aside_with_ttls(cache, CacheTtls::default())
}

pub fn aside_with_ttls(cache: Arc<dyn Cache>, ttls: CacheTtls) -> CacheAside {
    CacheAside::new(cache, KeySpace::new("test"), ttls, Duration::from_millis(50))
}

/// In-memory repository that counts read calls and can be told to fail writes.
#[derive(Default)]
pub struct CountingRepository {
    inner: InMemoryRepository,
    annotations: InMemoryAnnotations,
    reads: AtomicUsize,
    fail_writes: AtomicBool,
}

impl CountingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read operations that reached the repository.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::storage("write", "mock", "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl EntryRepository for CountingRepository {
    async fn create_entry_graph(&self, entry: NewEntry) -> Result<Entry> {
        self.write()?;
        self.inner.create_entry_graph(entry).await
    }

    async fn get_entry_graph(&self, id: Uuid) -> Result<Entry> {
        self.read();
        self.inner.get_entry_graph(id).await
    }

    async fn update_entry_graph(&self, patch: EntryPatch) -> Result<Entry> {
        self.write()?;
        self.inner.update_entry_graph(patch).await
    }

    async fn delete_entry_graph(&self, id: Uuid) -> Result<Entry> {
        self.write()?;
        self.inner.delete_entry_graph(id).await
    }

    async fn list_entries(&self, query: &EntryQuery) -> Result<Page<Entry>> {
        self.read();
        self.inner.list_entries(query).await
    }
}

#[async_trait]
impl MeaningRepository for CountingRepository {
    async fn create_meaning(&self, entry_id: Uuid, meaning: NewMeaning) -> Result<Meaning> {
        self.write()?;
        self.inner.create_meaning(entry_id, meaning).await
    }

    async fn get_meaning(&self, id: Uuid) -> Result<Meaning> {
        self.read();
        self.inner.get_meaning(id).await
    }

    async fn update_meaning(&self, patch: MeaningPatch) -> Result<Meaning> {
        self.write()?;
        self.inner.update_meaning(patch).await
    }

    async fn delete_meaning(&self, id: Uuid) -> Result<Meaning> {
        self.write()?;
        self.inner.delete_meaning(id).await
    }

    async fn list_meanings(&self, entry_id: Uuid) -> Result<Vec<Meaning>> {
        self.read();
        self.inner.list_meanings(entry_id).await
    }
}

#[async_trait]
impl ExampleRepository for CountingRepository {
    async fn create_example(&self, meaning_id: Uuid, example: NewExample) -> Result<Example> {
        self.write()?;
        self.inner.create_example(meaning_id, example).await
    }

    async fn get_example(&self, id: Uuid) -> Result<Example> {
        self.read();
        self.inner.get_example(id).await
    }

    async fn update_example(&self, patch: ExamplePatch) -> Result<Example> {
        self.write()?;
        self.inner.update_example(patch).await
    }

    async fn delete_example(&self, id: Uuid) -> Result<Example> {
        self.write()?;
        self.inner.delete_example(id).await
    }

    async fn list_examples(&self, meaning_id: Uuid) -> Result<Vec<Example>> {
        self.read();
        self.inner.list_examples(meaning_id).await
    }
}

#[async_trait]
impl TranslationRepository for CountingRepository {
    async fn create_translation(
        &self,
        meaning_id: Uuid,
        translation: NewTranslation,
    ) -> Result<Translation> {
        self.write()?;
        self.inner.create_translation(meaning_id, translation).await
    }

    async fn get_translation(&self, id: Uuid) -> Result<Translation> {
        self.read();
        self.inner.get_translation(id).await
    }

    async fn update_translation(&self, patch: TranslationPatch) -> Result<Translation> {
        self.write()?;
        self.inner.update_translation(patch).await
    }

    async fn delete_translation(&self, id: Uuid) -> Result<Translation> {
        self.write()?;
        self.inner.delete_translation(id).await
    }

    async fn list_translations(
        &self,
        meaning_id: Uuid,
        language: Option<&str>,
    ) -> Result<Vec<Translation>> {
        self.read();
        self.inner.list_translations(meaning_id, language).await
    }
}

#[async_trait]
impl HistoryRepository for CountingRepository {
    async fn record_change(&self, change: &ChangeHistory) -> Result<()> {
        self.inner.record_change(change).await
    }

    async fn list_changes(&self, entry_id: Uuid) -> Result<Vec<ChangeHistory>> {
        self.inner.list_changes(entry_id).await
    }
}

#[async_trait]
impl DictionaryRepository for CountingRepository {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

#[async_trait]
impl AnnotationRepository for CountingRepository {
    async fn add_comment(&self, entry_id: Uuid, user_id: Uuid, body: String) -> Result<Comment> {
        self.write()?;
        self.annotations.add_comment(entry_id, user_id, body).await
    }

    async fn list_comments(&self, entry_id: Uuid, page: Pagination) -> Result<Page<Comment>> {
        self.read();
        self.annotations.list_comments(entry_id, page).await
    }

    async fn delete_comment(&self, id: Uuid) -> Result<Comment> {
        self.write()?;
        self.annotations.delete_comment(id).await
    }

    async fn like(&self, entry_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.write()?;
        self.annotations.like(entry_id, user_id).await
    }

    async fn unlike(&self, entry_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.write()?;
        self.annotations.unlike(entry_id, user_id).await
    }

    async fn count_likes(&self, entry_id: Uuid) -> Result<u64> {
        self.read();
        self.annotations.count_likes(entry_id).await
    }

    async fn purge_entry(&self, entry_id: Uuid) -> Result<u64> {
        self.write()?;
        self.annotations.purge_entry(entry_id).await
    }
}

/// Cache whose every call fails.
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> CacheResult<()> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }

    async fn delete_pattern(&self, _pattern: &str) -> CacheResult<()> {
        Err(CacheError::ConnectionFailed("unreachable".to_string()))
    }

    async fn close(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Cache that answers every call after `delay`.
pub struct SlowCache {
    delay: Duration,
}

impl SlowCache {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Cache for SlowCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        tokio::time::sleep(self.delay).await;
        Ok(false)
    }

    async fn delete_pattern(&self, _pattern: &str) -> CacheResult<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        Ok(())
    }
}
