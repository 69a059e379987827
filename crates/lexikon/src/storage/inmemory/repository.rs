//! In-memory repository implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use lexikon_core::dictionary::{
    apply_example_patch, apply_translation_patch, merge_entry, merge_meaning, sort_children,
    timestamp_now, ChangeHistory, Entry, EntryPatch, Example, ExamplePatch, Meaning, MeaningPatch,
    NewEntry, NewExample, NewMeaning, NewTranslation, Translation, TranslationPatch,
};
use lexikon_core::storage::{
    DictionaryRepository, EntryQuery, EntryRepository, ExampleRepository, HistoryRepository,
    MeaningRepository, Page, RepositoryError, Result, TranslationRepository,
};

#[derive(Debug, Default)]
struct Store {
    entries: HashMap<Uuid, Entry>,
    history: Vec<ChangeHistory>,
}

/// Position of a node inside the stored graphs.
#[derive(Debug, Clone, Copy)]
struct MeaningPos {
    entry_id: Uuid,
    meaning: usize,
}

#[derive(Debug, Clone, Copy)]
struct LeafPos {
    entry_id: Uuid,
    meaning: usize,
    leaf: usize,
}

impl Store {
    fn entry(&self, id: Uuid) -> Result<&Entry> {
        self.entries
            .get(&id)
            .ok_or_else(|| RepositoryError::not_found("Entry", id))
    }

    fn find_meaning(&self, id: Uuid) -> Result<MeaningPos> {
        self.entries
            .values()
            .find_map(|entry| {
                entry
                    .meanings
                    .iter()
                    .position(|m| m.id == id)
                    .map(|meaning| MeaningPos {
                        entry_id: entry.id,
                        meaning,
                    })
            })
            .ok_or_else(|| RepositoryError::not_found("Meaning", id))
    }

    fn find_example(&self, id: Uuid) -> Result<LeafPos> {
        self.find_leaf(|m| m.examples.iter().position(|e| e.id == id))
            .ok_or_else(|| RepositoryError::not_found("Example", id))
    }

    fn find_translation(&self, id: Uuid) -> Result<LeafPos> {
        self.find_leaf(|m| m.translations.iter().position(|t| t.id == id))
            .ok_or_else(|| RepositoryError::not_found("Translation", id))
    }

    fn find_leaf(&self, position: impl Fn(&Meaning) -> Option<usize>) -> Option<LeafPos> {
        self.entries.values().find_map(|entry| {
            entry.meanings.iter().enumerate().find_map(|(meaning, m)| {
                position(m).map(|leaf| LeafPos {
                    entry_id: entry.id,
                    meaning,
                    leaf,
                })
            })
        })
    }

    fn meaning_at(&self, pos: MeaningPos) -> &Meaning {
        &self.entries[&pos.entry_id].meanings[pos.meaning]
    }

    /// Applies `change` to a copy of the entry and swaps it in only if the
    /// copy still satisfies every constraint.
    fn mutate<T>(&mut self, entry_id: Uuid, change: impl FnOnce(&mut Entry) -> Result<T>) -> Result<T> {
        let mut draft = self.entry(entry_id)?.clone();
        let out = change(&mut draft)?;
        self.commit(draft)?;
        Ok(out)
    }

    fn commit(&mut self, mut entry: Entry) -> Result<()> {
        check_languages(&entry)?;
        if let Some(other) = self
            .entries
            .values()
            .find(|e| e.id != entry.id && e.word == entry.word && e.entry_type == entry.entry_type)
        {
            return Err(RepositoryError::DuplicateKey {
                entity_type: "Entry",
                key: format!("{}/{}", other.word, other.entry_type),
            });
        }
        sort_children(&mut entry);
        self.entries.insert(entry.id, entry);
        Ok(())
    }
}

/// Mirrors `CHECK(length(language) BETWEEN 2 AND 5)` of the SQL schemas.
fn check_languages(entry: &Entry) -> Result<()> {
    let bad = entry
        .meanings
        .iter()
        .flat_map(|m| m.translations.iter())
        .find(|t| !(2..=5).contains(&t.language.chars().count()));
    match bad {
        Some(t) => Err(RepositoryError::InvalidState(format!(
            "translation language '{}' violates length check",
            t.language
        ))),
        None => Ok(()),
    }
}

/// In-memory storage backend for tests and local development.
///
/// One lock guards the whole dataset. Every mutation prepares the new
/// state on a copy and swaps it in, so a failed write leaves nothing behind.
/// Data is not persisted and will be lost when the repository is dropped.
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    store: Arc<RwLock<Store>>,
    closed: Arc<AtomicBool>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RepositoryError::InvalidState(
                "repository is closed".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EntryRepository for InMemoryRepository {
    async fn create_entry_graph(&self, entry: NewEntry) -> Result<Entry> {
        self.ensure_open()?;
        let mut entry = entry.into_entry(timestamp_now());
        sort_children(&mut entry);
        let mut store = self.store.write().await;
        store.commit(entry.clone())?;
        Ok(entry)
    }

    async fn get_entry_graph(&self, id: Uuid) -> Result<Entry> {
        self.ensure_open()?;
        let store = self.store.read().await;
        store.entry(id).cloned()
    }

    async fn update_entry_graph(&self, patch: EntryPatch) -> Result<Entry> {
        self.ensure_open()?;
        let now = timestamp_now();
        let mut store = self.store.write().await;
        store.mutate(patch.id, |draft| {
            *draft = merge_entry(draft, &patch, now)?.entry;
            Ok(())
        })?;
        store.entry(patch.id).cloned()
    }

    async fn delete_entry_graph(&self, id: Uuid) -> Result<Entry> {
        self.ensure_open()?;
        let mut store = self.store.write().await;
        store
            .entries
            .remove(&id)
            .ok_or_else(|| RepositoryError::not_found("Entry", id))
    }

    async fn list_entries(&self, query: &EntryQuery) -> Result<Page<Entry>> {
        self.ensure_open()?;
        let store = self.store.read().await;
        Ok(query.apply(store.entries.values().cloned()))
    }
}

#[async_trait]
impl MeaningRepository for InMemoryRepository {
    async fn create_meaning(&self, entry_id: Uuid, meaning: NewMeaning) -> Result<Meaning> {
        self.ensure_open()?;
        let meaning = meaning.into_meaning(entry_id, timestamp_now());
        let mut store = self.store.write().await;
        store.mutate(entry_id, |draft| {
            draft.meanings.push(meaning.clone());
            Ok(())
        })?;
        Ok(meaning)
    }

    async fn get_meaning(&self, id: Uuid) -> Result<Meaning> {
        self.ensure_open()?;
        let store = self.store.read().await;
        let pos = store.find_meaning(id)?;
        Ok(store.meaning_at(pos).clone())
    }

    async fn update_meaning(&self, patch: MeaningPatch) -> Result<Meaning> {
        self.ensure_open()?;
        let id = patch
            .id
            .ok_or_else(|| RepositoryError::InvalidState("meaning patch requires an id".into()))?;
        let now = timestamp_now();
        let mut store = self.store.write().await;
        let pos = store.find_meaning(id)?;
        store.mutate(pos.entry_id, |draft| {
            let merged = merge_meaning(&draft.meanings[pos.meaning], &patch, now)?;
            draft.meanings[pos.meaning] = merged.meaning;
            Ok(())
        })?;
        // Sorting may have moved it
        let pos = store.find_meaning(id)?;
        Ok(store.meaning_at(pos).clone())
    }

    async fn delete_meaning(&self, id: Uuid) -> Result<Meaning> {
        self.ensure_open()?;
        let mut store = self.store.write().await;
        let pos = store.find_meaning(id)?;
        store.mutate(pos.entry_id, |draft| Ok(draft.meanings.remove(pos.meaning)))
    }

    async fn list_meanings(&self, entry_id: Uuid) -> Result<Vec<Meaning>> {
        self.ensure_open()?;
        let store = self.store.read().await;
        Ok(store.entry(entry_id)?.meanings.clone())
    }
}

#[async_trait]
impl ExampleRepository for InMemoryRepository {
    async fn create_example(&self, meaning_id: Uuid, example: NewExample) -> Result<Example> {
        self.ensure_open()?;
        let example = example.into_example(meaning_id, timestamp_now());
        let mut store = self.store.write().await;
        let pos = store.find_meaning(meaning_id)?;
        store.mutate(pos.entry_id, |draft| {
            draft.meanings[pos.meaning].examples.push(example.clone());
            Ok(())
        })?;
        Ok(example)
    }

    async fn get_example(&self, id: Uuid) -> Result<Example> {
        self.ensure_open()?;
        let store = self.store.read().await;
        let pos = store.find_example(id)?;
        Ok(store.entries[&pos.entry_id].meanings[pos.meaning].examples[pos.leaf].clone())
    }

    async fn update_example(&self, patch: ExamplePatch) -> Result<Example> {
        self.ensure_open()?;
        let id = patch
            .id
            .ok_or_else(|| RepositoryError::InvalidState("example patch requires an id".into()))?;
        let now = timestamp_now();
        let mut store = self.store.write().await;
        let pos = store.find_example(id)?;
        store.mutate(pos.entry_id, |draft| {
            let example = &mut draft.meanings[pos.meaning].examples[pos.leaf];
            apply_example_patch(example, &patch, now);
            Ok(example.clone())
        })
    }

    async fn delete_example(&self, id: Uuid) -> Result<Example> {
        self.ensure_open()?;
        let mut store = self.store.write().await;
        let pos = store.find_example(id)?;
        store.mutate(pos.entry_id, |draft| {
            Ok(draft.meanings[pos.meaning].examples.remove(pos.leaf))
        })
    }

    async fn list_examples(&self, meaning_id: Uuid) -> Result<Vec<Example>> {
        self.ensure_open()?;
        let store = self.store.read().await;
        let pos = store.find_meaning(meaning_id)?;
        Ok(store.meaning_at(pos).examples.clone())
    }
}

#[async_trait]
impl TranslationRepository for InMemoryRepository {
    async fn create_translation(
        &self,
        meaning_id: Uuid,
        translation: NewTranslation,
    ) -> Result<Translation> {
        self.ensure_open()?;
        let translation = translation.into_translation(meaning_id, timestamp_now());
        let mut store = self.store.write().await;
        let pos = store.find_meaning(meaning_id)?;
        store.mutate(pos.entry_id, |draft| {
            draft.meanings[pos.meaning]
                .translations
                .push(translation.clone());
            Ok(())
        })?;
        Ok(translation)
    }

    async fn get_translation(&self, id: Uuid) -> Result<Translation> {
        self.ensure_open()?;
        let store = self.store.read().await;
        let pos = store.find_translation(id)?;
        Ok(store.entries[&pos.entry_id].meanings[pos.meaning].translations[pos.leaf].clone())
    }

    async fn update_translation(&self, patch: TranslationPatch) -> Result<Translation> {
        self.ensure_open()?;
        let id = patch.id.ok_or_else(|| {
            RepositoryError::InvalidState("translation patch requires an id".into())
        })?;
        let now = timestamp_now();
        let mut store = self.store.write().await;
        let pos = store.find_translation(id)?;
        store.mutate(pos.entry_id, |draft| {
            let translation = &mut draft.meanings[pos.meaning].translations[pos.leaf];
            apply_translation_patch(translation, &patch, now);
            Ok(translation.clone())
        })
    }

    async fn delete_translation(&self, id: Uuid) -> Result<Translation> {
        self.ensure_open()?;
        let mut store = self.store.write().await;
        let pos = store.find_translation(id)?;
        store.mutate(pos.entry_id, |draft| {
            Ok(draft.meanings[pos.meaning].translations.remove(pos.leaf))
        })
    }

    async fn list_translations(
        &self,
        meaning_id: Uuid,
        language: Option<&str>,
    ) -> Result<Vec<Translation>> {
        self.ensure_open()?;
        let store = self.store.read().await;
        let pos = store.find_meaning(meaning_id)?;
        Ok(store
            .meaning_at(pos)
            .translations
            .iter()
            .filter(|t| language.is_none_or(|l| t.language.eq_ignore_ascii_case(l)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HistoryRepository for InMemoryRepository {
    async fn record_change(&self, change: &ChangeHistory) -> Result<()> {
        self.ensure_open()?;
        self.store.write().await.history.push(change.clone());
        Ok(())
    }

    async fn list_changes(&self, entry_id: Uuid) -> Result<Vec<ChangeHistory>> {
        self.ensure_open()?;
        let store = self.store.read().await;
        let mut changes: Vec<ChangeHistory> = store
            .history
            .iter()
            .filter(|c| c.entry_id == entry_id)
            .cloned()
            .collect();
        changes.sort_by_key(|c| (c.created_at, c.id));
        Ok(changes)
    }
}

#[async_trait]
impl DictionaryRepository for InMemoryRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexikon_core::dictionary::{ChangeAction, EntryType};

    fn apple() -> NewEntry {
        NewEntry::new("apple", EntryType::Word).with_meaning(
            NewMeaning::new(Uuid::new_v4(), "a fruit")
                .with_example(NewExample::new("An apple a day"))
                .with_translation(NewTranslation::new("es", "manzana")),
        )
    }

    #[tokio::test]
    async fn test_create_and_get_graph() {
        let repo = InMemoryRepository::new();

        let created = repo.create_entry_graph(apple()).await.unwrap();
        let fetched = repo.get_entry_graph(created.id).await.unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.node_count(), 4);
    }

    #[tokio::test]
    async fn test_duplicate_word_and_type_rejected() {
        let repo = InMemoryRepository::new();
        repo.create_entry_graph(apple()).await.unwrap();

        let err = repo.create_entry_graph(apple()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateKey { .. }));

        // Same word, different type is fine
        repo.create_entry_graph(NewEntry::new("apple", EntryType::Phrase))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_graph_write_leaves_nothing() {
        let repo = InMemoryRepository::new();
        let bad = NewEntry::new("pear", EntryType::Word).with_meaning(
            NewMeaning::new(Uuid::new_v4(), "a fruit")
                .with_translation(NewTranslation::new("x", "pera")),
        );

        let err = repo.create_entry_graph(bad).await.unwrap_err();

        assert!(matches!(err, RepositoryError::InvalidState(_)));
        let page = repo.list_entries(&EntryQuery::new()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_graph() {
        let repo = InMemoryRepository::new();
        let entry = repo.create_entry_graph(apple()).await.unwrap();
        let meaning_id = entry.meanings[0].id;
        let patch = EntryPatch::new(entry.id).with_word("apples").with_meaning(
            MeaningPatch::existing(meaning_id)
                .with_translation(TranslationPatch::create("toolong", "x")),
        );

        assert!(repo.update_entry_graph(patch).await.is_err());

        assert_eq!(repo.get_entry_graph(entry.id).await.unwrap(), entry);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_children() {
        let repo = InMemoryRepository::new();
        let entry = repo.create_entry_graph(apple()).await.unwrap();
        let meaning = &entry.meanings[0];

        let removed = repo.delete_entry_graph(entry.id).await.unwrap();

        assert_eq!(removed, entry);
        assert!(matches!(
            repo.get_meaning(meaning.id).await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(repo.get_example(meaning.examples[0].id).await.is_err());
        assert!(repo.get_translation(meaning.translations[0].id).await.is_err());
    }

    #[tokio::test]
    async fn test_child_create_requires_parent() {
        let repo = InMemoryRepository::new();

        let err = repo
            .create_example(Uuid::new_v4(), NewExample::new("orphan"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RepositoryError::NotFound {
                entity_type: "Meaning",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_list_translations_by_language() {
        let repo = InMemoryRepository::new();
        let entry = repo.create_entry_graph(apple()).await.unwrap();
        let meaning_id = entry.meanings[0].id;
        repo.create_translation(meaning_id, NewTranslation::new("fr", "pomme"))
            .await
            .unwrap();

        let all = repo.list_translations(meaning_id, None).await.unwrap();
        let french = repo.list_translations(meaning_id, Some("FR")).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(french.len(), 1);
        assert_eq!(french[0].text, "pomme");
    }

    #[tokio::test]
    async fn test_history_survives_delete() {
        let repo = InMemoryRepository::new();
        let entry = repo.create_entry_graph(apple()).await.unwrap();
        repo.record_change(&ChangeHistory::new(
            entry.id,
            ChangeAction::Create,
            serde_json::json!({ "word": "apple" }),
            None,
        ))
        .await
        .unwrap();

        repo.delete_entry_graph(entry.id).await.unwrap();

        let changes = repo.list_changes(entry.id).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Create);
    }

    #[tokio::test]
    async fn test_writes_after_close_fail() {
        let repo = InMemoryRepository::new();
        repo.close().await.unwrap();

        let err = repo.create_entry_graph(apple()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidState(_)));
    }
}
