use async_trait::async_trait;
use uuid::Uuid;

use crate::dictionary::{
    ChangeHistory, Comment, Entry, EntryPatch, Example, ExamplePatch, Meaning, MeaningPatch,
    NewEntry, NewExample, NewMeaning, NewTranslation, Translation, TranslationPatch,
};

use super::{EntryQuery, Page, Pagination, Result};

/// Repository for whole entry graphs.
///
/// Every mutation is atomic: either the full subtree is written or nothing is.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Creates an entry and its subtree, assigning ids and timestamps.
    async fn create_entry_graph(&self, entry: NewEntry) -> Result<Entry>;

    /// Gets an entry with all meanings, examples and translations.
    async fn get_entry_graph(&self, id: Uuid) -> Result<Entry>;

    /// Applies a sparse patch and returns the full graph afterwards.
    async fn update_entry_graph(&self, patch: EntryPatch) -> Result<Entry>;

    /// Deletes an entry and its subtree, returning what was removed.
    async fn delete_entry_graph(&self, id: Uuid) -> Result<Entry>;

    /// Lists entries matching a query.
    async fn list_entries(&self, query: &EntryQuery) -> Result<Page<Entry>>;
}

/// Repository for meanings as individual nodes.
#[async_trait]
pub trait MeaningRepository: Send + Sync {
    async fn create_meaning(&self, entry_id: Uuid, meaning: NewMeaning) -> Result<Meaning>;

    async fn get_meaning(&self, id: Uuid) -> Result<Meaning>;

    /// Applies a sparse patch. The patch must carry the meaning id.
    async fn update_meaning(&self, patch: MeaningPatch) -> Result<Meaning>;

    /// Deletes a meaning and its children, returning the removed subtree.
    async fn delete_meaning(&self, id: Uuid) -> Result<Meaning>;

    /// Lists the meanings of an entry. Unknown entry is `NotFound`.
    async fn list_meanings(&self, entry_id: Uuid) -> Result<Vec<Meaning>>;
}

#[async_trait]
pub trait ExampleRepository: Send + Sync {
    async fn create_example(&self, meaning_id: Uuid, example: NewExample) -> Result<Example>;

    async fn get_example(&self, id: Uuid) -> Result<Example>;

    async fn update_example(&self, patch: ExamplePatch) -> Result<Example>;

    async fn delete_example(&self, id: Uuid) -> Result<Example>;

    async fn list_examples(&self, meaning_id: Uuid) -> Result<Vec<Example>>;
}

#[async_trait]
pub trait TranslationRepository: Send + Sync {
    async fn create_translation(
        &self,
        meaning_id: Uuid,
        translation: NewTranslation,
    ) -> Result<Translation>;

    async fn get_translation(&self, id: Uuid) -> Result<Translation>;

    async fn update_translation(&self, patch: TranslationPatch) -> Result<Translation>;

    async fn delete_translation(&self, id: Uuid) -> Result<Translation>;

    /// Lists translations of a meaning, optionally restricted to one language.
    async fn list_translations(
        &self,
        meaning_id: Uuid,
        language: Option<&str>,
    ) -> Result<Vec<Translation>>;
}

/// Append-only audit trail of entry mutations.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn record_change(&self, change: &ChangeHistory) -> Result<()>;

    /// Lists changes for an entry, oldest first. Deleted entries keep their history.
    async fn list_changes(&self, entry_id: Uuid) -> Result<Vec<ChangeHistory>>;
}

/// Comments and likes attached to entries.
#[async_trait]
pub trait AnnotationRepository: Send + Sync {
    async fn add_comment(&self, entry_id: Uuid, user_id: Uuid, body: String) -> Result<Comment>;

    /// Lists comments of an entry, oldest first.
    async fn list_comments(&self, entry_id: Uuid, page: Pagination) -> Result<Page<Comment>>;

    async fn delete_comment(&self, id: Uuid) -> Result<Comment>;

    /// Records a like. Returns false if the user already liked the entry.
    async fn like(&self, entry_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Removes a like. Returns false if there was none.
    async fn unlike(&self, entry_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn count_likes(&self, entry_id: Uuid) -> Result<u64>;

    /// Removes every comment and like of an entry. Returns how many
    /// annotations were removed.
    async fn purge_entry(&self, entry_id: Uuid) -> Result<u64>;
}

/// Everything a storage backend provides.
#[async_trait]
pub trait DictionaryRepository:
    EntryRepository + MeaningRepository + ExampleRepository + TranslationRepository + HistoryRepository
{
    /// Short backend name used in logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Releases connections. Later writes fail with `InvalidState`.
    async fn close(&self) -> Result<()>;
}
