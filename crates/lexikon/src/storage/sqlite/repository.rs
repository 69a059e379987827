//! SQLite repository implementation.
//!
//! One writer connection serializes every mutation; reads go through a
//! second connection and never wait on it (WAL). Each mutation is a single
//! `BEGIN IMMEDIATE` transaction that is re-run as a whole when SQLite
//! reports lock contention.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{functions::FunctionFlags, params, OptionalExtension, TransactionBehavior};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use lexikon_core::dictionary::{
    apply_example_patch, apply_translation_patch, merge_entry, merge_meaning, timestamp_now,
    ChangeHistory, Entry, EntryPatch, Example, ExamplePatch, Meaning, MeaningPatch, NewEntry,
    NewExample, NewMeaning, NewTranslation, NodeChange, Translation, TranslationPatch,
};
use lexikon_core::storage::{
    DictionaryRepository, EntryQuery, EntryRepository, ExampleRepository, HistoryRepository,
    MeaningRepository, Page, RepositoryError, Result, RetryPolicy, TranslationRepository,
};

use super::conversions::{
    format_datetime, row_to_change, row_to_entry, row_to_example, row_to_meaning,
    row_to_translation,
};
use super::error::{map_call_error, SqlContext};
use super::schema;

/// Statement logger installed when debug logging is on.
fn log_statement(sql: &str) {
    tracing::debug!(target: "lexikon::sql", sql = sql.trim(), "SQLite statement");
}

fn configure(conn: &mut rusqlite::Connection, writer: bool, debug: bool) -> rusqlite::Result<()> {
    // Reports "memory" instead of "wal" for in-memory databases
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.create_scalar_function(
        schema::UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    if writer {
        // Contention surfaces immediately; the retry loop owns the waiting
        conn.busy_timeout(Duration::ZERO)?;
    }
    if debug {
        conn.trace(Some(log_statement));
    }
    Ok(())
}

/// SQLite-based repository implementation.
pub struct SqliteRepository {
    writer: Connection,
    reader: Connection,
    retry: RetryPolicy,
    closed: AtomicBool,
}

impl SqliteRepository {
    /// Opens (or creates) a file-based database and applies the schema.
    pub async fn new(path: &str, debug: bool) -> Result<Self> {
        if path == ":memory:" {
            return Self::new_in_memory().await;
        }
        let writer = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::storage("open", "database", e.to_string()))?;
        Self::init(&writer, true, debug).await?;

        let reader = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::storage("open", "database", e.to_string()))?;
        Self::init(&reader, false, debug).await?;
        reader
            .call(|conn| {
                conn.pragma_update(None, "query_only", "ON")?;
                Ok(())
            })
            .await
            .map_err(map_call_error)?;

        tracing::info!(path, "SQLite repository opened");
        Ok(Self::from_connections(writer, reader))
    }

    /// Creates a repository over a private in-memory database.
    ///
    /// Reads share the writer connection because an in-memory database is
    /// only visible to the connection that created it.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RepositoryError::storage("open", "database", e.to_string()))?;
        Self::init(&conn, true, false).await?;
        Ok(Self::from_connections(conn.clone(), conn))
    }

    /// Replaces the retry schedule for lock contention.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn from_connections(writer: Connection, reader: Connection) -> Self {
        Self {
            writer,
            reader,
            retry: RetryPolicy::default(),
            closed: AtomicBool::new(false),
        }
    }

    async fn init(conn: &Connection, writer: bool, debug: bool) -> Result<()> {
        conn.call(move |conn| {
            configure(conn, writer, debug)?;
            if writer {
                conn.execute_batch(schema::CREATE_TABLES)?;
            }
            Ok(())
        })
        .await
        .map_err(map_call_error)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RepositoryError::InvalidState(
                "repository is closed".to_string(),
            ));
        }
        Ok(())
    }

    /// Runs `work` inside one `BEGIN IMMEDIATE` transaction on the writer.
    ///
    /// A `TransientConflict` rolls the transaction back and re-runs the whole
    /// unit after the next backoff delay. The sleep happens here, outside the
    /// connection thread, so no lock is held while waiting.
    async fn write<T, F>(&self, operation: &'static str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&rusqlite::Transaction<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let work = Arc::new(work);
        let mut retry = 0;

        loop {
            let attempt = Arc::clone(&work);
            let outcome = self
                .writer
                .call(move |conn| Ok(run_immediate(conn, attempt.as_ref())))
                .await
                .map_err(map_call_error)?;

            match outcome {
                Err(err) if err.is_transient() => {
                    retry += 1;
                    let Some(delay) = self.retry.delay_for(retry) else {
                        tracing::warn!(operation, retries = self.retry.max_retries, error = %err, "SQLite write gave up");
                        return Err(RepositoryError::storage(
                            operation,
                            "transaction",
                            format!("still locked after {} retries: {err}", self.retry.max_retries),
                        ));
                    };
                    tracing::debug!(operation, retry, delay_ms = delay.as_millis() as u64, "SQLite busy, retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Runs `work` inside a read transaction on the reader connection, so a
    /// graph is loaded from one snapshot.
    async fn read<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        self.ensure_open()?;
        self.reader
            .call(move |conn| Ok(run_snapshot(conn, work)))
            .await
            .map_err(map_call_error)?
    }
}

fn run_immediate<T>(
    conn: &mut rusqlite::Connection,
    work: &dyn Fn(&rusqlite::Transaction<'_>) -> Result<T>,
) -> Result<T> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("begin", "transaction")?;
    let out = work(&tx)?;
    tx.commit().context("commit", "transaction")?;
    Ok(out)
}

fn run_snapshot<T>(
    conn: &mut rusqlite::Connection,
    work: impl FnOnce(&rusqlite::Connection) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction().context("begin", "transaction")?;
    work(&tx)
}

// ============================================================================
// Row-level helpers shared by reads and writes
// ============================================================================

fn ensure_exists(
    conn: &rusqlite::Connection,
    sql: &str,
    table: &'static str,
    entity_type: &'static str,
    id: Uuid,
) -> Result<()> {
    conn.query_row(sql, [id.to_string()], |_| Ok(()))
        .optional()
        .context("select", table)?
        .ok_or_else(|| RepositoryError::not_found(entity_type, id))
}

fn load_entry(conn: &rusqlite::Connection, id: Uuid) -> Result<Entry> {
    let mut entry = conn
        .query_row(schema::SELECT_ENTRY_BY_ID, [id.to_string()], row_to_entry)
        .optional()
        .context("select", "entries")?
        .ok_or_else(|| RepositoryError::not_found("Entry", id))?;
    entry.meanings = load_meanings(conn, id)?;
    Ok(entry)
}

fn load_meanings(conn: &rusqlite::Connection, entry_id: Uuid) -> Result<Vec<Meaning>> {
    let mut stmt = conn
        .prepare_cached(schema::SELECT_MEANINGS_BY_ENTRY)
        .context("prepare", "meanings")?;
    let meanings = stmt
        .query_map([entry_id.to_string()], row_to_meaning)
        .context("select", "meanings")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("select", "meanings")?;
    meanings
        .into_iter()
        .map(|meaning| with_children(conn, meaning))
        .collect()
}

fn load_meaning(conn: &rusqlite::Connection, id: Uuid) -> Result<Meaning> {
    let meaning = conn
        .query_row(schema::SELECT_MEANING_BY_ID, [id.to_string()], row_to_meaning)
        .optional()
        .context("select", "meanings")?
        .ok_or_else(|| RepositoryError::not_found("Meaning", id))?;
    with_children(conn, meaning)
}

fn with_children(conn: &rusqlite::Connection, mut meaning: Meaning) -> Result<Meaning> {
    meaning.examples = load_examples(conn, meaning.id)?;
    meaning.translations = load_translations(conn, meaning.id, None)?;
    Ok(meaning)
}

fn load_examples(conn: &rusqlite::Connection, meaning_id: Uuid) -> Result<Vec<Example>> {
    let mut stmt = conn
        .prepare_cached(schema::SELECT_EXAMPLES_BY_MEANING)
        .context("prepare", "examples")?;
    let rows = stmt
        .query_map([meaning_id.to_string()], row_to_example)
        .context("select", "examples")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("select", "examples")
}

fn load_translations(
    conn: &rusqlite::Connection,
    meaning_id: Uuid,
    language: Option<&str>,
) -> Result<Vec<Translation>> {
    let mut stmt = conn
        .prepare_cached(schema::SELECT_TRANSLATIONS_BY_MEANING)
        .context("prepare", "translations")?;
    let rows = stmt
        .query_map(params![meaning_id.to_string(), language], row_to_translation)
        .context("select", "translations")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("select", "translations")
}

fn load_example(conn: &rusqlite::Connection, id: Uuid) -> Result<Example> {
    conn.query_row(schema::SELECT_EXAMPLE_BY_ID, [id.to_string()], row_to_example)
        .optional()
        .context("select", "examples")?
        .ok_or_else(|| RepositoryError::not_found("Example", id))
}

fn load_translation(conn: &rusqlite::Connection, id: Uuid) -> Result<Translation> {
    conn.query_row(
        schema::SELECT_TRANSLATION_BY_ID,
        [id.to_string()],
        row_to_translation,
    )
    .optional()
    .context("select", "translations")?
    .ok_or_else(|| RepositoryError::not_found("Translation", id))
}

fn insert_entry_row(conn: &rusqlite::Connection, entry: &Entry) -> Result<()> {
    conn.execute(
        schema::INSERT_ENTRY,
        params![
            entry.id.to_string(),
            entry.word,
            entry.entry_type.as_str(),
            entry.pronunciation,
            format_datetime(&entry.created_at),
            format_datetime(&entry.updated_at),
        ],
    )
    .context("insert", "entries")
    .map_err(|e| duplicate_word(e, entry))?;
    Ok(())
}

fn update_entry_row(conn: &rusqlite::Connection, entry: &Entry) -> Result<()> {
    conn.execute(
        schema::UPDATE_ENTRY,
        params![
            entry.id.to_string(),
            entry.word,
            entry.entry_type.as_str(),
            entry.pronunciation,
            format_datetime(&entry.updated_at),
        ],
    )
    .context("update", "entries")
    .map_err(|e| duplicate_word(e, entry))?;
    Ok(())
}

/// Replaces the driver message with the natural key that collided.
fn duplicate_word(err: RepositoryError, entry: &Entry) -> RepositoryError {
    match err {
        RepositoryError::DuplicateKey { entity_type, .. } => RepositoryError::DuplicateKey {
            entity_type,
            key: format!("{}/{}", entry.word, entry.entry_type),
        },
        other => other,
    }
}

/// Inserts a meaning together with all of its children.
fn insert_meaning_tree(conn: &rusqlite::Connection, meaning: &Meaning) -> Result<()> {
    write_meaning(conn, meaning, NodeChange::Insert)?;
    for example in &meaning.examples {
        write_example(conn, example, NodeChange::Insert)?;
    }
    for translation in &meaning.translations {
        write_translation(conn, translation, NodeChange::Insert)?;
    }
    Ok(())
}

fn write_meaning(conn: &rusqlite::Connection, meaning: &Meaning, change: NodeChange) -> Result<()> {
    match change {
        NodeChange::Insert => conn
            .execute(
                schema::INSERT_MEANING,
                params![
                    meaning.id.to_string(),
                    meaning.entry_id.to_string(),
                    meaning.part_of_speech_id.to_string(),
                    meaning.description,
                    format_datetime(&meaning.created_at),
                    format_datetime(&meaning.updated_at),
                ],
            )
            .context("insert", "meanings")?,
        NodeChange::Update => conn
            .execute(
                schema::UPDATE_MEANING,
                params![
                    meaning.id.to_string(),
                    meaning.part_of_speech_id.to_string(),
                    meaning.description,
                    format_datetime(&meaning.updated_at),
                ],
            )
            .context("update", "meanings")?,
    };
    Ok(())
}

fn write_example(conn: &rusqlite::Connection, example: &Example, change: NodeChange) -> Result<()> {
    match change {
        NodeChange::Insert => conn
            .execute(
                schema::INSERT_EXAMPLE,
                params![
                    example.id.to_string(),
                    example.meaning_id.to_string(),
                    example.text,
                    example.context,
                    format_datetime(&example.created_at),
                    format_datetime(&example.updated_at),
                ],
            )
            .context("insert", "examples")?,
        NodeChange::Update => conn
            .execute(
                schema::UPDATE_EXAMPLE,
                params![
                    example.id.to_string(),
                    example.text,
                    example.context,
                    format_datetime(&example.updated_at),
                ],
            )
            .context("update", "examples")?,
    };
    Ok(())
}

fn write_translation(
    conn: &rusqlite::Connection,
    translation: &Translation,
    change: NodeChange,
) -> Result<()> {
    match change {
        NodeChange::Insert => conn
            .execute(
                schema::INSERT_TRANSLATION,
                params![
                    translation.id.to_string(),
                    translation.meaning_id.to_string(),
                    translation.language,
                    translation.text,
                    format_datetime(&translation.created_at),
                    format_datetime(&translation.updated_at),
                ],
            )
            .context("insert", "translations")?,
        NodeChange::Update => conn
            .execute(
                schema::UPDATE_TRANSLATION,
                params![
                    translation.id.to_string(),
                    translation.language,
                    translation.text,
                    format_datetime(&translation.updated_at),
                ],
            )
            .context("update", "translations")?,
    };
    Ok(())
}

fn delete_row(conn: &rusqlite::Connection, sql: &str, table: &'static str, id: Uuid) -> Result<()> {
    conn.execute(sql, [id.to_string()])
        .context("delete", table)?;
    Ok(())
}

// ============================================================================
// EntryRepository implementation
// ============================================================================

#[async_trait]
impl EntryRepository for SqliteRepository {
    async fn create_entry_graph(&self, entry: NewEntry) -> Result<Entry> {
        let entry = entry.into_entry(timestamp_now());
        let id = entry.id;

        self.write("create_entry_graph", move |tx| {
            insert_entry_row(tx, &entry)?;
            for meaning in &entry.meanings {
                insert_meaning_tree(tx, meaning)?;
            }
            load_entry(tx, id)
        })
        .await
    }

    async fn get_entry_graph(&self, id: Uuid) -> Result<Entry> {
        self.read(move |conn| load_entry(conn, id)).await
    }

    async fn update_entry_graph(&self, patch: EntryPatch) -> Result<Entry> {
        let now = timestamp_now();

        self.write("update_entry_graph", move |tx| {
            let current = load_entry(tx, patch.id)?;
            let merge = merge_entry(&current, &patch, now)?;
            update_entry_row(tx, &merge.entry)?;
            for (meaning, change) in merge.meaning_writes() {
                write_meaning(tx, meaning, change)?;
            }
            for (example, change) in merge.example_writes() {
                write_example(tx, example, change)?;
            }
            for (translation, change) in merge.translation_writes() {
                write_translation(tx, translation, change)?;
            }
            load_entry(tx, patch.id)
        })
        .await
    }

    async fn delete_entry_graph(&self, id: Uuid) -> Result<Entry> {
        self.write("delete_entry_graph", move |tx| {
            let removed = load_entry(tx, id)?;
            delete_row(tx, schema::DELETE_ENTRY, "entries", id)?;
            Ok(removed)
        })
        .await
    }

    async fn list_entries(&self, query: &EntryQuery) -> Result<Page<Entry>> {
        let word = query.word_filter();
        let entry_type = query.entry_type.map(|t| t.as_str());
        let page = query.pagination();
        let list_sql =
            schema::list_entries_sql(query.effective_sort(), query.effective_order().sql());

        self.read(move |conn| {
            let total: i64 = conn
                .query_row(
                    &schema::count_entries_sql(),
                    params![word, entry_type],
                    |row| row.get(0),
                )
                .context("count", "entries")?;

            let mut stmt = conn.prepare(&list_sql).context("prepare", "entries")?;
            let rows = stmt
                .query_map(
                    params![word, entry_type, page.limit(), page.offset()],
                    row_to_entry,
                )
                .context("select", "entries")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("select", "entries")?;

            let items = rows
                .into_iter()
                .map(|mut entry| {
                    entry.meanings = load_meanings(conn, entry.id)?;
                    Ok(entry)
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Page {
                items,
                total: total as u64,
                offset: page.offset(),
                limit: page.limit(),
            })
        })
        .await
    }
}

// ============================================================================
// MeaningRepository implementation
// ============================================================================

#[async_trait]
impl MeaningRepository for SqliteRepository {
    async fn create_meaning(&self, entry_id: Uuid, meaning: NewMeaning) -> Result<Meaning> {
        let meaning = meaning.into_meaning(entry_id, timestamp_now());

        self.write("create_meaning", move |tx| {
            ensure_exists(tx, schema::ENTRY_EXISTS, "entries", "Entry", entry_id)?;
            insert_meaning_tree(tx, &meaning)?;
            load_meaning(tx, meaning.id)
        })
        .await
    }

    async fn get_meaning(&self, id: Uuid) -> Result<Meaning> {
        self.read(move |conn| load_meaning(conn, id)).await
    }

    async fn update_meaning(&self, patch: MeaningPatch) -> Result<Meaning> {
        let id = patch
            .id
            .ok_or_else(|| RepositoryError::InvalidState("meaning patch requires an id".into()))?;
        let now = timestamp_now();

        self.write("update_meaning", move |tx| {
            let current = load_meaning(tx, id)?;
            let merge = merge_meaning(&current, &patch, now)?;
            write_meaning(tx, &merge.meaning, NodeChange::Update)?;
            for (example, change) in merge.example_writes() {
                write_example(tx, example, change)?;
            }
            for (translation, change) in merge.translation_writes() {
                write_translation(tx, translation, change)?;
            }
            load_meaning(tx, id)
        })
        .await
    }

    async fn delete_meaning(&self, id: Uuid) -> Result<Meaning> {
        self.write("delete_meaning", move |tx| {
            let removed = load_meaning(tx, id)?;
            delete_row(tx, schema::DELETE_MEANING, "meanings", id)?;
            Ok(removed)
        })
        .await
    }

    async fn list_meanings(&self, entry_id: Uuid) -> Result<Vec<Meaning>> {
        self.read(move |conn| {
            ensure_exists(conn, schema::ENTRY_EXISTS, "entries", "Entry", entry_id)?;
            load_meanings(conn, entry_id)
        })
        .await
    }
}

// ============================================================================
// ExampleRepository implementation
// ============================================================================

const MEANING_EXISTS: &str = "SELECT 1 FROM meanings WHERE id = ?1";

#[async_trait]
impl ExampleRepository for SqliteRepository {
    async fn create_example(&self, meaning_id: Uuid, example: NewExample) -> Result<Example> {
        let example = example.into_example(meaning_id, timestamp_now());

        self.write("create_example", move |tx| {
            ensure_exists(tx, MEANING_EXISTS, "meanings", "Meaning", meaning_id)?;
            write_example(tx, &example, NodeChange::Insert)?;
            Ok(example.clone())
        })
        .await
    }

    async fn get_example(&self, id: Uuid) -> Result<Example> {
        self.read(move |conn| load_example(conn, id)).await
    }

    async fn update_example(&self, patch: ExamplePatch) -> Result<Example> {
        let id = patch
            .id
            .ok_or_else(|| RepositoryError::InvalidState("example patch requires an id".into()))?;
        let now = timestamp_now();

        self.write("update_example", move |tx| {
            let mut example = load_example(tx, id)?;
            apply_example_patch(&mut example, &patch, now);
            write_example(tx, &example, NodeChange::Update)?;
            Ok(example)
        })
        .await
    }

    async fn delete_example(&self, id: Uuid) -> Result<Example> {
        self.write("delete_example", move |tx| {
            let removed = load_example(tx, id)?;
            delete_row(tx, schema::DELETE_EXAMPLE, "examples", id)?;
            Ok(removed)
        })
        .await
    }

    async fn list_examples(&self, meaning_id: Uuid) -> Result<Vec<Example>> {
        self.read(move |conn| {
            ensure_exists(conn, MEANING_EXISTS, "meanings", "Meaning", meaning_id)?;
            load_examples(conn, meaning_id)
        })
        .await
    }
}

// ============================================================================
// TranslationRepository implementation
// ============================================================================

#[async_trait]
impl TranslationRepository for SqliteRepository {
    async fn create_translation(
        &self,
        meaning_id: Uuid,
        translation: NewTranslation,
    ) -> Result<Translation> {
        let translation = translation.into_translation(meaning_id, timestamp_now());

        self.write("create_translation", move |tx| {
            ensure_exists(tx, MEANING_EXISTS, "meanings", "Meaning", meaning_id)?;
            write_translation(tx, &translation, NodeChange::Insert)?;
            Ok(translation.clone())
        })
        .await
    }

    async fn get_translation(&self, id: Uuid) -> Result<Translation> {
        self.read(move |conn| load_translation(conn, id)).await
    }

    async fn update_translation(&self, patch: TranslationPatch) -> Result<Translation> {
        let id = patch.id.ok_or_else(|| {
            RepositoryError::InvalidState("translation patch requires an id".into())
        })?;
        let now = timestamp_now();

        self.write("update_translation", move |tx| {
            let mut translation = load_translation(tx, id)?;
            apply_translation_patch(&mut translation, &patch, now);
            write_translation(tx, &translation, NodeChange::Update)?;
            Ok(translation)
        })
        .await
    }

    async fn delete_translation(&self, id: Uuid) -> Result<Translation> {
        self.write("delete_translation", move |tx| {
            let removed = load_translation(tx, id)?;
            delete_row(tx, schema::DELETE_TRANSLATION, "translations", id)?;
            Ok(removed)
        })
        .await
    }

    async fn list_translations(
        &self,
        meaning_id: Uuid,
        language: Option<&str>,
    ) -> Result<Vec<Translation>> {
        let language = language.map(str::to_string);
        self.read(move |conn| {
            ensure_exists(conn, MEANING_EXISTS, "meanings", "Meaning", meaning_id)?;
            load_translations(conn, meaning_id, language.as_deref())
        })
        .await
    }
}

// ============================================================================
// HistoryRepository implementation
// ============================================================================

#[async_trait]
impl HistoryRepository for SqliteRepository {
    async fn record_change(&self, change: &ChangeHistory) -> Result<()> {
        let change = change.clone();
        let payload = serde_json::to_string(&change.payload)
            .map_err(|e| RepositoryError::storage("insert", "change_history", e.to_string()))?;

        self.write("record_change", move |tx| {
            tx.execute(
                schema::INSERT_CHANGE,
                params![
                    change.id.to_string(),
                    change.entry_id.to_string(),
                    change.action.as_str(),
                    payload,
                    change.user_id.map(|u| u.to_string()),
                    format_datetime(&change.created_at),
                ],
            )
            .context("insert", "change_history")?;
            Ok(())
        })
        .await
    }

    async fn list_changes(&self, entry_id: Uuid) -> Result<Vec<ChangeHistory>> {
        self.read(move |conn| {
            let mut stmt = conn
                .prepare_cached(schema::SELECT_CHANGES_BY_ENTRY)
                .context("prepare", "change_history")?;
            let rows = stmt
                .query_map([entry_id.to_string()], row_to_change)
                .context("select", "change_history")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("select", "change_history")
        })
        .await
    }
}

#[async_trait]
impl DictionaryRepository for SqliteRepository {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Closing an already closed handle is a no-op, so a shared
        // in-memory connection is fine here
        for conn in [&self.reader, &self.writer] {
            conn.clone()
                .close()
                .await
                .map_err(|e| RepositoryError::storage("close", "database", e.to_string()))?;
        }
        tracing::info!("SQLite repository closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexikon_core::dictionary::{EntryType, NewTranslation};
    use std::time::Instant;
    use tempfile::TempDir;

    async fn file_repo() -> (SqliteRepository, TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexikon.db").to_string_lossy().to_string();
        let repo = SqliteRepository::new(&path, false).await.unwrap();
        (repo, dir, path)
    }

    fn apple() -> NewEntry {
        NewEntry::new("apple", EntryType::Word)
            .with_pronunciation("/ˈæp.əl/")
            .with_meaning(
                NewMeaning::new(Uuid::new_v4(), "a round fruit")
                    .with_example(NewExample::new("She ate an apple."))
                    .with_translation(NewTranslation::new("es", "manzana"))
                    .with_translation(NewTranslation::new("fr", "pomme")),
            )
    }

    #[tokio::test]
    async fn test_create_and_get_graph() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();

        let created = repo.create_entry_graph(apple()).await.unwrap();
        let fetched = repo.get_entry_graph(created.id).await.unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.node_count(), 5);
        assert_eq!(fetched.meanings[0].entry_id, created.id);
    }

    #[tokio::test]
    async fn test_get_missing_entry_is_not_found() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let err = repo.get_entry_graph(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { entity_type: "Entry", .. }));
    }

    #[tokio::test]
    async fn test_duplicate_word_and_type() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        repo.create_entry_graph(apple()).await.unwrap();

        let err = repo.create_entry_graph(apple()).await.unwrap_err();
        assert_eq!(
            err,
            RepositoryError::DuplicateKey {
                entity_type: "Entry",
                key: "apple/WORD".to_string(),
            }
        );

        // Same word, different type is a different entry
        repo.create_entry_graph(NewEntry::new("apple", EntryType::Phrase))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_rows() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let bad = NewEntry::new("pear", EntryType::Word).with_meaning(
            NewMeaning::new(Uuid::new_v4(), "a fruit")
                .with_example(NewExample::new("A ripe pear."))
                .with_translation(NewTranslation::new("x", "pera")),
        );

        let err = repo.create_entry_graph(bad).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidState(_)));

        let page = repo.list_entries(&EntryQuery::new()).await.unwrap();
        assert_eq!(page.total, 0);
        let orphans: i64 = repo
            .read(|conn| {
                conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM meanings) + (SELECT COUNT(*) FROM examples)",
                    [],
                    |row| row.get(0),
                )
                .context("count", "meanings")
            })
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_sparse_update_touches_only_referenced_nodes() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let created = repo.create_entry_graph(apple()).await.unwrap();
        let meaning = &created.meanings[0];
        let es = meaning
            .translations
            .iter()
            .find(|t| t.language == "es")
            .unwrap()
            .clone();
        let fr = meaning
            .translations
            .iter()
            .find(|t| t.language == "fr")
            .unwrap()
            .clone();

        let patch = EntryPatch::new(created.id).with_meaning(
            MeaningPatch::existing(meaning.id)
                .with_translation(TranslationPatch::existing(es.id).with_text("la manzana"))
                .with_example(ExamplePatch::create("Apples are red.")),
        );
        let updated = repo.update_entry_graph(patch).await.unwrap();

        assert_eq!(updated.word, "apple");
        assert!(updated.updated_at >= created.updated_at);
        let meaning = &updated.meanings[0];
        assert_eq!(meaning.examples.len(), 2);
        let new_es = meaning.translations.iter().find(|t| t.id == es.id).unwrap();
        assert_eq!(new_es.text, "la manzana");
        let old_fr = meaning.translations.iter().find(|t| t.id == fr.id).unwrap();
        assert_eq!(old_fr, &fr);
    }

    #[tokio::test]
    async fn test_update_with_foreign_child_is_not_found() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let created = repo.create_entry_graph(apple()).await.unwrap();

        let patch = EntryPatch::new(created.id)
            .with_word("apples")
            .with_meaning(MeaningPatch::existing(Uuid::new_v4()).with_description("x"));
        let err = repo.update_entry_graph(patch).await.unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound { entity_type: "Meaning", .. }));
        // The word change was rolled back with the rest
        assert_eq!(repo.get_entry_graph(created.id).await.unwrap().word, "apple");
    }

    #[tokio::test]
    async fn test_delete_cascades_and_keeps_history() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let created = repo.create_entry_graph(apple()).await.unwrap();
        let meaning_id = created.meanings[0].id;
        let example_id = created.meanings[0].examples[0].id;
        repo.record_change(&ChangeHistory::new(
            created.id,
            lexikon_core::dictionary::ChangeAction::Create,
            serde_json::json!({ "word": "apple" }),
            None,
        ))
        .await
        .unwrap();

        let removed = repo.delete_entry_graph(created.id).await.unwrap();

        assert_eq!(removed, created);
        assert!(matches!(
            repo.get_meaning(meaning_id).await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(matches!(
            repo.get_example(example_id).await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert_eq!(repo.list_changes(created.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_child_create_requires_parent() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();

        let err = repo
            .create_example(Uuid::new_v4(), NewExample::new("orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { entity_type: "Meaning", .. }));

        let err = repo
            .create_meaning(Uuid::new_v4(), NewMeaning::new(Uuid::new_v4(), "orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { entity_type: "Entry", .. }));
    }

    #[tokio::test]
    async fn test_incremental_nodes_and_language_filter() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let entry = repo
            .create_entry_graph(NewEntry::new("run", EntryType::Word))
            .await
            .unwrap();
        let meaning = repo
            .create_meaning(entry.id, NewMeaning::new(Uuid::new_v4(), "move fast"))
            .await
            .unwrap();
        repo.create_translation(meaning.id, NewTranslation::new("es", "correr"))
            .await
            .unwrap();
        repo.create_translation(meaning.id, NewTranslation::new("de", "laufen"))
            .await
            .unwrap();

        let spanish = repo
            .list_translations(meaning.id, Some("ES"))
            .await
            .unwrap();
        assert_eq!(spanish.len(), 1);
        assert_eq!(spanish[0].text, "correr");
        assert_eq!(repo.list_translations(meaning.id, None).await.unwrap().len(), 2);

        let removed = repo.delete_meaning(meaning.id).await.unwrap();
        assert_eq!(removed.translations.len(), 2);
        assert!(repo.list_meanings(entry.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_entries_filters_sorts_and_counts() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        for (word, ty) in [
            ("Apple", EntryType::Word),
            ("apple pie", EntryType::CompoundWord),
            ("banana", EntryType::Word),
        ] {
            repo.create_entry_graph(NewEntry::new(word, ty)).await.unwrap();
        }

        let query = EntryQuery::new()
            .with_word("APP")
            .with_sort(lexikon_core::storage::SortField::Word, lexikon_core::storage::SortDirection::Asc)
            .with_page(0, 1);
        let page = repo.list_entries(&query).await.unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].word, "Apple");

        let words = repo
            .list_entries(&EntryQuery::new().with_entry_type(EntryType::Word))
            .await
            .unwrap();
        assert_eq!(words.total, 2);
    }

    #[tokio::test]
    async fn test_word_filter_folds_non_ascii_case() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let reference = crate::storage::InMemoryRepository::new();
        for word in ["Äpfel", "Über", "apfel"] {
            repo.create_entry_graph(NewEntry::new(word, EntryType::Word))
                .await
                .unwrap();
            reference
                .create_entry_graph(NewEntry::new(word, EntryType::Word))
                .await
                .unwrap();
        }

        let query = EntryQuery::new().with_word("äpf");
        let page = repo.list_entries(&query).await.unwrap();
        let expected = reference.list_entries(&query).await.unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].word, "Äpfel");
        assert_eq!(page.total, expected.total);

        let upper = repo
            .list_entries(&EntryQuery::new().with_word("ÜBER"))
            .await
            .unwrap();
        assert_eq!(upper.total, 1);
        assert_eq!(upper.items[0].word, "Über");
    }

    #[tokio::test]
    async fn test_word_sort_matches_in_memory_backend() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let reference = crate::storage::InMemoryRepository::new();
        for word in ["Zebra", "Äpfel", "apfel", "Über", "oben"] {
            repo.create_entry_graph(NewEntry::new(word, EntryType::Word))
                .await
                .unwrap();
            reference
                .create_entry_graph(NewEntry::new(word, EntryType::Word))
                .await
                .unwrap();
        }

        let query = EntryQuery::new().with_sort(
            lexikon_core::storage::SortField::Word,
            lexikon_core::storage::SortDirection::Asc,
        );
        let words = |page: Page<Entry>| page.items.into_iter().map(|e| e.word).collect::<Vec<_>>();

        assert_eq!(
            words(repo.list_entries(&query).await.unwrap()),
            words(reference.list_entries(&query).await.unwrap())
        );
    }

    #[tokio::test]
    async fn test_file_database_reads_through_reader() {
        let (repo, _dir, _path) = file_repo().await;
        let created = repo.create_entry_graph(apple()).await.unwrap();

        assert_eq!(repo.get_entry_graph(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_locked_database_exhausts_retries() {
        let (repo, _dir, path) = file_repo().await;
        let blocker = rusqlite::Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let started = Instant::now();
        let err = repo
            .create_entry_graph(NewEntry::new("locked", EntryType::Word))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, RepositoryError::StorageFailure { .. }));
        assert!(elapsed >= RetryPolicy::default().max_total_delay());
        assert!(elapsed < Duration::from_secs(2));

        blocker.execute_batch("ROLLBACK").unwrap();
        repo.create_entry_graph(NewEntry::new("locked", EntryType::Word))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_succeeds_once_lock_is_released() {
        let (repo, _dir, path) = file_repo().await;
        let blocker = rusqlite::Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();
        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(15));
            blocker.execute_batch("ROLLBACK").unwrap();
        });

        let created = repo
            .create_entry_graph(NewEntry::new("patient", EntryType::Word))
            .await;
        release.join().unwrap();

        assert!(created.is_ok());
    }

    #[tokio::test]
    async fn test_no_retry_policy_fails_fast() {
        let (repo, _dir, path) = file_repo().await;
        let repo = repo.with_retry_policy(RetryPolicy::none());
        let blocker = rusqlite::Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let err = repo
            .create_entry_graph(NewEntry::new("hasty", EntryType::Word))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::StorageFailure { .. }));
        blocker.execute_batch("ROLLBACK").unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_creates() {
        let (repo, _dir, _path) = file_repo().await;
        let repo = Arc::new(repo);

        let (a, b) = tokio::join!(
            {
                let repo = Arc::clone(&repo);
                async move { repo.create_entry_graph(NewEntry::new("twin", EntryType::Word)).await }
            },
            {
                let repo = Arc::clone(&repo);
                async move { repo.create_entry_graph(NewEntry::new("twin", EntryType::Word)).await }
            }
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(RepositoryError::DuplicateKey { entity_type: "Entry", .. })
        )));
    }

    #[tokio::test]
    async fn test_closed_repository_rejects_operations() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        repo.close().await.unwrap();

        let err = repo
            .create_entry_graph(NewEntry::new("late", EntryType::Word))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RepositoryError::InvalidState("repository is closed".to_string())
        );
        // Closing twice is harmless
        repo.close().await.unwrap();
    }
}
