//! PostgreSQL repository implementation.
//!
//! Every mutation runs in one `sqlx` transaction. The root row of the
//! mutated subtree is locked with `FOR UPDATE` before the current state is
//! read, so concurrent sparse merges on the same graph serialize instead of
//! overwriting each other. Dropping a future mid-operation drops the
//! transaction, which rolls it back.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use lexikon_core::dictionary::{
    apply_example_patch, apply_translation_patch, merge_entry, merge_meaning, timestamp_now,
    ChangeHistory, Entry, EntryPatch, Example, ExamplePatch, Meaning, MeaningPatch, NewEntry,
    NewExample, NewMeaning, NewTranslation, NodeChange, Translation, TranslationPatch,
};
use lexikon_core::storage::{
    DictionaryRepository, EntryQuery, EntryRepository, ExampleRepository, HistoryRepository,
    MeaningRepository, Page, RepositoryError, Result, TranslationRepository,
};

use super::conversions::{
    change_from_row, entry_from_row, example_from_row, meaning_from_row, translation_from_row,
    ChangeRow, EntryRow, ExampleRow, MeaningRow, TranslationRow,
};
use super::error::SqlContext;
use super::schema;
use crate::config::PostgresConfig;

/// Serializes schema creation across processes starting at the same time.
const SCHEMA_LOCK_KEY: i64 = 0x6c65_786b;

/// PostgreSQL-based repository implementation.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Builds a pool from the configuration and applies the schema.
    pub async fn connect(config: &PostgresConfig, debug: bool) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);
        // sqlx traces every statement unless told otherwise
        let options = if debug {
            options
        } else {
            options.disable_statement_logging()
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_open)
            .min_connections(config.max_idle.min(config.max_open))
            .max_lifetime(config.max_lifetime)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| RepositoryError::storage("connect", "database", e.to_string()))?;

        tracing::info!(host = %config.host, database = %config.database, max_open = config.max_open, "PostgreSQL pool ready");
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and applies the schema.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let mut tx = pool.begin().await.context("begin", "transaction")?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .context("lock", "schema")?;
        sqlx::raw_sql(schema::CREATE_TABLES)
            .execute(&mut *tx)
            .await
            .context("create", "schema")?;
        tx.commit().await.context("commit", "transaction")?;
        Ok(Self { pool })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(RepositoryError::InvalidState(
                "repository is closed".to_string(),
            ));
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.ensure_open()?;
        self.pool.begin().await.context("begin", "transaction")
    }

    /// Read-only transaction over one snapshot.
    async fn snapshot(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.begin().await?;
        sqlx::query(schema::SNAPSHOT)
            .execute(&mut *tx)
            .await
            .context("begin", "transaction")?;
        Ok(tx)
    }
}

async fn commit<T>(tx: Transaction<'static, Postgres>, value: T) -> Result<T> {
    tx.commit().await.context("commit", "transaction")?;
    Ok(value)
}

// ============================================================================
// Row-level helpers
// ============================================================================

async fn lock_row(
    conn: &mut PgConnection,
    sql: &str,
    table: &'static str,
    entity_type: &'static str,
    id: Uuid,
) -> Result<()> {
    sqlx::query(sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("lock", table)?
        .map(|_| ())
        .ok_or_else(|| RepositoryError::not_found(entity_type, id))
}

async fn load_entry(conn: &mut PgConnection, id: Uuid) -> Result<Entry> {
    let row: Option<EntryRow> = sqlx::query_as(schema::SELECT_ENTRY_BY_ID)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("select", "entries")?;
    let mut entry = entry_from_row(row.ok_or_else(|| RepositoryError::not_found("Entry", id))?)?;
    entry.meanings = load_meanings(conn, id).await?;
    Ok(entry)
}

async fn load_meanings(conn: &mut PgConnection, entry_id: Uuid) -> Result<Vec<Meaning>> {
    let rows: Vec<MeaningRow> = sqlx::query_as(schema::SELECT_MEANINGS_BY_ENTRY)
        .bind(entry_id)
        .fetch_all(&mut *conn)
        .await
        .context("select", "meanings")?;
    let mut meanings = Vec::with_capacity(rows.len());
    for row in rows {
        meanings.push(with_children(conn, meaning_from_row(row)).await?);
    }
    Ok(meanings)
}

async fn load_meaning(conn: &mut PgConnection, id: Uuid) -> Result<Meaning> {
    let row: Option<MeaningRow> = sqlx::query_as(schema::SELECT_MEANING_BY_ID)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("select", "meanings")?;
    let meaning = meaning_from_row(row.ok_or_else(|| RepositoryError::not_found("Meaning", id))?);
    with_children(conn, meaning).await
}

async fn with_children(conn: &mut PgConnection, mut meaning: Meaning) -> Result<Meaning> {
    meaning.examples = load_examples(conn, meaning.id).await?;
    meaning.translations = load_translations(conn, meaning.id, None).await?;
    Ok(meaning)
}

async fn load_examples(conn: &mut PgConnection, meaning_id: Uuid) -> Result<Vec<Example>> {
    let rows: Vec<ExampleRow> = sqlx::query_as(schema::SELECT_EXAMPLES_BY_MEANING)
        .bind(meaning_id)
        .fetch_all(&mut *conn)
        .await
        .context("select", "examples")?;
    Ok(rows.into_iter().map(example_from_row).collect())
}

async fn load_translations(
    conn: &mut PgConnection,
    meaning_id: Uuid,
    language: Option<&str>,
) -> Result<Vec<Translation>> {
    let rows: Vec<TranslationRow> = sqlx::query_as(schema::SELECT_TRANSLATIONS_BY_MEANING)
        .bind(meaning_id)
        .bind(language)
        .fetch_all(&mut *conn)
        .await
        .context("select", "translations")?;
    Ok(rows.into_iter().map(translation_from_row).collect())
}

async fn load_example(conn: &mut PgConnection, id: Uuid) -> Result<Example> {
    let row: Option<ExampleRow> = sqlx::query_as(schema::SELECT_EXAMPLE_BY_ID)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("select", "examples")?;
    row.map(example_from_row)
        .ok_or_else(|| RepositoryError::not_found("Example", id))
}

async fn load_translation(conn: &mut PgConnection, id: Uuid) -> Result<Translation> {
    let row: Option<TranslationRow> = sqlx::query_as(schema::SELECT_TRANSLATION_BY_ID)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("select", "translations")?;
    row.map(translation_from_row)
        .ok_or_else(|| RepositoryError::not_found("Translation", id))
}

async fn write_entry(conn: &mut PgConnection, entry: &Entry, change: NodeChange) -> Result<()> {
    let result = match change {
        NodeChange::Insert => sqlx::query(schema::INSERT_ENTRY)
            .bind(entry.id)
            .bind(&entry.word)
            .bind(entry.entry_type.as_str())
            .bind(&entry.pronunciation)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .execute(&mut *conn)
            .await
            .context("insert", "entries"),
        NodeChange::Update => sqlx::query(schema::UPDATE_ENTRY)
            .bind(entry.id)
            .bind(&entry.word)
            .bind(entry.entry_type.as_str())
            .bind(&entry.pronunciation)
            .bind(entry.updated_at)
            .execute(&mut *conn)
            .await
            .context("update", "entries"),
    };
    match result {
        Ok(_) => Ok(()),
        // Report the natural key instead of the constraint name
        Err(RepositoryError::DuplicateKey { entity_type, .. }) => Err(RepositoryError::DuplicateKey {
            entity_type,
            key: format!("{}/{}", entry.word, entry.entry_type),
        }),
        Err(other) => Err(other),
    }
}

async fn insert_meaning_tree(conn: &mut PgConnection, meaning: &Meaning) -> Result<()> {
    write_meaning(conn, meaning, NodeChange::Insert).await?;
    for example in &meaning.examples {
        write_example(conn, example, NodeChange::Insert).await?;
    }
    for translation in &meaning.translations {
        write_translation(conn, translation, NodeChange::Insert).await?;
    }
    Ok(())
}

async fn write_meaning(conn: &mut PgConnection, meaning: &Meaning, change: NodeChange) -> Result<()> {
    match change {
        NodeChange::Insert => sqlx::query(schema::INSERT_MEANING)
            .bind(meaning.id)
            .bind(meaning.entry_id)
            .bind(meaning.part_of_speech_id)
            .bind(&meaning.description)
            .bind(meaning.created_at)
            .bind(meaning.updated_at)
            .execute(&mut *conn)
            .await
            .context("insert", "meanings")?,
        NodeChange::Update => sqlx::query(schema::UPDATE_MEANING)
            .bind(meaning.id)
            .bind(meaning.part_of_speech_id)
            .bind(&meaning.description)
            .bind(meaning.updated_at)
            .execute(&mut *conn)
            .await
            .context("update", "meanings")?,
    };
    Ok(())
}

async fn write_example(conn: &mut PgConnection, example: &Example, change: NodeChange) -> Result<()> {
    match change {
        NodeChange::Insert => sqlx::query(schema::INSERT_EXAMPLE)
            .bind(example.id)
            .bind(example.meaning_id)
            .bind(&example.text)
            .bind(&example.context)
            .bind(example.created_at)
            .bind(example.updated_at)
            .execute(&mut *conn)
            .await
            .context("insert", "examples")?,
        NodeChange::Update => sqlx::query(schema::UPDATE_EXAMPLE)
            .bind(example.id)
            .bind(&example.text)
            .bind(&example.context)
            .bind(example.updated_at)
            .execute(&mut *conn)
            .await
            .context("update", "examples")?,
    };
    Ok(())
}

async fn write_translation(
    conn: &mut PgConnection,
    translation: &Translation,
    change: NodeChange,
) -> Result<()> {
    match change {
        NodeChange::Insert => sqlx::query(schema::INSERT_TRANSLATION)
            .bind(translation.id)
            .bind(translation.meaning_id)
            .bind(&translation.language)
            .bind(&translation.text)
            .bind(translation.created_at)
            .bind(translation.updated_at)
            .execute(&mut *conn)
            .await
            .context("insert", "translations")?,
        NodeChange::Update => sqlx::query(schema::UPDATE_TRANSLATION)
            .bind(translation.id)
            .bind(&translation.language)
            .bind(&translation.text)
            .bind(translation.updated_at)
            .execute(&mut *conn)
            .await
            .context("update", "translations")?,
    };
    Ok(())
}

async fn delete_row(conn: &mut PgConnection, sql: &str, table: &'static str, id: Uuid) -> Result<()> {
    sqlx::query(sql)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("delete", table)?;
    Ok(())
}

// ============================================================================
// EntryRepository implementation
// ============================================================================

#[async_trait]
impl EntryRepository for PostgresRepository {
    async fn create_entry_graph(&self, entry: NewEntry) -> Result<Entry> {
        let entry = entry.into_entry(timestamp_now());
        let mut tx = self.begin().await?;

        write_entry(&mut tx, &entry, NodeChange::Insert).await?;
        for meaning in &entry.meanings {
            insert_meaning_tree(&mut tx, meaning).await?;
        }
        let created = load_entry(&mut tx, entry.id).await?;
        commit(tx, created).await
    }

    async fn get_entry_graph(&self, id: Uuid) -> Result<Entry> {
        let mut tx = self.snapshot().await?;
        let entry = load_entry(&mut tx, id).await?;
        commit(tx, entry).await
    }

    async fn update_entry_graph(&self, patch: EntryPatch) -> Result<Entry> {
        let now = timestamp_now();
        let mut tx = self.begin().await?;

        lock_row(&mut tx, schema::LOCK_ENTRY, "entries", "Entry", patch.id).await?;
        let current = load_entry(&mut tx, patch.id).await?;
        let merge = merge_entry(&current, &patch, now)?;
        write_entry(&mut tx, &merge.entry, NodeChange::Update).await?;
        for (meaning, change) in merge.meaning_writes() {
            write_meaning(&mut tx, meaning, change).await?;
        }
        for (example, change) in merge.example_writes() {
            write_example(&mut tx, example, change).await?;
        }
        for (translation, change) in merge.translation_writes() {
            write_translation(&mut tx, translation, change).await?;
        }
        let updated = load_entry(&mut tx, patch.id).await?;
        commit(tx, updated).await
    }

    async fn delete_entry_graph(&self, id: Uuid) -> Result<Entry> {
        let mut tx = self.begin().await?;
        lock_row(&mut tx, schema::LOCK_ENTRY, "entries", "Entry", id).await?;
        let removed = load_entry(&mut tx, id).await?;
        delete_row(&mut tx, schema::DELETE_ENTRY, "entries", id).await?;
        commit(tx, removed).await
    }

    async fn list_entries(&self, query: &EntryQuery) -> Result<Page<Entry>> {
        let word = query.word_filter();
        let entry_type = query.entry_type.map(|t| t.as_str());
        let page = query.pagination();
        let list_sql =
            schema::list_entries_sql(query.effective_sort(), query.effective_order().sql());
        let count_sql = schema::count_entries_sql();

        let mut tx = self.snapshot().await?;
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(word.as_deref())
            .bind(entry_type)
            .fetch_one(&mut *tx)
            .await
            .context("count", "entries")?;
        let rows: Vec<EntryRow> = sqlx::query_as(&list_sql)
            .bind(word.as_deref())
            .bind(entry_type)
            .bind(i64::from(page.limit()))
            .bind(i64::from(page.offset()))
            .fetch_all(&mut *tx)
            .await
            .context("select", "entries")?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entry = entry_from_row(row)?;
            entry.meanings = load_meanings(&mut tx, entry.id).await?;
            items.push(entry);
        }

        let result = Page {
            items,
            total: total as u64,
            offset: page.offset(),
            limit: page.limit(),
        };
        commit(tx, result).await
    }
}

// ============================================================================
// MeaningRepository implementation
// ============================================================================

#[async_trait]
impl MeaningRepository for PostgresRepository {
    async fn create_meaning(&self, entry_id: Uuid, meaning: NewMeaning) -> Result<Meaning> {
        let meaning = meaning.into_meaning(entry_id, timestamp_now());
        let mut tx = self.begin().await?;

        lock_row(&mut tx, schema::LOCK_ENTRY, "entries", "Entry", entry_id).await?;
        insert_meaning_tree(&mut tx, &meaning).await?;
        let created = load_meaning(&mut tx, meaning.id).await?;
        commit(tx, created).await
    }

    async fn get_meaning(&self, id: Uuid) -> Result<Meaning> {
        let mut tx = self.snapshot().await?;
        let meaning = load_meaning(&mut tx, id).await?;
        commit(tx, meaning).await
    }

    async fn update_meaning(&self, patch: MeaningPatch) -> Result<Meaning> {
        let id = patch
            .id
            .ok_or_else(|| RepositoryError::InvalidState("meaning patch requires an id".into()))?;
        let now = timestamp_now();
        let mut tx = self.begin().await?;

        lock_row(&mut tx, schema::LOCK_MEANING, "meanings", "Meaning", id).await?;
        let current = load_meaning(&mut tx, id).await?;
        let merge = merge_meaning(&current, &patch, now)?;
        write_meaning(&mut tx, &merge.meaning, NodeChange::Update).await?;
        for (example, change) in merge.example_writes() {
            write_example(&mut tx, example, change).await?;
        }
        for (translation, change) in merge.translation_writes() {
            write_translation(&mut tx, translation, change).await?;
        }
        let updated = load_meaning(&mut tx, id).await?;
        commit(tx, updated).await
    }

    async fn delete_meaning(&self, id: Uuid) -> Result<Meaning> {
        let mut tx = self.begin().await?;
        lock_row(&mut tx, schema::LOCK_MEANING, "meanings", "Meaning", id).await?;
        let removed = load_meaning(&mut tx, id).await?;
        delete_row(&mut tx, schema::DELETE_MEANING, "meanings", id).await?;
        commit(tx, removed).await
    }

    async fn list_meanings(&self, entry_id: Uuid) -> Result<Vec<Meaning>> {
        let mut tx = self.snapshot().await?;
        // Distinguishes an unknown entry from one without meanings
        load_entry_row(&mut tx, entry_id).await?;
        let meanings = load_meanings(&mut tx, entry_id).await?;
        commit(tx, meanings).await
    }
}

async fn load_entry_row(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("SELECT 1 FROM entries WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("select", "entries")?
        .map(|_| ())
        .ok_or_else(|| RepositoryError::not_found("Entry", id))
}

async fn load_meaning_row(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("SELECT 1 FROM meanings WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("select", "meanings")?
        .map(|_| ())
        .ok_or_else(|| RepositoryError::not_found("Meaning", id))
}

// ============================================================================
// ExampleRepository implementation
// ============================================================================

#[async_trait]
impl ExampleRepository for PostgresRepository {
    async fn create_example(&self, meaning_id: Uuid, example: NewExample) -> Result<Example> {
        let example = example.into_example(meaning_id, timestamp_now());
        let mut tx = self.begin().await?;

        lock_row(&mut tx, schema::LOCK_MEANING, "meanings", "Meaning", meaning_id).await?;
        write_example(&mut tx, &example, NodeChange::Insert).await?;
        commit(tx, example).await
    }

    async fn get_example(&self, id: Uuid) -> Result<Example> {
        let mut tx = self.snapshot().await?;
        let example = load_example(&mut tx, id).await?;
        commit(tx, example).await
    }

    async fn update_example(&self, patch: ExamplePatch) -> Result<Example> {
        let id = patch
            .id
            .ok_or_else(|| RepositoryError::InvalidState("example patch requires an id".into()))?;
        let now = timestamp_now();
        let mut tx = self.begin().await?;

        let mut example = load_example(&mut tx, id).await?;
        apply_example_patch(&mut example, &patch, now);
        write_example(&mut tx, &example, NodeChange::Update).await?;
        commit(tx, example).await
    }

    async fn delete_example(&self, id: Uuid) -> Result<Example> {
        let mut tx = self.begin().await?;
        let removed = load_example(&mut tx, id).await?;
        delete_row(&mut tx, schema::DELETE_EXAMPLE, "examples", id).await?;
        commit(tx, removed).await
    }

    async fn list_examples(&self, meaning_id: Uuid) -> Result<Vec<Example>> {
        let mut tx = self.snapshot().await?;
        load_meaning_row(&mut tx, meaning_id).await?;
        let examples = load_examples(&mut tx, meaning_id).await?;
        commit(tx, examples).await
    }
}

// ============================================================================
// TranslationRepository implementation
// ============================================================================

#[async_trait]
impl TranslationRepository for PostgresRepository {
    async fn create_translation(
        &self,
        meaning_id: Uuid,
        translation: NewTranslation,
    ) -> Result<Translation> {
        let translation = translation.into_translation(meaning_id, timestamp_now());
        let mut tx = self.begin().await?;

        lock_row(&mut tx, schema::LOCK_MEANING, "meanings", "Meaning", meaning_id).await?;
        write_translation(&mut tx, &translation, NodeChange::Insert).await?;
        commit(tx, translation).await
    }

    async fn get_translation(&self, id: Uuid) -> Result<Translation> {
        let mut tx = self.snapshot().await?;
        let translation = load_translation(&mut tx, id).await?;
        commit(tx, translation).await
    }

    async fn update_translation(&self, patch: TranslationPatch) -> Result<Translation> {
        let id = patch.id.ok_or_else(|| {
            RepositoryError::InvalidState("translation patch requires an id".into())
        })?;
        let now = timestamp_now();
        let mut tx = self.begin().await?;

        let mut translation = load_translation(&mut tx, id).await?;
        apply_translation_patch(&mut translation, &patch, now);
        write_translation(&mut tx, &translation, NodeChange::Update).await?;
        commit(tx, translation).await
    }

    async fn delete_translation(&self, id: Uuid) -> Result<Translation> {
        let mut tx = self.begin().await?;
        let removed = load_translation(&mut tx, id).await?;
        delete_row(&mut tx, schema::DELETE_TRANSLATION, "translations", id).await?;
        commit(tx, removed).await
    }

    async fn list_translations(
        &self,
        meaning_id: Uuid,
        language: Option<&str>,
    ) -> Result<Vec<Translation>> {
        let mut tx = self.snapshot().await?;
        load_meaning_row(&mut tx, meaning_id).await?;
        let translations = load_translations(&mut tx, meaning_id, language).await?;
        commit(tx, translations).await
    }
}

// ============================================================================
// HistoryRepository implementation
// ============================================================================

#[async_trait]
impl HistoryRepository for PostgresRepository {
    async fn record_change(&self, change: &ChangeHistory) -> Result<()> {
        self.ensure_open()?;
        sqlx::query(schema::INSERT_CHANGE)
            .bind(change.id)
            .bind(change.entry_id)
            .bind(change.action.as_str())
            .bind(&change.payload)
            .bind(change.user_id)
            .bind(change.created_at)
            .execute(&self.pool)
            .await
            .context("insert", "change_history")?;
        Ok(())
    }

    async fn list_changes(&self, entry_id: Uuid) -> Result<Vec<ChangeHistory>> {
        self.ensure_open()?;
        let rows: Vec<ChangeRow> = sqlx::query_as(schema::SELECT_CHANGES_BY_ENTRY)
            .bind(entry_id)
            .fetch_all(&self.pool)
            .await
            .context("select", "change_history")?;
        rows.into_iter().map(change_from_row).collect()
    }
}

#[async_trait]
impl DictionaryRepository for PostgresRepository {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
        Ok(())
    }
}
