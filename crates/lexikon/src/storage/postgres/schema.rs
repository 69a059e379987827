//! PostgreSQL schema definitions and SQL query constants.

use lexikon_core::storage::SortField;

/// DDL applied at startup. Every statement is idempotent.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id UUID PRIMARY KEY,
    word TEXT NOT NULL,
    entry_type TEXT NOT NULL CHECK (entry_type IN ('WORD', 'COMPOUND_WORD', 'PHRASE')),
    pronunciation TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT entries_word_type_key UNIQUE (word, entry_type)
);

CREATE TABLE IF NOT EXISTS meanings (
    id UUID PRIMARY KEY,
    entry_id UUID NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    part_of_speech_id UUID NOT NULL,
    description TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS examples (
    id UUID PRIMARY KEY,
    meaning_id UUID NOT NULL REFERENCES meanings(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    context TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS translations (
    id UUID PRIMARY KEY,
    meaning_id UUID NOT NULL REFERENCES meanings(id) ON DELETE CASCADE,
    language TEXT NOT NULL CHECK (length(language) BETWEEN 2 AND 5),
    text TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

-- No foreign key: history outlives the entry it describes
CREATE TABLE IF NOT EXISTS change_history (
    id UUID PRIMARY KEY,
    entry_id UUID NOT NULL,
    action TEXT NOT NULL,
    payload JSONB NOT NULL,
    user_id UUID,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_updated_at ON entries(updated_at);
CREATE INDEX IF NOT EXISTS idx_meanings_entry_id ON meanings(entry_id, created_at);
CREATE INDEX IF NOT EXISTS idx_examples_meaning_id ON examples(meaning_id, created_at);
CREATE INDEX IF NOT EXISTS idx_translations_meaning_id ON translations(meaning_id, created_at);
CREATE INDEX IF NOT EXISTS idx_change_history_entry_id ON change_history(entry_id, created_at);
"#;

/// Read transactions see one snapshot of the whole graph.
pub const SNAPSHOT: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY";

// Entry queries
pub const INSERT_ENTRY: &str = r#"
INSERT INTO entries (id, word, entry_type, pronunciation, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6)
"#;

pub const SELECT_ENTRY_BY_ID: &str = r#"
SELECT id, word, entry_type, pronunciation, created_at, updated_at
FROM entries
WHERE id = $1
"#;

pub const LOCK_ENTRY: &str = "SELECT id FROM entries WHERE id = $1 FOR UPDATE";

pub const UPDATE_ENTRY: &str = r#"
UPDATE entries
SET word = $2, entry_type = $3, pronunciation = $4, updated_at = $5
WHERE id = $1
"#;

pub const DELETE_ENTRY: &str = "DELETE FROM entries WHERE id = $1";

const LIST_FILTER: &str = "($1::text IS NULL OR strpos(lower(word), $1) > 0) AND ($2::text IS NULL OR entry_type = $2)";

pub fn count_entries_sql() -> String {
    format!("SELECT COUNT(*) FROM entries WHERE {LIST_FILTER}")
}

/// Page query. The word sort uses byte order so that every backend agrees
/// on the result regardless of the database collation.
pub fn list_entries_sql(sort: SortField, direction: &str) -> String {
    let order_expr = match sort {
        SortField::Word => "lower(word) COLLATE \"C\"",
        other => other.order_expr(),
    };
    format!(
        "SELECT id, word, entry_type, pronunciation, created_at, updated_at \
         FROM entries WHERE {LIST_FILTER} \
         ORDER BY {order_expr} {direction}, id {direction} \
         LIMIT $3 OFFSET $4"
    )
}

// Meaning queries
pub const INSERT_MEANING: &str = r#"
INSERT INTO meanings (id, entry_id, part_of_speech_id, description, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6)
"#;

pub const SELECT_MEANING_BY_ID: &str = r#"
SELECT id, entry_id, part_of_speech_id, description, created_at, updated_at
FROM meanings
WHERE id = $1
"#;

pub const LOCK_MEANING: &str = "SELECT id FROM meanings WHERE id = $1 FOR UPDATE";

pub const SELECT_MEANINGS_BY_ENTRY: &str = r#"
SELECT id, entry_id, part_of_speech_id, description, created_at, updated_at
FROM meanings
WHERE entry_id = $1
ORDER BY created_at ASC, id ASC
"#;

pub const UPDATE_MEANING: &str = r#"
UPDATE meanings
SET part_of_speech_id = $2, description = $3, updated_at = $4
WHERE id = $1
"#;

pub const DELETE_MEANING: &str = "DELETE FROM meanings WHERE id = $1";

// Example queries
pub const INSERT_EXAMPLE: &str = r#"
INSERT INTO examples (id, meaning_id, text, context, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6)
"#;

pub const SELECT_EXAMPLE_BY_ID: &str = r#"
SELECT id, meaning_id, text, context, created_at, updated_at
FROM examples
WHERE id = $1
"#;

pub const SELECT_EXAMPLES_BY_MEANING: &str = r#"
SELECT id, meaning_id, text, context, created_at, updated_at
FROM examples
WHERE meaning_id = $1
ORDER BY created_at ASC, id ASC
"#;

pub const UPDATE_EXAMPLE: &str = r#"
UPDATE examples
SET text = $2, context = $3, updated_at = $4
WHERE id = $1
"#;

pub const DELETE_EXAMPLE: &str = "DELETE FROM examples WHERE id = $1";

// Translation queries
pub const INSERT_TRANSLATION: &str = r#"
INSERT INTO translations (id, meaning_id, language, text, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6)
"#;

pub const SELECT_TRANSLATION_BY_ID: &str = r#"
SELECT id, meaning_id, language, text, created_at, updated_at
FROM translations
WHERE id = $1
"#;

pub const SELECT_TRANSLATIONS_BY_MEANING: &str = r#"
SELECT id, meaning_id, language, text, created_at, updated_at
FROM translations
WHERE meaning_id = $1 AND ($2::text IS NULL OR lower(language) = lower($2))
ORDER BY created_at ASC, id ASC
"#;

pub const UPDATE_TRANSLATION: &str = r#"
UPDATE translations
SET language = $2, text = $3, updated_at = $4
WHERE id = $1
"#;

pub const DELETE_TRANSLATION: &str = "DELETE FROM translations WHERE id = $1";

// Change history queries
pub const INSERT_CHANGE: &str = r#"
INSERT INTO change_history (id, entry_id, action, payload, user_id, created_at)
VALUES ($1, $2, $3, $4, $5, $6)
"#;

pub const SELECT_CHANGES_BY_ENTRY: &str = r#"
SELECT id, entry_id, action, payload, user_id, created_at
FROM change_history
WHERE entry_id = $1
ORDER BY created_at ASC, id ASC
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_sort_uses_byte_collation() {
        let sql = list_entries_sql(SortField::Word, "ASC");
        assert!(sql.contains("ORDER BY lower(word) COLLATE \"C\" ASC, id ASC"));
    }

    #[test]
    fn test_timestamp_sort_uses_column() {
        let sql = list_entries_sql(SortField::UpdatedAt, "DESC");
        assert!(sql.contains("ORDER BY updated_at DESC, id DESC"));
    }

    #[test]
    fn test_schema_declares_cascades() {
        assert_eq!(CREATE_TABLES.matches("ON DELETE CASCADE").count(), 3);
        assert!(CREATE_TABLES.contains("payload JSONB NOT NULL"));
    }
}
