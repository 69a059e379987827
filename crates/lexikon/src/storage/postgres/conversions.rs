//! PostgreSQL row conversion functions.
//!
//! Rows are fetched as tuples and converted here; nodes come back without
//! children.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use lexikon_core::dictionary::{ChangeAction, ChangeHistory, Entry, Example, Meaning, Translation};
use lexikon_core::storage::{RepositoryError, Result};

pub type EntryRow = (Uuid, String, String, Option<String>, DateTime<Utc>, DateTime<Utc>);
pub type MeaningRow = (Uuid, Uuid, Uuid, String, DateTime<Utc>, DateTime<Utc>);
pub type ExampleRow = (Uuid, Uuid, String, Option<String>, DateTime<Utc>, DateTime<Utc>);
pub type TranslationRow = (Uuid, Uuid, String, String, DateTime<Utc>, DateTime<Utc>);
pub type ChangeRow = (Uuid, Uuid, String, serde_json::Value, Option<Uuid>, DateTime<Utc>);

pub fn entry_from_row(row: EntryRow) -> Result<Entry> {
    let (id, word, entry_type, pronunciation, created_at, updated_at) = row;
    Ok(Entry {
        id,
        word,
        entry_type: entry_type
            .parse()
            .map_err(|e: String| RepositoryError::storage("decode", "entries", e))?,
        pronunciation,
        created_at,
        updated_at,
        meanings: Vec::new(),
    })
}

pub fn meaning_from_row(row: MeaningRow) -> Meaning {
    let (id, entry_id, part_of_speech_id, description, created_at, updated_at) = row;
    Meaning {
        id,
        entry_id,
        part_of_speech_id,
        description,
        examples: Vec::new(),
        translations: Vec::new(),
        created_at,
        updated_at,
    }
}

pub fn example_from_row(row: ExampleRow) -> Example {
    let (id, meaning_id, text, context, created_at, updated_at) = row;
    Example {
        id,
        meaning_id,
        text,
        context,
        created_at,
        updated_at,
    }
}

pub fn translation_from_row(row: TranslationRow) -> Translation {
    let (id, meaning_id, language, text, created_at, updated_at) = row;
    Translation {
        id,
        meaning_id,
        language,
        text,
        created_at,
        updated_at,
    }
}

pub fn change_from_row(row: ChangeRow) -> Result<ChangeHistory> {
    let (id, entry_id, action, payload, user_id, created_at) = row;
    Ok(ChangeHistory {
        id,
        entry_id,
        action: action
            .parse::<ChangeAction>()
            .map_err(|e| RepositoryError::storage("decode", "change_history", e))?,
        payload,
        user_id,
        created_at,
    })
}
