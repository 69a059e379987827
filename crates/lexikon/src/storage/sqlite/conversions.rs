//! SQLite row conversion functions.
//!
//! Pure functions for converting between SQLite rows and domain types.
//! Row converters build nodes without children; the repository attaches
//! them afterwards.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use lexikon_core::dictionary::{ChangeAction, ChangeHistory, Entry, Example, Meaning, Translation};

/// Expected columns: id, word, entry_type, pronunciation, created_at, updated_at
pub fn row_to_entry(row: &Row) -> rusqlite::Result<Entry> {
    let id: String = row.get(0)?;
    let word: String = row.get(1)?;
    let entry_type: String = row.get(2)?;
    let pronunciation: Option<String> = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(Entry {
        id: parse_uuid(0, &id)?,
        word,
        entry_type: entry_type.parse().map_err(|e: String| conversion_error(2, e))?,
        pronunciation,
        created_at: parse_datetime(4, &created_at)?,
        updated_at: parse_datetime(5, &updated_at)?,
        meanings: Vec::new(),
    })
}

/// Expected columns: id, entry_id, part_of_speech_id, description, created_at, updated_at
pub fn row_to_meaning(row: &Row) -> rusqlite::Result<Meaning> {
    let id: String = row.get(0)?;
    let entry_id: String = row.get(1)?;
    let part_of_speech_id: String = row.get(2)?;
    let description: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(Meaning {
        id: parse_uuid(0, &id)?,
        entry_id: parse_uuid(1, &entry_id)?,
        part_of_speech_id: parse_uuid(2, &part_of_speech_id)?,
        description,
        examples: Vec::new(),
        translations: Vec::new(),
        created_at: parse_datetime(4, &created_at)?,
        updated_at: parse_datetime(5, &updated_at)?,
    })
}

/// Expected columns: id, meaning_id, text, context, created_at, updated_at
pub fn row_to_example(row: &Row) -> rusqlite::Result<Example> {
    let id: String = row.get(0)?;
    let meaning_id: String = row.get(1)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(Example {
        id: parse_uuid(0, &id)?,
        meaning_id: parse_uuid(1, &meaning_id)?,
        text: row.get(2)?,
        context: row.get(3)?,
        created_at: parse_datetime(4, &created_at)?,
        updated_at: parse_datetime(5, &updated_at)?,
    })
}

/// Expected columns: id, meaning_id, language, text, created_at, updated_at
pub fn row_to_translation(row: &Row) -> rusqlite::Result<Translation> {
    let id: String = row.get(0)?;
    let meaning_id: String = row.get(1)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(Translation {
        id: parse_uuid(0, &id)?,
        meaning_id: parse_uuid(1, &meaning_id)?,
        language: row.get(2)?,
        text: row.get(3)?,
        created_at: parse_datetime(4, &created_at)?,
        updated_at: parse_datetime(5, &updated_at)?,
    })
}

/// Expected columns: id, entry_id, action, payload, user_id, created_at
pub fn row_to_change(row: &Row) -> rusqlite::Result<ChangeHistory> {
    let id: String = row.get(0)?;
    let entry_id: String = row.get(1)?;
    let action: String = row.get(2)?;
    let payload: String = row.get(3)?;
    let user_id: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(ChangeHistory {
        id: parse_uuid(0, &id)?,
        entry_id: parse_uuid(1, &entry_id)?,
        action: action
            .parse::<ChangeAction>()
            .map_err(|e| conversion_error(2, e))?,
        payload: serde_json::from_str(&payload).map_err(|e| conversion_error(3, e))?,
        user_id: user_id.map(|u| parse_uuid(4, &u)).transpose()?,
        created_at: parse_datetime(5, &created_at)?,
    })
}

/// Fixed-width RFC 3339 with microseconds, always `Z`.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conversion_error(idx, e))
}

fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexikon_core::dictionary::timestamp_now;

    #[test]
    fn test_format_datetime_is_fixed_width() {
        let whole = DateTime::parse_from_rfc3339("2024-06-15T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let fractional = DateTime::parse_from_rfc3339("2024-06-15T10:30:00.5Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(format_datetime(&whole), "2024-06-15T10:30:00.000000Z");
        assert_eq!(format_datetime(&fractional), "2024-06-15T10:30:00.500000Z");
        assert!(format_datetime(&whole) < format_datetime(&fractional));
    }

    #[test]
    fn test_datetime_survives_storage_format() {
        let now = timestamp_now();
        assert_eq!(parse_datetime(0, &format_datetime(&now)).unwrap(), now);
    }

    #[test]
    fn test_parse_uuid_invalid() {
        assert!(parse_uuid(0, "not-a-uuid").is_err());
    }

    #[test]
    fn test_parse_datetime_invalid() {
        assert!(parse_datetime(0, "yesterday").is_err());
    }
}
