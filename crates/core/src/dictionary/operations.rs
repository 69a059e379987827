use chrono::{DateTime, SubsecRound, Utc};

use super::error::ValidationError;
use super::requests::{
    EntryPatch, ExamplePatch, MeaningPatch, NewEntry, NewExample, NewMeaning, NewTranslation,
    TranslationPatch,
};
use super::types::Entry;

const MAX_WORD_LEN: usize = 200;
const MAX_COMMENT_LEN: usize = 2000;

/// Validates a creation payload and its whole subtree.
pub fn validate_new_entry(entry: &NewEntry) -> Result<(), ValidationError> {
    validate_word(&entry.word)?;
    entry.meanings.iter().try_for_each(validate_new_meaning)
}

/// Validates the supplied fields of a sparse entry update.
pub fn validate_entry_patch(patch: &EntryPatch) -> Result<(), ValidationError> {
    if let Some(word) = &patch.word {
        validate_word(word)?;
    }
    patch.meanings.iter().try_for_each(validate_meaning_patch)
}

pub fn validate_new_meaning(meaning: &NewMeaning) -> Result<(), ValidationError> {
    if meaning.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    meaning.examples.iter().try_for_each(validate_new_example)?;
    meaning.translations.iter().try_for_each(validate_new_translation)
}

pub fn validate_meaning_patch(patch: &MeaningPatch) -> Result<(), ValidationError> {
    if patch.description.as_deref().is_some_and(|d| d.trim().is_empty()) {
        return Err(ValidationError::EmptyDescription);
    }
    patch.examples.iter().try_for_each(validate_example_patch)?;
    patch.translations.iter().try_for_each(validate_translation_patch)
}

pub fn validate_new_example(example: &NewExample) -> Result<(), ValidationError> {
    if example.text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(())
}

pub fn validate_example_patch(patch: &ExamplePatch) -> Result<(), ValidationError> {
    if patch.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ValidationError::EmptyText);
    }
    Ok(())
}

pub fn validate_new_translation(translation: &NewTranslation) -> Result<(), ValidationError> {
    validate_language(&translation.language)?;
    if translation.text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(())
}

pub fn validate_translation_patch(patch: &TranslationPatch) -> Result<(), ValidationError> {
    if let Some(language) = &patch.language {
        validate_language(language)?;
    }
    if patch.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ValidationError::EmptyText);
    }
    Ok(())
}

/// Language codes are 2 to 5 ASCII letters (`en`, `es`, `haw`).
pub fn validate_language(language: &str) -> Result<(), ValidationError> {
    let valid = (2..=5).contains(&language.len()) && language.chars().all(|c| c.is_ascii_alphabetic());
    if !valid {
        return Err(ValidationError::InvalidLanguage(language.to_string()));
    }
    Ok(())
}

pub fn validate_comment(body: &str) -> Result<(), ValidationError> {
    if body.trim().is_empty() {
        return Err(ValidationError::EmptyComment);
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(ValidationError::CommentTooLong);
    }
    Ok(())
}

/// Current time truncated to microseconds, the finest precision every
/// backend stores. Captured once per operation and shared by all its writes.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Orders every child collection of the graph by `(created_at, id)`.
///
/// Backends call this after loading rows so that all of them return
/// children in the same order.
pub fn sort_children(entry: &mut Entry) {
    entry.meanings.sort_by_key(|m| (m.created_at, m.id));
    for meaning in &mut entry.meanings {
        meaning.examples.sort_by_key(|e| (e.created_at, e.id));
        meaning.translations.sort_by_key(|t| (t.created_at, t.id));
    }
}

fn validate_word(word: &str) -> Result<(), ValidationError> {
    if word.trim().is_empty() {
        return Err(ValidationError::EmptyWord);
    }
    if word.chars().count() > MAX_WORD_LEN {
        return Err(ValidationError::WordTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{EntryType, Meaning};
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn test_validate_new_entry_success() {
        let entry = NewEntry::new("apple", EntryType::Word).with_meaning(
            NewMeaning::new(Uuid::new_v4(), "a fruit")
                .with_translation(NewTranslation::new("es", "manzana")),
        );
        assert!(validate_new_entry(&entry).is_ok());
    }

    #[test]
    fn test_validate_new_entry_empty_word() {
        let entry = NewEntry::new("   ", EntryType::Word);
        assert_eq!(validate_new_entry(&entry), Err(ValidationError::EmptyWord));
    }

    #[test]
    fn test_validate_new_entry_word_too_long() {
        let entry = NewEntry::new("a".repeat(201), EntryType::Phrase);
        assert_eq!(validate_new_entry(&entry), Err(ValidationError::WordTooLong));
    }

    #[test]
    fn test_validate_new_entry_nested_language() {
        let entry = NewEntry::new("apple", EntryType::Word).with_meaning(
            NewMeaning::new(Uuid::new_v4(), "a fruit")
                .with_translation(NewTranslation::new("spanish", "manzana")),
        );
        assert_eq!(
            validate_new_entry(&entry),
            Err(ValidationError::InvalidLanguage("spanish".to_string()))
        );
    }

    #[test]
    fn test_validate_language() {
        assert!(validate_language("en").is_ok());
        assert!(validate_language("haw").is_ok());
        assert!(validate_language("e").is_err());
        assert!(validate_language("abcdef").is_err());
        assert!(validate_language("e1").is_err());
    }

    #[test]
    fn test_validate_entry_patch_only_checks_supplied_fields() {
        let id = Uuid::new_v4();
        assert!(validate_entry_patch(&EntryPatch::new(id)).is_ok());
        assert_eq!(
            validate_entry_patch(&EntryPatch::new(id).with_word("")),
            Err(ValidationError::EmptyWord)
        );
        let nested = EntryPatch::new(id).with_meaning(
            MeaningPatch::existing(Uuid::new_v4())
                .with_translation(TranslationPatch::existing(Uuid::new_v4()).with_language("x")),
        );
        assert!(matches!(
            validate_entry_patch(&nested),
            Err(ValidationError::InvalidLanguage(_))
        ));
    }

    #[test]
    fn test_validate_comment() {
        assert!(validate_comment("nice word").is_ok());
        assert_eq!(validate_comment(" "), Err(ValidationError::EmptyComment));
        assert_eq!(
            validate_comment(&"x".repeat(2001)),
            Err(ValidationError::CommentTooLong)
        );
    }

    #[test]
    fn test_timestamp_now_has_microsecond_precision() {
        let now = timestamp_now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_sort_children_orders_by_created_at_then_id() {
        let now = Utc::now();
        let earlier = now - Duration::seconds(10);
        let pos = Uuid::new_v4();
        let late = Meaning::new(Uuid::nil(), pos, "late", now);
        let early = Meaning::new(Uuid::nil(), pos, "early", earlier);
        let mut entry = Entry::new("apple", EntryType::Word, earlier)
            .with_meaning(late)
            .with_meaning(early);

        sort_children(&mut entry);

        assert_eq!(entry.meanings[0].description, "early");
        assert_eq!(entry.meanings[1].description, "late");
    }
}
