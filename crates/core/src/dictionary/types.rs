use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::operations::timestamp_now;

/// Closed set of dictionary entry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Word,
    CompoundWord,
    Phrase,
}

impl EntryType {
    /// Returns the storage representation of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Word => "WORD",
            EntryType::CompoundWord => "COMPOUND_WORD",
            EntryType::Phrase => "PHRASE",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WORD" => Ok(EntryType::Word),
            "COMPOUND_WORD" => Ok(EntryType::CompoundWord),
            "PHRASE" => Ok(EntryType::Phrase),
            other => Err(format!("Unknown entry type: {other}")),
        }
    }
}

/// A dictionary entry together with its whole meaning subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub word: String,
    pub entry_type: EntryType,
    pub pronunciation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub meanings: Vec<Meaning>,
}

impl Entry {
    /// Creates an entry with a fresh id, stamped at `now`, with no meanings.
    pub fn new(word: impl Into<String>, entry_type: EntryType, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            word: word.into(),
            entry_type,
            pronunciation: None,
            created_at: now,
            updated_at: now,
            meanings: Vec::new(),
        }
    }

    /// Sets the pronunciation.
    pub fn with_pronunciation(mut self, pronunciation: impl Into<String>) -> Self {
        self.pronunciation = Some(pronunciation.into());
        self
    }

    /// Sets a specific ID for this entry (useful for testing).
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Appends a meaning, re-parenting it to this entry.
    pub fn with_meaning(mut self, mut meaning: Meaning) -> Self {
        meaning.entry_id = self.id;
        self.meanings.push(meaning);
        self
    }

    /// Finds a meaning of this entry by id.
    pub fn meaning(&self, id: Uuid) -> Option<&Meaning> {
        self.meanings.iter().find(|m| m.id == id)
    }

    /// Number of nodes in the graph, the entry itself included.
    pub fn node_count(&self) -> usize {
        1 + self.meanings.iter().map(Meaning::node_count).sum::<usize>()
    }
}

/// One sense of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meaning {
    pub id: Uuid,
    pub entry_id: Uuid,
    /// Opaque reference into the external part-of-speech taxonomy.
    pub part_of_speech_id: Uuid,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default)]
    pub translations: Vec<Translation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meaning {
    pub fn new(
        entry_id: Uuid,
        part_of_speech_id: Uuid,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_id,
            part_of_speech_id,
            description: description.into(),
            examples: Vec::new(),
            translations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends an example, re-parenting it to this meaning.
    pub fn with_example(mut self, mut example: Example) -> Self {
        example.meaning_id = self.id;
        self.examples.push(example);
        self
    }

    /// Appends a translation, re-parenting it to this meaning.
    pub fn with_translation(mut self, mut translation: Translation) -> Self {
        translation.meaning_id = self.id;
        self.translations.push(translation);
        self
    }

    pub fn node_count(&self) -> usize {
        1 + self.examples.len() + self.translations.len()
    }
}

/// A usage illustration of a meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub id: Uuid,
    pub meaning_id: Uuid,
    pub text: String,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Example {
    pub fn new(meaning_id: Uuid, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            meaning_id,
            text: text.into(),
            context: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// A rendering of a meaning in another language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: Uuid,
    pub meaning_id: Uuid,
    /// ISO-639-1-like language code, 2 to 5 characters.
    pub language: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Translation {
    pub fn new(
        meaning_id: Uuid,
        language: impl Into<String>,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            meaning_id,
            language: language.into(),
            text: text.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of change recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Update => "UPDATE",
            ChangeAction::Delete => "DELETE",
        }
    }
}

impl FromStr for ChangeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(ChangeAction::Create),
            "UPDATE" => Ok(ChangeAction::Update),
            "DELETE" => Ok(ChangeAction::Delete),
            other => Err(format!("Unknown change action: {other}")),
        }
    }
}

/// Audit record for an entry mutation. Outlives the entry it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeHistory {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub action: ChangeAction,
    pub payload: serde_json::Value,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ChangeHistory {
    pub fn new(
        entry_id: Uuid,
        action: ChangeAction,
        payload: serde_json::Value,
        user_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_id,
            action,
            payload,
            user_id,
            created_at: timestamp_now(),
        }
    }
}

/// A user comment attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub user_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(entry_id: Uuid, user_id: Uuid, body: impl Into<String>) -> Self {
        let now = timestamp_now();
        Self {
            id: Uuid::new_v4(),
            entry_id,
            user_id,
            body: body.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A user's like on an entry. At most one per (entry, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub entry_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_roundtrip_str() {
        for ty in [EntryType::Word, EntryType::CompoundWord, EntryType::Phrase] {
            assert_eq!(ty.as_str().parse::<EntryType>().unwrap(), ty);
        }
        assert_eq!("phrase".parse::<EntryType>().unwrap(), EntryType::Phrase);
        assert!("IDIOM".parse::<EntryType>().is_err());
    }

    #[test]
    fn test_entry_type_serde_uses_screaming_case() {
        let json = serde_json::to_string(&EntryType::CompoundWord).unwrap();
        assert_eq!(json, "\"COMPOUND_WORD\"");
    }

    #[test]
    fn test_with_meaning_reparents() {
        let now = Utc::now();
        let meaning = Meaning::new(Uuid::nil(), Uuid::new_v4(), "a fruit", now);
        let entry = Entry::new("apple", EntryType::Word, now).with_meaning(meaning);

        assert_eq!(entry.meanings[0].entry_id, entry.id);
    }

    #[test]
    fn test_node_count_includes_descendants() {
        let now = Utc::now();
        let meaning = Meaning::new(Uuid::nil(), Uuid::new_v4(), "a fruit", now)
            .with_example(Example::new(Uuid::nil(), "An apple a day", now))
            .with_translation(Translation::new(Uuid::nil(), "es", "manzana", now));
        let entry = Entry::new("apple", EntryType::Word, now).with_meaning(meaning);

        assert_eq!(entry.node_count(), 4);
    }
}
