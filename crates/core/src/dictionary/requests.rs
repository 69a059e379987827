//! Write payloads for the dictionary graph.
//!
//! `New*` types describe nodes that do not exist yet and therefore carry no
//! identity. `*Patch` types describe sparse updates: `None` fields are left
//! untouched, nested patches without an `id` are new nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{Entry, EntryType, Example, Meaning, Translation};

/// Payload for creating an entry together with an optional subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub word: String,
    pub entry_type: EntryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    #[serde(default)]
    pub meanings: Vec<NewMeaning>,
}

impl NewEntry {
    pub fn new(word: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            word: word.into(),
            entry_type,
            pronunciation: None,
            meanings: Vec::new(),
        }
    }

    pub fn with_pronunciation(mut self, pronunciation: impl Into<String>) -> Self {
        self.pronunciation = Some(pronunciation.into());
        self
    }

    pub fn with_meaning(mut self, meaning: NewMeaning) -> Self {
        self.meanings.push(meaning);
        self
    }

    /// Assigns ids to every node and stamps them with `now`.
    pub fn into_entry(self, now: DateTime<Utc>) -> Entry {
        let mut entry = Entry::new(self.word, self.entry_type, now);
        entry.pronunciation = self.pronunciation;
        entry.meanings = self
            .meanings
            .into_iter()
            .map(|m| m.into_meaning(entry.id, now))
            .collect();
        entry
    }
}

/// Payload for creating a meaning, with optional children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMeaning {
    pub part_of_speech_id: Uuid,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<NewExample>,
    #[serde(default)]
    pub translations: Vec<NewTranslation>,
}

impl NewMeaning {
    pub fn new(part_of_speech_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            part_of_speech_id,
            description: description.into(),
            examples: Vec::new(),
            translations: Vec::new(),
        }
    }

    pub fn with_example(mut self, example: NewExample) -> Self {
        self.examples.push(example);
        self
    }

    pub fn with_translation(mut self, translation: NewTranslation) -> Self {
        self.translations.push(translation);
        self
    }

    pub fn into_meaning(self, entry_id: Uuid, now: DateTime<Utc>) -> Meaning {
        let mut meaning = Meaning::new(entry_id, self.part_of_speech_id, self.description, now);
        meaning.examples = self
            .examples
            .into_iter()
            .map(|e| e.into_example(meaning.id, now))
            .collect();
        meaning.translations = self
            .translations
            .into_iter()
            .map(|t| t.into_translation(meaning.id, now))
            .collect();
        meaning
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExample {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl NewExample {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn into_example(self, meaning_id: Uuid, now: DateTime<Utc>) -> Example {
        let mut example = Example::new(meaning_id, self.text, now);
        example.context = self.context;
        example
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTranslation {
    pub language: String,
    pub text: String,
}

impl NewTranslation {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            text: text.into(),
        }
    }

    pub fn into_translation(self, meaning_id: Uuid, now: DateTime<Utc>) -> Translation {
        Translation::new(meaning_id, self.language, self.text, now)
    }
}

/// Sparse update of an entry graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default)]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<EntryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meanings: Vec<MeaningPatch>,
}

impl EntryPatch {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn with_word(mut self, word: impl Into<String>) -> Self {
        self.word = Some(word.into());
        self
    }

    pub fn with_entry_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn with_pronunciation(mut self, pronunciation: impl Into<String>) -> Self {
        self.pronunciation = Some(pronunciation.into());
        self
    }

    pub fn with_meaning(mut self, meaning: MeaningPatch) -> Self {
        self.meanings.push(meaning);
        self
    }

    /// Returns true if no scalar field of the entry itself is supplied.
    pub fn has_no_entry_fields(&self) -> bool {
        self.word.is_none() && self.entry_type.is_none() && self.pronunciation.is_none()
    }
}

/// Sparse update of a meaning. Without an `id` it describes a new meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeaningPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ExamplePatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<TranslationPatch>,
}

impl MeaningPatch {
    /// Patch for an existing meaning.
    pub fn existing(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Patch describing a brand new meaning.
    pub fn create(part_of_speech_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            part_of_speech_id: Some(part_of_speech_id),
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_part_of_speech(mut self, part_of_speech_id: Uuid) -> Self {
        self.part_of_speech_id = Some(part_of_speech_id);
        self
    }

    pub fn with_example(mut self, example: ExamplePatch) -> Self {
        self.examples.push(example);
        self
    }

    pub fn with_translation(mut self, translation: TranslationPatch) -> Self {
        self.translations.push(translation);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ExamplePatch {
    pub fn existing(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn create(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl TranslationPatch {
    pub fn existing(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn create(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: None,
            language: Some(language.into()),
            text: Some(text.into()),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}
