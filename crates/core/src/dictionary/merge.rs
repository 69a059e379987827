//! Sparse merge of graph patches.
//!
//! Backends load the current graph inside their write transaction, call into
//! this module to compute the merged graph plus the list of nodes to insert
//! or overwrite, then persist exactly those rows. Nodes the patch does not
//! reference are never part of the plan, so they are never touched.
//!
//! This is part of the Functional Core - all functions are pure with no side effects.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::requests::{EntryPatch, ExamplePatch, MeaningPatch, NewExample, NewTranslation, TranslationPatch};
use super::types::{Entry, Example, Meaning, Translation};

/// Reasons a patch cannot be applied to the current graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// A new node (no id) lacks a field required for creation.
    #[error("New {node} is missing required field `{field}`")]
    MissingField {
        node: &'static str,
        field: &'static str,
    },
    /// A patch references a child id that is not a child of the patched parent.
    #[error("{entity_type} {id} is not part of the patched graph")]
    UnknownChild { entity_type: &'static str, id: Uuid },
    /// A patch that must target an existing node carries no id.
    #[error("{node} patch requires an id")]
    MissingId { node: &'static str },
}

/// Whether a node in a plan is new or overwrites an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeChange {
    Insert,
    Update,
}

/// Rows a backend must write to persist a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub meanings: Vec<(Uuid, NodeChange)>,
    pub examples: Vec<(Uuid, NodeChange)>,
    pub translations: Vec<(Uuid, NodeChange)>,
}

impl ChangeSet {
    /// Number of child rows touched by the plan.
    pub fn len(&self) -> usize {
        self.meanings.len() + self.examples.len() + self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of merging an [`EntryPatch`] into the stored graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMerge {
    /// The graph as it will look after the write.
    pub entry: Entry,
    pub changes: ChangeSet,
}

impl EntryMerge {
    /// Iterates the meanings to write, resolved against the merged graph.
    pub fn meaning_writes(&self) -> impl Iterator<Item = (&Meaning, NodeChange)> {
        resolve(&self.changes.meanings, move |id| self.entry.meaning(id))
    }

    pub fn example_writes(&self) -> impl Iterator<Item = (&Example, NodeChange)> {
        resolve(&self.changes.examples, move |id| find_example(&self.entry.meanings, id))
    }

    pub fn translation_writes(&self) -> impl Iterator<Item = (&Translation, NodeChange)> {
        resolve(&self.changes.translations, move |id| {
            find_translation(&self.entry.meanings, id)
        })
    }
}

/// Result of merging a [`MeaningPatch`] into one stored meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeaningMerge {
    pub meaning: Meaning,
    pub changes: ChangeSet,
}

impl MeaningMerge {
    pub fn example_writes(&self) -> impl Iterator<Item = (&Example, NodeChange)> {
        resolve(&self.changes.examples, move |id| {
            find_example(std::slice::from_ref(&self.meaning), id)
        })
    }

    pub fn translation_writes(&self) -> impl Iterator<Item = (&Translation, NodeChange)> {
        resolve(&self.changes.translations, move |id| {
            find_translation(std::slice::from_ref(&self.meaning), id)
        })
    }
}

fn resolve<'a, T: 'a>(
    changes: &'a [(Uuid, NodeChange)],
    lookup: impl Fn(Uuid) -> Option<&'a T> + 'a,
) -> impl Iterator<Item = (&'a T, NodeChange)> + 'a {
    changes
        .iter()
        .filter_map(move |(id, change)| lookup(*id).map(|node| (node, *change)))
}

fn find_example(meanings: &[Meaning], id: Uuid) -> Option<&Example> {
    meanings
        .iter()
        .flat_map(|m| m.examples.iter())
        .find(|e| e.id == id)
}

fn find_translation(meanings: &[Meaning], id: Uuid) -> Option<&Translation> {
    meanings
        .iter()
        .flat_map(|m| m.translations.iter())
        .find(|t| t.id == id)
}

/// Merges a sparse patch into the current entry graph.
///
/// The entry's own `updated_at` always advances to `now`: the operation
/// targets the entry, even when only nested nodes are supplied.
pub fn merge_entry(current: &Entry, patch: &EntryPatch, now: DateTime<Utc>) -> Result<EntryMerge, MergeError> {
    let mut entry = current.clone();
    let mut changes = ChangeSet::default();

    if let Some(word) = &patch.word {
        entry.word = word.clone();
    }
    if let Some(entry_type) = patch.entry_type {
        entry.entry_type = entry_type;
    }
    if let Some(pronunciation) = &patch.pronunciation {
        entry.pronunciation = Some(pronunciation.clone());
    }
    entry.updated_at = now;

    for meaning_patch in &patch.meanings {
        match meaning_patch.id {
            Some(id) => {
                let Some(position) = entry.meanings.iter().position(|m| m.id == id) else {
                    return Err(MergeError::UnknownChild {
                        entity_type: "Meaning",
                        id,
                    });
                };
                let merged = merge_meaning_into(&entry.meanings[position], meaning_patch, now, &mut changes)?;
                entry.meanings[position] = merged;
                changes.meanings.push((id, NodeChange::Update));
            }
            None => {
                let meaning = new_meaning_from_patch(entry.id, meaning_patch, now, &mut changes)?;
                changes.meanings.push((meaning.id, NodeChange::Insert));
                entry.meanings.push(meaning);
            }
        }
    }

    Ok(EntryMerge { entry, changes })
}

/// Merges a sparse patch into a single stored meaning.
pub fn merge_meaning(current: &Meaning, patch: &MeaningPatch, now: DateTime<Utc>) -> Result<MeaningMerge, MergeError> {
    if patch.id.is_none() {
        return Err(MergeError::MissingId { node: "Meaning" });
    }
    let mut changes = ChangeSet::default();
    let meaning = merge_meaning_into(current, patch, now, &mut changes)?;
    changes.meanings.push((meaning.id, NodeChange::Update));
    Ok(MeaningMerge { meaning, changes })
}

/// Builds a meaning from a creation patch. Nested patches must all be new.
pub fn new_meaning_from_patch(
    entry_id: Uuid,
    patch: &MeaningPatch,
    now: DateTime<Utc>,
    changes: &mut ChangeSet,
) -> Result<Meaning, MergeError> {
    let part_of_speech_id = patch.part_of_speech_id.ok_or(MergeError::MissingField {
        node: "Meaning",
        field: "part_of_speech_id",
    })?;
    let description = patch.description.clone().ok_or(MergeError::MissingField {
        node: "Meaning",
        field: "description",
    })?;

    let mut meaning = Meaning::new(entry_id, part_of_speech_id, description, now);
    for example_patch in &patch.examples {
        if let Some(id) = example_patch.id {
            return Err(MergeError::UnknownChild {
                entity_type: "Example",
                id,
            });
        }
        let example = new_example_from_patch(example_patch)?.into_example(meaning.id, now);
        changes.examples.push((example.id, NodeChange::Insert));
        meaning.examples.push(example);
    }
    for translation_patch in &patch.translations {
        if let Some(id) = translation_patch.id {
            return Err(MergeError::UnknownChild {
                entity_type: "Translation",
                id,
            });
        }
        let translation = new_translation_from_patch(translation_patch)?.into_translation(meaning.id, now);
        changes.translations.push((translation.id, NodeChange::Insert));
        meaning.translations.push(translation);
    }
    Ok(meaning)
}

fn merge_meaning_into(
    current: &Meaning,
    patch: &MeaningPatch,
    now: DateTime<Utc>,
    changes: &mut ChangeSet,
) -> Result<Meaning, MergeError> {
    let mut meaning = current.clone();
    if let Some(pos) = patch.part_of_speech_id {
        meaning.part_of_speech_id = pos;
    }
    if let Some(description) = &patch.description {
        meaning.description = description.clone();
    }
    meaning.updated_at = now;

    for example_patch in &patch.examples {
        match example_patch.id {
            Some(id) => {
                let Some(example) = meaning.examples.iter_mut().find(|e| e.id == id) else {
                    return Err(MergeError::UnknownChild {
                        entity_type: "Example",
                        id,
                    });
                };
                apply_example_patch(example, example_patch, now);
                changes.examples.push((id, NodeChange::Update));
            }
            None => {
                let example = new_example_from_patch(example_patch)?.into_example(meaning.id, now);
                changes.examples.push((example.id, NodeChange::Insert));
                meaning.examples.push(example);
            }
        }
    }

    for translation_patch in &patch.translations {
        match translation_patch.id {
            Some(id) => {
                let Some(translation) = meaning.translations.iter_mut().find(|t| t.id == id) else {
                    return Err(MergeError::UnknownChild {
                        entity_type: "Translation",
                        id,
                    });
                };
                apply_translation_patch(translation, translation_patch, now);
                changes.translations.push((id, NodeChange::Update));
            }
            None => {
                let translation = new_translation_from_patch(translation_patch)?.into_translation(meaning.id, now);
                changes.translations.push((translation.id, NodeChange::Insert));
                meaning.translations.push(translation);
            }
        }
    }

    Ok(meaning)
}

/// Overwrites the supplied fields of an example and stamps it.
pub fn apply_example_patch(example: &mut Example, patch: &ExamplePatch, now: DateTime<Utc>) {
    if let Some(text) = &patch.text {
        example.text = text.clone();
    }
    if let Some(context) = &patch.context {
        example.context = Some(context.clone());
    }
    example.updated_at = now;
}

/// Overwrites the supplied fields of a translation and stamps it.
pub fn apply_translation_patch(translation: &mut Translation, patch: &TranslationPatch, now: DateTime<Utc>) {
    if let Some(language) = &patch.language {
        translation.language = language.clone();
    }
    if let Some(text) = &patch.text {
        translation.text = text.clone();
    }
    translation.updated_at = now;
}

fn new_example_from_patch(patch: &ExamplePatch) -> Result<NewExample, MergeError> {
    let text = patch.text.clone().ok_or(MergeError::MissingField {
        node: "Example",
        field: "text",
    })?;
    Ok(NewExample {
        text,
        context: patch.context.clone(),
    })
}

fn new_translation_from_patch(patch: &TranslationPatch) -> Result<NewTranslation, MergeError> {
    let language = patch.language.clone().ok_or(MergeError::MissingField {
        node: "Translation",
        field: "language",
    })?;
    let text = patch.text.clone().ok_or(MergeError::MissingField {
        node: "Translation",
        field: "text",
    })?;
    Ok(NewTranslation { language, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{EntryType, NewEntry, NewMeaning};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
    }

    fn apple() -> Entry {
        NewEntry::new("apple", EntryType::Word)
            .with_meaning(
                NewMeaning::new(Uuid::new_v4(), "a fruit")
                    .with_translation(NewTranslation::new("es", "manzana"))
                    .with_example(NewExample::new("An apple a day")),
            )
            .with_meaning(NewMeaning::new(Uuid::new_v4(), "a tech company"))
            .into_entry(t0())
    }

    #[test]
    fn test_word_only_patch_leaves_meanings_untouched() {
        let current = apple();
        let later = t0() + Duration::minutes(5);

        let merge = merge_entry(&current, &EntryPatch::new(current.id).with_word("apples"), later).unwrap();

        assert_eq!(merge.entry.word, "apples");
        assert_eq!(merge.entry.updated_at, later);
        assert_eq!(merge.entry.created_at, t0());
        assert_eq!(merge.entry.meanings, current.meanings);
        assert!(merge.changes.is_empty());
    }

    #[test]
    fn test_new_meaning_is_inserted_with_fresh_id() {
        let current = apple();
        let pos = Uuid::new_v4();
        let patch = EntryPatch::new(current.id).with_meaning(
            MeaningPatch::create(pos, "to compare")
                .with_translation(TranslationPatch::create("fr", "comparer")),
        );

        let merge = merge_entry(&current, &patch, t0()).unwrap();

        assert_eq!(merge.entry.meanings.len(), 3);
        let added = &merge.entry.meanings[2];
        assert_eq!(added.entry_id, current.id);
        assert!(current.meaning(added.id).is_none());
        assert_eq!(merge.changes.meanings, vec![(added.id, NodeChange::Insert)]);
        assert_eq!(merge.changes.translations.len(), 1);
        assert_eq!(merge.meaning_writes().count(), 1);
        assert_eq!(merge.translation_writes().count(), 1);
    }

    #[test]
    fn test_existing_translation_is_overwritten_in_place() {
        let current = apple();
        let meaning = &current.meanings[0];
        let translation_id = meaning.translations[0].id;
        let later = t0() + Duration::hours(1);
        let patch = EntryPatch::new(current.id).with_meaning(
            MeaningPatch::existing(meaning.id)
                .with_translation(TranslationPatch::existing(translation_id).with_text("poma")),
        );

        let merge = merge_entry(&current, &patch, later).unwrap();

        let merged = merge.entry.meaning(meaning.id).unwrap();
        assert_eq!(merged.translations[0].text, "poma");
        assert_eq!(merged.translations[0].language, "es");
        assert_eq!(merged.translations[0].updated_at, later);
        assert_eq!(merged.translations[0].created_at, t0());
        // Untouched siblings keep their data
        assert_eq!(merged.examples, meaning.examples);
        assert_eq!(merge.entry.meanings[1], current.meanings[1]);
        assert_eq!(
            merge.changes.translations,
            vec![(translation_id, NodeChange::Update)]
        );
    }

    #[test]
    fn test_unknown_child_id_is_rejected() {
        let current = apple();
        let stranger = Uuid::new_v4();
        let patch = EntryPatch::new(current.id).with_meaning(MeaningPatch::existing(stranger));

        let err = merge_entry(&current, &patch, t0()).unwrap_err();

        assert_eq!(
            err,
            MergeError::UnknownChild {
                entity_type: "Meaning",
                id: stranger
            }
        );
    }

    #[test]
    fn test_new_node_missing_required_field_is_rejected() {
        let current = apple();
        let patch = EntryPatch::new(current.id).with_meaning(MeaningPatch {
            description: Some("no part of speech".to_string()),
            ..MeaningPatch::default()
        });

        let err = merge_entry(&current, &patch, t0()).unwrap_err();

        assert_eq!(
            err,
            MergeError::MissingField {
                node: "Meaning",
                field: "part_of_speech_id"
            }
        );
    }

    #[test]
    fn test_merge_meaning_requires_id() {
        let current = apple();
        let err = merge_meaning(&current.meanings[0], &MeaningPatch::default(), t0()).unwrap_err();
        assert_eq!(err, MergeError::MissingId { node: "Meaning" });
    }

    #[test]
    fn test_merge_meaning_adds_example() {
        let current = apple();
        let meaning = &current.meanings[0];
        let patch = MeaningPatch::existing(meaning.id)
            .with_description("a round fruit")
            .with_example(ExamplePatch::create("Apple pie").with_context("baking"));

        let merge = merge_meaning(meaning, &patch, t0()).unwrap();

        assert_eq!(merge.meaning.description, "a round fruit");
        assert_eq!(merge.meaning.examples.len(), 2);
        assert_eq!(merge.meaning.examples[1].context.as_deref(), Some("baking"));
        assert_eq!(merge.changes.examples.len(), 1);
        assert_eq!(merge.changes.meanings, vec![(meaning.id, NodeChange::Update)]);
    }
}
