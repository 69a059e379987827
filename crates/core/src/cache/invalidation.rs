//! Which cache keys a committed mutation must evict.
//!
//! A mutation of node N evicts N's point key, the point keys of every
//! ancestor that embeds N, the child collections of N and of its parent,
//! and every entry listing. Descendant point keys are evicted too, so the
//! same plan serves writes and cascading deletes. When the owning entry of
//! a leaf cannot be resolved, every entry-scoped key is evicted instead.
//! Over-eviction is acceptable; a missed key is not.

use uuid::Uuid;

use crate::dictionary::{Entry, Example, Meaning, Translation};

use super::keys::KeySpace;
use super::patterns::pattern_matches;

/// A committed change, described by the nodes it touched.
#[derive(Debug, Clone, Copy)]
pub enum Mutation<'a> {
    /// An entry graph was created, updated or deleted.
    Entry(&'a Entry),
    /// A meaning (and possibly its children) was created, updated or deleted.
    Meaning(&'a Meaning),
    /// `entry_id` is the owning entry, when it could be resolved.
    Example {
        example: &'a Example,
        entry_id: Option<Uuid>,
    },
    Translation {
        translation: &'a Translation,
        entry_id: Option<Uuid>,
    },
    /// A comment or like of an entry changed.
    Annotation { entry_id: Uuid },
}

/// Exact keys and glob patterns to evict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationSet {
    pub keys: Vec<String>,
    pub patterns: Vec<String>,
}

impl InvalidationSet {
    /// Computes the eviction set for a mutation.
    pub fn plan(keys: &KeySpace, mutation: Mutation<'_>) -> Self {
        let mut set = Self::default();
        match mutation {
            Mutation::Entry(entry) => {
                set.key(keys.entry(entry.id));
                set.key(keys.entry_meanings(entry.id));
                for meaning in &entry.meanings {
                    set.meaning_subtree(keys, meaning);
                }
                set.pattern(keys.entries_list_pattern());
            }
            Mutation::Meaning(meaning) => {
                set.meaning_subtree(keys, meaning);
                set.key(keys.entry(meaning.entry_id));
                set.key(keys.entry_meanings(meaning.entry_id));
                set.pattern(keys.entries_list_pattern());
            }
            Mutation::Example { example, entry_id } => {
                set.key(keys.example(example.id));
                set.key(keys.meaning(example.meaning_id));
                set.key(keys.meaning_examples(example.meaning_id));
                set.owning_entry(keys, entry_id);
                set.pattern(keys.entries_list_pattern());
            }
            Mutation::Translation {
                translation,
                entry_id,
            } => {
                set.key(keys.translation(translation.id));
                set.key(keys.meaning(translation.meaning_id));
                set.pattern(keys.meaning_translations_pattern(translation.meaning_id));
                set.owning_entry(keys, entry_id);
                set.pattern(keys.entries_list_pattern());
            }
            Mutation::Annotation { entry_id } => {
                set.key(keys.entry_likes(entry_id));
                set.pattern(keys.entry_comments_pattern(entry_id));
            }
        }
        set
    }

    /// Returns true if evicting this set removes `key`.
    pub fn covers(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key) || self.patterns.iter().any(|p| pattern_matches(p, key))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.patterns.is_empty()
    }

    fn meaning_subtree(&mut self, keys: &KeySpace, meaning: &Meaning) {
        self.key(keys.meaning(meaning.id));
        self.key(keys.meaning_examples(meaning.id));
        self.pattern(keys.meaning_translations_pattern(meaning.id));
        for example in &meaning.examples {
            self.key(keys.example(example.id));
        }
        for translation in &meaning.translations {
            self.key(keys.translation(translation.id));
        }
    }

    fn owning_entry(&mut self, keys: &KeySpace, entry_id: Option<Uuid>) {
        match entry_id {
            Some(id) => {
                self.key(keys.entry(id));
                self.key(keys.entry_meanings(id));
            }
            None => self.pattern(keys.all_entries_pattern()),
        }
    }

    fn key(&mut self, key: String) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    fn pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{EntryType, NewEntry, NewExample, NewMeaning, NewTranslation};
    use crate::storage::{EntryQuery, Pagination};
    use chrono::Utc;

    fn keys() -> KeySpace {
        KeySpace::new("test")
    }

    fn graph() -> Entry {
        NewEntry::new("apple", EntryType::Word)
            .with_meaning(
                NewMeaning::new(Uuid::new_v4(), "a fruit")
                    .with_example(NewExample::new("An apple a day"))
                    .with_translation(NewTranslation::new("es", "manzana")),
            )
            .into_entry(Utc::now())
    }

    #[test]
    fn test_entry_mutation_covers_whole_graph_and_lists() {
        let entry = graph();
        let meaning = &entry.meanings[0];
        let set = InvalidationSet::plan(&keys(), Mutation::Entry(&entry));

        assert!(set.covers(&keys().entry(entry.id)));
        assert!(set.covers(&keys().entry_meanings(entry.id)));
        assert!(set.covers(&keys().meaning(meaning.id)));
        assert!(set.covers(&keys().meaning_examples(meaning.id)));
        assert!(set.covers(&keys().meaning_translations(meaning.id, Some("es"))));
        assert!(set.covers(&keys().meaning_translations(meaning.id, None)));
        assert!(set.covers(&keys().example(meaning.examples[0].id)));
        assert!(set.covers(&keys().translation(meaning.translations[0].id)));
        assert!(set.covers(&keys().entries_list(&EntryQuery::new().with_word("zzz"))));
    }

    #[test]
    fn test_entry_mutation_leaves_annotations_alone() {
        let entry = graph();
        let set = InvalidationSet::plan(&keys(), Mutation::Entry(&entry));

        assert!(!set.covers(&keys().entry_likes(entry.id)));
        assert!(!set.covers(&keys().entry_comments(entry.id, Pagination::default())));
    }

    #[test]
    fn test_meaning_mutation_covers_ancestor() {
        let entry = graph();
        let meaning = &entry.meanings[0];
        let set = InvalidationSet::plan(&keys(), Mutation::Meaning(meaning));

        assert!(set.covers(&keys().meaning(meaning.id)));
        assert!(set.covers(&keys().entry(entry.id)));
        assert!(set.covers(&keys().entry_meanings(entry.id)));
        assert!(set.covers(&keys().example(meaning.examples[0].id)));
        assert!(set.covers(&keys().entries_list(&EntryQuery::new())));
    }

    #[test]
    fn test_translation_mutation_covers_every_language_list() {
        let entry = graph();
        let meaning = &entry.meanings[0];
        let translation = &meaning.translations[0];
        let set = InvalidationSet::plan(
            &keys(),
            Mutation::Translation {
                translation,
                entry_id: Some(entry.id),
            },
        );

        assert!(set.covers(&keys().translation(translation.id)));
        assert!(set.covers(&keys().meaning(meaning.id)));
        assert!(set.covers(&keys().meaning_translations(meaning.id, Some("fr"))));
        assert!(set.covers(&keys().meaning_translations(meaning.id, None)));
        assert!(set.covers(&keys().entry(entry.id)));
        // Siblings are not evicted
        assert!(!set.covers(&keys().example(meaning.examples[0].id)));
    }

    #[test]
    fn test_unknown_owner_falls_back_to_entry_pattern() {
        let entry = graph();
        let example = &entry.meanings[0].examples[0];
        let set = InvalidationSet::plan(
            &keys(),
            Mutation::Example {
                example,
                entry_id: None,
            },
        );

        assert!(set.patterns.contains(&keys().all_entries_pattern()));
        assert!(set.covers(&keys().entry(entry.id)));
        assert!(set.covers(&keys().meaning_examples(example.meaning_id)));
    }

    #[test]
    fn test_annotation_mutation_only_touches_social_keys() {
        let entry_id = Uuid::new_v4();
        let set = InvalidationSet::plan(&keys(), Mutation::Annotation { entry_id });

        assert!(set.covers(&keys().entry_likes(entry_id)));
        assert!(set.covers(&keys().entry_comments(entry_id, Pagination::new(20, 20))));
        assert!(!set.covers(&keys().entry(entry_id)));
        assert!(!set.covers(&keys().entries_list(&EntryQuery::new())));
    }

    #[test]
    fn test_keys_are_deduplicated() {
        let entry = graph();
        let set = InvalidationSet::plan(&keys(), Mutation::Entry(&entry));
        let mut sorted = set.keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), set.keys.len());
    }
}
