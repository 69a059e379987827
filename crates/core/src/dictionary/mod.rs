mod error;
mod merge;
mod operations;
mod requests;
mod types;

pub use error::ValidationError;
pub use merge::{
    apply_example_patch, apply_translation_patch, merge_entry, merge_meaning,
    new_meaning_from_patch, ChangeSet, EntryMerge, MeaningMerge, MergeError, NodeChange,
};
pub use operations::{
    sort_children, timestamp_now, validate_comment, validate_entry_patch, validate_example_patch,
    validate_language, validate_meaning_patch, validate_new_entry, validate_new_example,
    validate_new_meaning, validate_new_translation, validate_translation_patch,
};
pub use requests::{
    EntryPatch, ExamplePatch, MeaningPatch, NewEntry, NewExample, NewMeaning, NewTranslation,
    TranslationPatch,
};
pub use types::{
    ChangeAction, ChangeHistory, Comment, Entry, EntryType, Example, Like, Meaning, Translation,
};
