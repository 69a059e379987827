//! Cache key design.
//!
//! Keys are colon-delimited and always start with the environment
//! namespace: `{env}:{kind}:{id}[:{collection}[:{param}]]`. Identical
//! logical requests always produce identical keys.

use uuid::Uuid;

use crate::storage::{EntryQuery, Pagination};

/// Deterministic mapping from entity identity and query to cache keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    env: String,
}

impl KeySpace {
    pub fn new(env: impl Into<String>) -> Self {
        Self { env: env.into() }
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// Point key of a full entry graph.
    pub fn entry(&self, id: Uuid) -> String {
        format!("{}:entry:{}", self.env, id)
    }

    pub fn entry_meanings(&self, id: Uuid) -> String {
        format!("{}:entry:{}:meanings", self.env, id)
    }

    pub fn entry_comments(&self, id: Uuid, page: Pagination) -> String {
        format!(
            "{}:entry:{}:comments:{}:{}",
            self.env,
            id,
            page.offset(),
            page.limit()
        )
    }

    /// Matches every cached comment page of an entry.
    pub fn entry_comments_pattern(&self, id: Uuid) -> String {
        format!("{}:entry:{}:comments:*", self.env, id)
    }

    pub fn entry_likes(&self, id: Uuid) -> String {
        format!("{}:entry:{}:likes", self.env, id)
    }

    /// Matches every entry-scoped key. Used when an ancestor is unknown.
    pub fn all_entries_pattern(&self) -> String {
        format!("{}:entry:*", self.env)
    }

    /// Point key of a meaning, children embedded.
    pub fn meaning(&self, id: Uuid) -> String {
        format!("{}:meaning:{}", self.env, id)
    }

    pub fn meaning_examples(&self, id: Uuid) -> String {
        format!("{}:meaning:{}:examples", self.env, id)
    }

    /// Translation list of a meaning; `None` lists every language.
    pub fn meaning_translations(&self, id: Uuid, language: Option<&str>) -> String {
        format!(
            "{}:meaning:{}:translations:{}",
            self.env,
            id,
            language.map(str::to_lowercase).as_deref().unwrap_or("all")
        )
    }

    /// Matches the translation lists of a meaning for every language.
    pub fn meaning_translations_pattern(&self, id: Uuid) -> String {
        format!("{}:meaning:{}:translations:*", self.env, id)
    }

    pub fn example(&self, id: Uuid) -> String {
        format!("{}:example:{}", self.env, id)
    }

    pub fn translation(&self, id: Uuid) -> String {
        format!("{}:translation:{}", self.env, id)
    }

    /// Key of one page of an entry listing.
    pub fn entries_list(&self, query: &EntryQuery) -> String {
        format!("{}:entries:list:{}", self.env, canonical_query(query))
    }

    /// Matches every cached entry listing.
    pub fn entries_list_pattern(&self) -> String {
        format!("{}:entries:list:*", self.env)
    }
}

/// Renders a query as sorted, percent-encoded `k=v` pairs joined by `&`.
///
/// Defaults are always materialized and the word filter is normalized, so
/// omitting a parameter and passing its default yield the same string.
pub fn canonical_query(query: &EntryQuery) -> String {
    let pagination = query.pagination();
    let mut pairs: Vec<(&str, String)> = vec![
        ("limit", pagination.limit().to_string()),
        ("offset", pagination.offset().to_string()),
        ("order", query.effective_order().as_str().to_string()),
        ("sort", query.effective_sort().as_str().to_string()),
    ];
    if let Some(entry_type) = query.entry_type {
        pairs.push(("type", entry_type.as_str().to_string()));
    }
    if let Some(word) = query.word_filter() {
        pairs.push(("word", word));
    }
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
