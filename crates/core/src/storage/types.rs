use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::dictionary::{Entry, EntryType};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Field an entry listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    UpdatedAt,
    CreatedAt,
    Word,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::UpdatedAt => "updated_at",
            SortField::CreatedAt => "created_at",
            SortField::Word => "word",
        }
    }

    /// SQL expression used in `ORDER BY` for this field.
    pub fn order_expr(&self) -> &'static str {
        match self {
            SortField::UpdatedAt => "updated_at",
            SortField::CreatedAt => "created_at",
            SortField::Word => "lower(word)",
        }
    }

    /// Direction used when a query names the field but no direction.
    pub fn default_direction(&self) -> SortDirection {
        match self {
            SortField::Word => SortDirection::Asc,
            SortField::UpdatedAt | SortField::CreatedAt => SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Offset/limit window over a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl Pagination {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset: Some(offset),
            limit: Some(limit),
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Limit clamped to `1..=MAX_PAGE_LIMIT`, `DEFAULT_PAGE_LIMIT` when unset.
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Slices an already ordered collection into a page.
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit() as usize)
            .collect();
        Page {
            items,
            total,
            offset: self.offset(),
            limit: self.limit(),
        }
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u32,
    pub limit: u32,
}

/// Filter, sort and pagination parameters for listing entries.
///
/// Every field is optional; the `effective_*` accessors materialize the
/// defaults so that an omitted parameter and its explicit default behave
/// the same everywhere, cache keys included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryQuery {
    #[serde(default)]
    pub word: Option<String>,
    #[serde(default, rename = "type")]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub sort: Option<SortField>,
    #[serde(default)]
    pub order: Option<SortDirection>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl EntryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_word(mut self, word: impl Into<String>) -> Self {
        self.word = Some(word.into());
        self
    }

    pub fn with_entry_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn with_sort(mut self, sort: SortField, order: SortDirection) -> Self {
        self.sort = Some(sort);
        self.order = Some(order);
        self
    }

    pub fn with_page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Lowercased, trimmed word filter; `None` when absent or blank.
    pub fn word_filter(&self) -> Option<String> {
        self.word
            .as_deref()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
    }

    pub fn effective_sort(&self) -> SortField {
        self.sort.unwrap_or_default()
    }

    pub fn effective_order(&self) -> SortDirection {
        self.order
            .unwrap_or_else(|| self.effective_sort().default_direction())
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            offset: self.offset,
            limit: self.limit,
        }
    }

    /// Returns true if `entry` passes the word and type filters.
    pub fn matches(&self, entry: &Entry) -> bool {
        let word_ok = self
            .word_filter()
            .is_none_or(|w| entry.word.to_lowercase().contains(&w));
        let type_ok = self.entry_type.is_none_or(|t| entry.entry_type == t);
        word_ok && type_ok
    }

    /// Total order used by every backend: the sort field, then id.
    pub fn compare(&self, a: &Entry, b: &Entry) -> Ordering {
        let by_field = match self.effective_sort() {
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Word => a.word.to_lowercase().cmp(&b.word.to_lowercase()),
        };
        let ordering = by_field.then_with(|| a.id.cmp(&b.id));
        match self.effective_order() {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Filters, sorts and paginates an in-memory collection.
    pub fn apply(&self, entries: impl IntoIterator<Item = Entry>) -> Page<Entry> {
        let mut matching: Vec<Entry> = entries.into_iter().filter(|e| self.matches(e)).collect();
        matching.sort_by(|a, b| self.compare(a, b));
        self.pagination().paginate(matching)
    }
}
