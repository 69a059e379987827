mod error;
mod http_mapping;
mod retry;
mod traits;
mod types;

pub use error::{table_entity, table_parent, RepositoryError, Result};
pub use http_mapping::repository_error_to_status_code;
pub use retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};
pub use traits::{
    AnnotationRepository, DictionaryRepository, EntryRepository, ExampleRepository,
    HistoryRepository, MeaningRepository, TranslationRepository,
};
pub use types::{
    EntryQuery, Page, Pagination, SortDirection, SortField, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
