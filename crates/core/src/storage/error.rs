use thiserror::Error;

use crate::dictionary::MergeError;

/// Errors that can occur during repository operations.
///
/// Backends classify their native errors into these variants before
/// returning, so callers never see driver-specific error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {key}")]
    DuplicateKey {
        entity_type: &'static str,
        key: String,
    },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// Retryable contention on a single-writer store.
    #[error("Transient conflict: {0}")]
    TransientConflict(String),
    #[error("Storage failure during {operation} on {table}: {message}")]
    StorageFailure {
        operation: &'static str,
        table: &'static str,
        message: String,
    },
}

impl RepositoryError {
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn storage(operation: &'static str, table: &'static str, message: impl Into<String>) -> Self {
        Self::StorageFailure {
            operation,
            table,
            message: message.into(),
        }
    }

    /// Returns true for errors a caller may retry as a whole unit of work.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientConflict(_))
    }
}

impl From<MergeError> for RepositoryError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::UnknownChild { entity_type, id } => Self::not_found(entity_type, id),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

/// Entity stored in a table of the SQL schemas.
pub fn table_entity(table: &str) -> &'static str {
    match table {
        "entries" => "Entry",
        "meanings" => "Meaning",
        "examples" => "Example",
        "translations" => "Translation",
        "change_history" => "ChangeHistory",
        _ => "Record",
    }
}

/// Entity a table's ownership foreign key points at.
pub fn table_parent(table: &str) -> &'static str {
    match table {
        "meanings" => "Entry",
        "examples" | "translations" => "Meaning",
        _ => "Record",
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
