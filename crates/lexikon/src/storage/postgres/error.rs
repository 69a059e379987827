//! PostgreSQL error mapping.
//!
//! Classifies `sqlx::Error` by the database error kind so callers only
//! ever see `RepositoryError`.

use sqlx::error::ErrorKind;

use lexikon_core::storage::{table_entity, table_parent, RepositoryError};

/// Classifies a sqlx error raised by `operation` on `table`.
///
/// # Error Mapping
///
/// - unique violation → `RepositoryError::DuplicateKey`
/// - foreign key violation → `RepositoryError::NotFound` (the parent)
/// - check violation → `RepositoryError::InvalidState`
/// - closed pool → `RepositoryError::InvalidState`
/// - All other errors → `RepositoryError::StorageFailure`
pub fn map_sqlx_error(
    err: sqlx::Error,
    operation: &'static str,
    table: &'static str,
) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.kind() {
            ErrorKind::UniqueViolation => RepositoryError::DuplicateKey {
                entity_type: table_entity(table),
                key: db_err.constraint().unwrap_or("unique").to_string(),
            },
            ErrorKind::ForeignKeyViolation => RepositoryError::NotFound {
                entity_type: table_parent(table),
                id: "unknown".to_string(),
            },
            ErrorKind::CheckViolation => RepositoryError::InvalidState(db_err.message().to_string()),
            _ => RepositoryError::storage(operation, table, err.to_string()),
        },
        sqlx::Error::PoolClosed => RepositoryError::InvalidState("repository is closed".to_string()),
        _ => RepositoryError::storage(operation, table, err.to_string()),
    }
}

/// Attaches operation and table context to sqlx results.
pub trait SqlContext<T> {
    fn context(self, operation: &'static str, table: &'static str) -> Result<T, RepositoryError>;
}

impl<T> SqlContext<T> for Result<T, sqlx::Error> {
    fn context(self, operation: &'static str, table: &'static str) -> Result<T, RepositoryError> {
        self.map_err(|e| map_sqlx_error(e, operation, table))
    }
}
