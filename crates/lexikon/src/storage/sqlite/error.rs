//! SQLite error mapping.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` to `RepositoryError`.
//! Lock contention becomes `TransientConflict` so the write loop can retry
//! it; constraint failures become their semantic variants.

use rusqlite::{ffi, ErrorCode};

use lexikon_core::storage::{table_entity, table_parent, RepositoryError};

/// Classifies a rusqlite error raised by `operation` on `table`.
///
/// # Error Mapping
///
/// - `SQLITE_BUSY` / `SQLITE_LOCKED` → `RepositoryError::TransientConflict`
/// - `SQLITE_CONSTRAINT_UNIQUE` / `PRIMARYKEY` → `RepositoryError::DuplicateKey`
/// - `SQLITE_CONSTRAINT_FOREIGNKEY` → `RepositoryError::NotFound` (the parent)
/// - `SQLITE_CONSTRAINT_CHECK` → `RepositoryError::InvalidState`
/// - All other errors → `RepositoryError::StorageFailure`
pub fn map_rusqlite_error(
    err: &rusqlite::Error,
    operation: &'static str,
    table: &'static str,
) -> RepositoryError {
    if let rusqlite::Error::SqliteFailure(failure, message) = err {
        let detail = message.clone().unwrap_or_else(|| err.to_string());
        match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return RepositoryError::TransientConflict(detail);
            }
            ErrorCode::ConstraintViolation => match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return RepositoryError::DuplicateKey {
                        entity_type: table_entity(table),
                        key: detail,
                    };
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return RepositoryError::NotFound {
                        entity_type: table_parent(table),
                        id: "unknown".to_string(),
                    };
                }
                ffi::SQLITE_CONSTRAINT_CHECK => {
                    return RepositoryError::InvalidState(detail);
                }
                _ => {}
            },
            _ => {}
        }
    }
    RepositoryError::storage(operation, table, err.to_string())
}

/// Maps the outer error of a `Connection::call`.
pub fn map_call_error(err: tokio_rusqlite::Error) -> RepositoryError {
    match err {
        tokio_rusqlite::Error::Rusqlite(e) => map_rusqlite_error(&e, "call", "connection"),
        tokio_rusqlite::Error::ConnectionClosed => {
            RepositoryError::InvalidState("repository is closed".to_string())
        }
        other => RepositoryError::storage("call", "connection", other.to_string()),
    }
}

/// Attaches operation and table context to rusqlite results.
pub trait SqlContext<T> {
    fn context(self, operation: &'static str, table: &'static str) -> Result<T, RepositoryError>;
}

impl<T> SqlContext<T> for rusqlite::Result<T> {
    fn context(self, operation: &'static str, table: &'static str) -> Result<T, RepositoryError> {
        self.map_err(|e| map_rusqlite_error(&e, operation, table))
    }
}
