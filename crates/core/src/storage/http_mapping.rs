//! Pure functions for mapping repository errors to HTTP status codes.
//!
//! This module provides HTTP status code mappings for [`RepositoryError`] variants,
//! following the Functional Core pattern - pure functions with no side effects.

use super::RepositoryError;

/// Maps a [`RepositoryError`] to an HTTP status code.
///
/// - `NotFound` -> 404 (Not Found)
/// - `DuplicateKey` -> 409 (Conflict)
/// - `InvalidState` -> 422 (Unprocessable Entity)
/// - `TransientConflict` -> 503 (Service Unavailable)
/// - `StorageFailure` -> 500 (Internal Server Error)
///
/// # Examples
///
/// ```
/// use lexikon_core::storage::{RepositoryError, repository_error_to_status_code};
///
/// let error = RepositoryError::NotFound {
///     entity_type: "Entry",
///     id: "abc-123".to_string(),
/// };
/// assert_eq!(repository_error_to_status_code(&error), 404);
/// ```
pub fn repository_error_to_status_code(error: &RepositoryError) -> u16 {
    match error {
        RepositoryError::NotFound { .. } => 404,
        RepositoryError::DuplicateKey { .. } => 409,
        RepositoryError::InvalidState(_) => 422,
        RepositoryError::TransientConflict(_) => 503,
        RepositoryError::StorageFailure { .. } => 500,
    }
}
