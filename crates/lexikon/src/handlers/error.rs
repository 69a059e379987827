use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lexikon_core::dictionary::ValidationError;
use lexikon_core::storage::{repository_error_to_status_code, RepositoryError};

use crate::context::RequestError;

/// Application error type that wraps `anyhow::Error`.
///
/// Known error types are downcast to pick the response status; anything
/// else is a 500.
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        if let Some(repo_error) = self.0.downcast_ref::<RepositoryError>() {
            let code = repository_error_to_status_code(repo_error);
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        } else if self.0.downcast_ref::<ValidationError>().is_some() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else if self.0.downcast_ref::<RequestError>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            tracing::error!(status = %status_code, error = %self.0, "Request failed");
        } else {
            tracing::warn!(status = %status_code, error = %self.0, "Request rejected");
        }

        (status_code, self.0.to_string()).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let not_found = AppError::from(RepositoryError::not_found("Entry", "e-1"));
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let invalid = AppError::from(ValidationError::EmptyWord);
        assert_eq!(invalid.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let anonymous = AppError::from(RequestError::MissingUser);
        assert_eq!(anonymous.status_code(), StatusCode::BAD_REQUEST);

        let other = AppError::from(anyhow::anyhow!("boom"));
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
