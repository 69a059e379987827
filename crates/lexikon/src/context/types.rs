//! Pure types for request-scoped context.

use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a request, used for tracing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request problems detected before any repository call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("The x-user-id header is required for this operation")]
    MissingUser,
}

/// Request-scoped context available to all handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Acting user from the `x-user-id` header (None if anonymous).
    pub user_id: Option<Uuid>,
    /// Unique request identifier for tracing.
    pub request_id: RequestId,
}

impl RequestContext {
    /// Acting user, for operations that cannot be anonymous.
    pub fn require_user(&self) -> Result<Uuid, RequestError> {
        self.user_id.ok_or(RequestError::MissingUser)
    }
}
