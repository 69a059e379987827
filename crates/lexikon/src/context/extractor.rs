//! Axum extractor for RequestContext.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use super::types::{RequestContext, RequestId};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn header_uuid(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

fn extract_request_id(headers: &HeaderMap) -> RequestId {
    header_uuid(headers, REQUEST_ID_HEADER)
        .map(RequestId::from_uuid)
        .unwrap_or_else(RequestId::new)
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = extract_request_id(&parts.headers);
        let user_id = header_uuid(&parts.headers, USER_ID_HEADER);

        if user_id.is_none() && parts.headers.contains_key(USER_ID_HEADER) {
            tracing::warn!(%request_id, "Ignoring malformed x-user-id header");
        }

        Ok(RequestContext {
            user_id,
            request_id,
        })
    }
}
