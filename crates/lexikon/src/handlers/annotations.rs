//! Comment and like handlers.
//!
//! Writes need an acting user (`x-user-id` header). Every route that names
//! an entry checks that it exists first, through the cached entry repository.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lexikon_core::dictionary::{validate_comment, Comment};
use lexikon_core::storage::{Page, Pagination};

use crate::{context::RequestContext, handlers::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateComment {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct LikeSummary {
    pub entry_id: Uuid,
    /// Whether this request changed the like state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
    pub count: u64,
}

async fn ensure_entry(state: &AppState, entry_id: Uuid) -> Result<(), AppError> {
    state.entries.get_entry_graph(entry_id).await?;
    Ok(())
}

/// GET /api/entries/{id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> Result<Json<Page<Comment>>, AppError> {
    ensure_entry(&state, entry_id).await?;
    let comments = state.annotations.list_comments(entry_id, page).await?;
    Ok(Json(comments))
}

/// POST /api/entries/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let user_id = ctx.require_user()?;
    validate_comment(&payload.body)?;
    ensure_entry(&state, entry_id).await?;

    let comment = state
        .annotations
        .add_comment(entry_id, user_id, payload.body)
        .await?;

    tracing::info!(comment_id = %comment.id, %entry_id, %user_id, "Created new comment");

    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Comment>, AppError> {
    let removed = state.annotations.delete_comment(id).await?;

    tracing::info!(comment_id = %id, entry_id = %removed.entry_id, "Deleted comment");

    Ok(Json(removed))
}

/// GET /api/entries/{id}/likes
pub async fn count_likes(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<LikeSummary>, AppError> {
    ensure_entry(&state, entry_id).await?;
    let count = state.annotations.count_likes(entry_id).await?;
    Ok(Json(LikeSummary {
        entry_id,
        changed: None,
        count,
    }))
}

/// POST /api/entries/{id}/likes
///
/// Liking twice is not an error; the second call reports `changed: false`.
pub async fn like_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<LikeSummary>, AppError> {
    let user_id = ctx.require_user()?;
    ensure_entry(&state, entry_id).await?;

    let added = state.annotations.like(entry_id, user_id).await?;
    let count = state.annotations.count_likes(entry_id).await?;

    Ok(Json(LikeSummary {
        entry_id,
        changed: Some(added),
        count,
    }))
}

/// DELETE /api/entries/{id}/likes
pub async fn unlike_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<LikeSummary>, AppError> {
    let user_id = ctx.require_user()?;
    ensure_entry(&state, entry_id).await?;

    let removed = state.annotations.unlike(entry_id, user_id).await?;
    let count = state.annotations.count_likes(entry_id).await?;

    Ok(Json(LikeSummary {
        entry_id,
        changed: Some(removed),
        count,
    }))
}
