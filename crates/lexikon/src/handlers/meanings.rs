//! Meaning handlers, nested under their entry.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use lexikon_core::dictionary::{
    validate_meaning_patch, validate_new_meaning, Meaning, MeaningPatch, NewMeaning,
};

use crate::{handlers::AppError, state::AppState};

/// GET /api/entries/{id}/meanings
pub async fn list_meanings(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Vec<Meaning>>, AppError> {
    let meanings = state.meanings.list_meanings(entry_id).await?;
    Ok(Json(meanings))
}

/// POST /api/entries/{id}/meanings
pub async fn create_meaning(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<NewMeaning>,
) -> Result<(StatusCode, Json<Meaning>), AppError> {
    validate_new_meaning(&payload)?;
    let meaning = state.meanings.create_meaning(entry_id, payload).await?;

    tracing::info!(meaning_id = %meaning.id, %entry_id, "Created new meaning");

    Ok((StatusCode::CREATED, Json(meaning)))
}

/// GET /api/meanings/{id}
pub async fn get_meaning(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meaning>, AppError> {
    let meaning = state.meanings.get_meaning(id).await?;
    Ok(Json(meaning))
}

/// PATCH /api/meanings/{id}
pub async fn update_meaning(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut patch): Json<MeaningPatch>,
) -> Result<Json<Meaning>, AppError> {
    patch.id = Some(id);
    validate_meaning_patch(&patch)?;
    let meaning = state.meanings.update_meaning(patch).await?;

    tracing::info!(meaning_id = %id, "Updated meaning");

    Ok(Json(meaning))
}

/// DELETE /api/meanings/{id}
pub async fn delete_meaning(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meaning>, AppError> {
    let removed = state.meanings.delete_meaning(id).await?;

    tracing::info!(meaning_id = %id, entry_id = %removed.entry_id, "Deleted meaning");

    Ok(Json(removed))
}
