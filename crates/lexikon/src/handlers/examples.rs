//! Example sentence handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use lexikon_core::dictionary::{
    validate_example_patch, validate_new_example, Example, ExamplePatch, NewExample,
};

use crate::{handlers::AppError, state::AppState};

/// GET /api/meanings/{id}/examples
pub async fn list_examples(
    State(state): State<AppState>,
    Path(meaning_id): Path<Uuid>,
) -> Result<Json<Vec<Example>>, AppError> {
    let examples = state.examples.list_examples(meaning_id).await?;
    Ok(Json(examples))
}

/// POST /api/meanings/{id}/examples
pub async fn create_example(
    State(state): State<AppState>,
    Path(meaning_id): Path<Uuid>,
    Json(payload): Json<NewExample>,
) -> Result<(StatusCode, Json<Example>), AppError> {
    validate_new_example(&payload)?;
    let example = state.examples.create_example(meaning_id, payload).await?;

    tracing::info!(example_id = %example.id, %meaning_id, "Created new example");

    Ok((StatusCode::CREATED, Json(example)))
}

/// GET /api/examples/{id}
pub async fn get_example(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Example>, AppError> {
    let example = state.examples.get_example(id).await?;
    Ok(Json(example))
}

/// PATCH /api/examples/{id}
pub async fn update_example(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut patch): Json<ExamplePatch>,
) -> Result<Json<Example>, AppError> {
    patch.id = Some(id);
    validate_example_patch(&patch)?;
    let example = state.examples.update_example(patch).await?;

    tracing::info!(example_id = %id, "Updated example");

    Ok(Json(example))
}

/// DELETE /api/examples/{id}
pub async fn delete_example(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Example>, AppError> {
    let removed = state.examples.delete_example(id).await?;

    tracing::info!(example_id = %id, "Deleted example");

    Ok(Json(removed))
}
