//! Translation handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use lexikon_core::dictionary::{
    validate_language, validate_new_translation, validate_translation_patch, NewTranslation,
    Translation, TranslationPatch,
};

use crate::{handlers::AppError, state::AppState};

/// Query parameters for listing translations.
#[derive(Debug, Deserialize)]
pub struct ListTranslationsQuery {
    /// Only translations into this language (case-insensitive).
    pub language: Option<String>,
}

/// GET /api/meanings/{id}/translations
pub async fn list_translations(
    State(state): State<AppState>,
    Path(meaning_id): Path<Uuid>,
    Query(query): Query<ListTranslationsQuery>,
) -> Result<Json<Vec<Translation>>, AppError> {
    if let Some(language) = &query.language {
        validate_language(language)?;
    }

    let translations = state
        .translations
        .list_translations(meaning_id, query.language.as_deref())
        .await?;
    Ok(Json(translations))
}

/// POST /api/meanings/{id}/translations
pub async fn create_translation(
    State(state): State<AppState>,
    Path(meaning_id): Path<Uuid>,
    Json(payload): Json<NewTranslation>,
) -> Result<(StatusCode, Json<Translation>), AppError> {
    validate_new_translation(&payload)?;
    let translation = state
        .translations
        .create_translation(meaning_id, payload)
        .await?;

    tracing::info!(
        translation_id = %translation.id,
        %meaning_id,
        language = %translation.language,
        "Created new translation"
    );

    Ok((StatusCode::CREATED, Json(translation)))
}

/// GET /api/translations/{id}
pub async fn get_translation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Translation>, AppError> {
    let translation = state.translations.get_translation(id).await?;
    Ok(Json(translation))
}

/// PATCH /api/translations/{id}
pub async fn update_translation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut patch): Json<TranslationPatch>,
) -> Result<Json<Translation>, AppError> {
    patch.id = Some(id);
    validate_translation_patch(&patch)?;
    let translation = state.translations.update_translation(patch).await?;

    tracing::info!(translation_id = %id, "Updated translation");

    Ok(Json(translation))
}

/// DELETE /api/translations/{id}
pub async fn delete_translation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Translation>, AppError> {
    let removed = state.translations.delete_translation(id).await?;

    tracing::info!(translation_id = %id, "Deleted translation");

    Ok(Json(removed))
}
