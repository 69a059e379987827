//! Entry CRUD handlers.
//!
//! These handlers use repository trait objects for database access. Cache
//! invalidation is handled by the cached repository decorators; the
//! handlers validate input and record the change history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use lexikon_core::dictionary::{
    validate_entry_patch, validate_new_entry, ChangeAction, ChangeHistory, Entry, EntryPatch,
    NewEntry,
};
use lexikon_core::storage::{EntryQuery, HistoryRepository, Page};

use crate::{context::RequestContext, handlers::AppError, state::AppState};

/// Appends an audit row for an entry mutation that already succeeded.
///
/// History is best-effort. The row is written in its own transaction after
/// the mutation has committed, so a crash between the two can leave a
/// committed mutation without its audit row. A failure here is logged
/// rather than turned into an error response.
async fn record_change(
    state: &AppState,
    ctx: &RequestContext,
    entry: &Entry,
    action: ChangeAction,
) {
    let payload = match serde_json::to_value(entry) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!(entry_id = %entry.id, error = %err, "Failed to encode history payload");
            return;
        }
    };

    let change = ChangeHistory::new(entry.id, action, payload, ctx.user_id);
    if let Err(err) = state.repository.record_change(&change).await {
        tracing::error!(
            entry_id = %entry.id,
            action = action.as_str(),
            request_id = %ctx.request_id,
            error = %err,
            "Failed to record change history"
        );
    }
}

/// List entries (GET /api/entries).
///
/// Query parameters: `word` (case-insensitive substring), `type`
/// (`WORD`, `COMPOUND_WORD`, `PHRASE`), `sort` (`updated_at`, `created_at`,
/// `word`), `order` (`asc`, `desc`), `offset`, `limit`.
pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<Page<Entry>>, AppError> {
    let page = state.entries.list_entries(&query).await?;
    Ok(Json(page))
}

/// Create an entry with its subtree (POST /api/entries).
pub async fn create_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<NewEntry>,
) -> Result<(StatusCode, Json<Entry>), AppError> {
    tracing::debug!(word = %payload.word, request_id = %ctx.request_id, "Received create entry request");

    validate_new_entry(&payload)?;
    let entry = state.entries.create_entry_graph(payload).await?;
    record_change(&state, &ctx, &entry, ChangeAction::Create).await;

    tracing::info!(entry_id = %entry.id, word = %entry.word, "Created new entry");

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Get an entry with its whole subtree (GET /api/entries/{id}).
pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Entry>, AppError> {
    let entry = state.entries.get_entry_graph(id).await?;
    Ok(Json(entry))
}

/// Apply a sparse update to an entry (PATCH /api/entries/{id}).
///
/// The path id wins over any id in the body.
pub async fn update_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(mut patch): Json<EntryPatch>,
) -> Result<Json<Entry>, AppError> {
    tracing::debug!(entry_id = %id, request_id = %ctx.request_id, "Received update entry request");

    patch.id = id;
    validate_entry_patch(&patch)?;
    let entry = state.entries.update_entry_graph(patch).await?;
    record_change(&state, &ctx, &entry, ChangeAction::Update).await;

    tracing::info!(entry_id = %id, "Updated entry");

    Ok(Json(entry))
}

/// Delete an entry and its subtree (DELETE /api/entries/{id}).
///
/// Comments and likes of the entry are purged once the subtree is gone.
pub async fn delete_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Entry>, AppError> {
    tracing::debug!(entry_id = %id, request_id = %ctx.request_id, "Received delete entry request");

    let removed = state.entries.delete_entry_graph(id).await?;
    if let Err(err) = state.annotations.purge_entry(id).await {
        tracing::error!(
            entry_id = %id,
            request_id = %ctx.request_id,
            error = %err,
            "Failed to purge entry annotations"
        );
    }
    record_change(&state, &ctx, &removed, ChangeAction::Delete).await;

    tracing::info!(entry_id = %id, "Deleted entry");

    Ok(Json(removed))
}
