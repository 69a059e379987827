use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use lexikon_core::dictionary::ChangeHistory;
use lexikon_core::storage::HistoryRepository;

use crate::{handlers::AppError, state::AppState};

/// Change history of an entry, oldest first (GET /api/entries/{id}/history).
///
/// Deleted entries keep their history, so an unknown id yields an empty list.
pub async fn list_history(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Vec<ChangeHistory>>, AppError> {
    let changes = state.repository.list_changes(entry_id).await?;
    Ok(Json(changes))
}
