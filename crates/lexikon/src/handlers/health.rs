use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub backend: &'static str,
}

/// Liveness check (GET /api/livez).
pub async fn livez(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    (
        StatusCode::OK,
        Json(Health {
            status: "ok",
            backend: state.repository.backend_name(),
        }),
    )
}
