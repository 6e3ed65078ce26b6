use std::sync::Arc;

use axum::{extract::State, Json};

use crate::dto::StartResponse;
use crate::error::AppError;
use crate::services;
use crate::state::{AppState, RunStatus};

pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<StartResponse>, AppError> {
    let (run_id, _handle) = services::benchmark::start(&state).await?;
    Ok(Json(StartResponse {
        status: "started",
        run_id,
    }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<RunStatus> {
    Json(state.status.lock().await.clone())
}
