pub mod benchmark;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Html;
use axum::Json;

use crate::dashboard::{self, ChartData, DashboardResults};
use crate::error::AppError;
use crate::state::AppState;
use crate::views;

fn results(state: &AppState) -> DashboardResults {
    dashboard::collect(&state.config.models, &state.config.paths)
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let results = results(&state);
    let status = state.status.lock().await.clone();
    Html(views::index_page(&results, &status))
}

pub async fn chart_data(State(state): State<Arc<AppState>>) -> Json<ChartData> {
    Json(dashboard::chart_data(&results(&state)))
}

pub async fn api_results(State(state): State<Arc<AppState>>) -> Json<DashboardResults> {
    Json(results(&state))
}

pub async fn summary(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let narrative = match tokio::fs::read_to_string(&state.config.paths.narrative_file).await {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(AppError::Internal(e.to_string())),
    };
    Ok(Html(views::summary_page(narrative.as_deref())))
}

pub async fn comparison(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(views::comparison_page(&results(&state)))
}

pub async fn model_detail(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Html<String>, AppError> {
    let results = results(&state);
    let (name, entry) = dashboard::find_by_key(&results, &key)
        .ok_or_else(|| AppError::NotFound("Model not found".to_string()))?;
    Ok(Html(views::model_page(name, entry)))
}
