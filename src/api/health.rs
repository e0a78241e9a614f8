use crate::api::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the first network snapshot has been built.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = state.snapshot()?;
    Ok(Json(serde_json::json!({
        "status": "ready",
        "layer": snapshot.layer,
    })))
}
