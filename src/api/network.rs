use crate::api::AppState;
use crate::error::AppError;
use crate::state::NetworkSnapshot;
use axum::extract::State;
use axum::Json;

pub async fn get_network(State(state): State<AppState>) -> Result<Json<NetworkSnapshot>, AppError> {
    let snapshot = state.snapshot()?;
    Ok(Json(NetworkSnapshot::clone(&snapshot)))
}
