use crate::api::pagination::{paged, CompleteQuery, PageQuery};
use crate::api::{parse_layer, AppState};
use crate::db::{RewardFilter, TransactionFilter};
use crate::domain::LayerRecord;
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerResponse {
    #[serde(flatten)]
    pub layer: LayerRecord,
    pub start_time: i64,
    pub rewards_sum: i64,
    pub rewards_count: i64,
    pub transaction_count: i64,
}

/// Applied layers.
pub async fn list_layers(
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let page = page.page()?;

    let total = state.repo.count_layers().await?;
    let layers = state.repo.list_layers(page).await?;

    Ok(paged(total, layers))
}

pub async fn get_layer(
    Path(layer): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LayerResponse>, AppError> {
    let layer = parse_layer(&layer)?;

    let record = state
        .repo
        .get_layer(layer.as_u32())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("layer {} not processed", layer.as_u32())))?;

    let (rewards_sum, rewards_count) = state
        .repo
        .sum_rewards_in_layers(layer.as_u32(), layer.as_u32())
        .await?;
    let transaction_count = state
        .repo
        .count_transactions(&TransactionFilter::layer(layer.as_u32()))
        .await?;

    Ok(Json(LayerResponse {
        start_time: state.network.params().layer_start_time(layer),
        layer: record,
        rewards_sum,
        rewards_count,
        transaction_count,
    }))
}

pub async fn get_transactions(
    Path(layer): Path<String>,
    Query(page): Query<PageQuery>,
    Query(complete): Query<CompleteQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let layer = parse_layer(&layer)?;
    let page = page.page()?;
    let filter = TransactionFilter::layer(layer.as_u32()).complete(complete.filter()?);

    let total = state.repo.count_transactions(&filter).await?;
    let transactions = state.repo.list_transactions(&filter, page).await?;

    Ok(paged(total, transactions))
}

pub async fn get_rewards(
    Path(layer): Path<String>,
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let layer = parse_layer(&layer)?.as_u32();
    let page = page.page()?;

    let filter = RewardFilter::all().layers(Some(layer), Some(layer));
    let total = state.repo.count_rewards(&filter).await?;
    let rewards = state.repo.list_rewards(&filter, page).await?;

    Ok(paged(total, rewards))
}
