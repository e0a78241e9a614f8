use crate::api::pagination::{paged, PageQuery};
use crate::api::{epoch_layers, parse_epoch, AppState};
use crate::domain::LayerId;
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochResponse {
    pub epoch: u32,
    pub first_layer: u32,
    pub last_layer: u32,
    pub start_time: i64,
    pub end_time: i64,
    pub subsidy: u64,
    /// Totals of the activation set active during this epoch.
    pub total_weight: i64,
    pub effective_units_committed: i64,
    pub total_activations: i64,
    pub rewards_sum: i64,
    pub rewards_count: i64,
}

pub async fn get_epoch(
    Path(epoch): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<EpochResponse>, AppError> {
    let epoch = parse_epoch(&epoch)?;
    let params = *state.network.params();

    let (first, last) = epoch_layers(&state, epoch)?;

    let totals = state
        .repo
        .get_epoch_totals(epoch.prev().as_u32())
        .await?
        .unwrap_or_default();
    let (rewards_sum, rewards_count) = state.repo.sum_rewards_in_layers(first, last).await?;

    Ok(Json(EpochResponse {
        epoch: epoch.as_u32(),
        first_layer: first,
        last_layer: last,
        start_time: params.layer_start_time(LayerId::new(first)),
        end_time: params
            .layer_start_time(LayerId::new(last))
            .saturating_add(params.layer_duration_secs as i64),
        subsidy: state.network.epoch_subsidy(epoch),
        total_weight: totals.total_weight,
        effective_units_committed: totals.total_effective_num_units,
        total_activations: totals.total_atx,
        rewards_sum,
        rewards_count,
    }))
}

/// Activations active in `epoch`: those published in the epoch before.
pub async fn get_activations(
    Path(epoch): Path<String>,
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let epoch = parse_epoch(&epoch)?;
    let page = page.page()?;

    let publish_epoch = epoch.prev().as_u32();
    let total = state.repo.count_activations(publish_epoch, None).await?;
    let activations = state
        .repo
        .list_activations(publish_epoch, None, page)
        .await?;

    Ok(paged(total, activations))
}
