use crate::api::pagination::{paged, LayerRangeQuery, PageQuery};
use crate::api::{epoch_layers, AppState, Eligibility};
use crate::db::RewardFilter;
use crate::domain::{Epoch, Node};
use crate::error::AppError;
use crate::state::NetworkSnapshot;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResponse {
    #[serde(flatten)]
    pub node: Node,
    pub malfeasant: bool,
    pub reward_count: i64,
    pub total_rewards: i64,
    /// Absent until the network state is available.
    pub eligibility: Option<Eligibility>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRewardDetailsResponse {
    pub node_id: String,
    pub total_rewards: i64,
    pub total_count: i64,
    pub epoch: u32,
    /// Rewards earned in the current epoch so far.
    pub epoch_rewards: i64,
    pub epoch_count: i64,
}

/// Weight and effective units of the node's activations that are active in
/// the snapshot's epoch.
fn active_weight(node: &Node, snapshot: &NetworkSnapshot) -> (i64, i64) {
    let active_epoch = Epoch::new(snapshot.epoch).prev().as_u32();
    node.activations
        .iter()
        .filter(|a| a.publish_epoch == active_epoch)
        .fold((0i64, 0i64), |(w, u), a| {
            (
                w.saturating_add(a.weight),
                u.saturating_add(a.effective_num_units),
            )
        })
}

async fn load_node(state: &AppState, node_id: &str) -> Result<Node, AppError> {
    state
        .repo
        .get_node(node_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("node {} not found", node_id)))
}

pub async fn get_node(
    Path(node_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<NodeResponse>, AppError> {
    let node = load_node(&state, &node_id).await?;

    let (total_rewards, reward_count) = state
        .repo
        .sum_rewards(&RewardFilter::node(node_id.as_str()))
        .await?;

    let eligibility = state.network.snapshot().map(|snapshot| {
        let (weight, units) = active_weight(&node, &snapshot);
        Eligibility::for_snapshot(&state, &snapshot, weight, units)
    });

    Ok(Json(NodeResponse {
        malfeasant: node.is_malfeasant(),
        node,
        reward_count,
        total_rewards,
        eligibility,
    }))
}

pub async fn get_rewards(
    Path(node_id): Path<String>,
    Query(page): Query<PageQuery>,
    Query(range): Query<LayerRangeQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let page = page.page()?;
    let (first, last) = range.bounds()?;

    let filter = RewardFilter::node(node_id).layers(first, last);
    let total = state.repo.count_rewards(&filter).await?;
    let rewards = state.repo.list_rewards(&filter, page).await?;

    Ok(paged(total, rewards))
}

pub async fn get_reward_details(
    Path(node_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<NodeRewardDetailsResponse>, AppError> {
    let snapshot = state.snapshot()?;
    let (first, last) = epoch_layers(&state, Epoch::new(snapshot.epoch))?;

    let all = RewardFilter::node(node_id.as_str());
    let (total_rewards, total_count) = state.repo.sum_rewards(&all).await?;
    let (epoch_rewards, epoch_count) = state
        .repo
        .sum_rewards(&all.layers(Some(first), Some(last)))
        .await?;

    Ok(Json(NodeRewardDetailsResponse {
        node_id,
        total_rewards,
        total_count,
        epoch: snapshot.epoch,
        epoch_rewards,
        epoch_count,
    }))
}

/// Eligibility of the node in the current epoch.
pub async fn get_eligibility(
    Path(node_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Eligibility>, AppError> {
    let snapshot = state.snapshot()?;
    let node = load_node(&state, &node_id).await?;

    let (weight, units) = active_weight(&node, &snapshot);
    Ok(Json(Eligibility::for_snapshot(
        &state, &snapshot, weight, units,
    )))
}
