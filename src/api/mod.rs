pub mod accounts;
pub mod epochs;
pub mod health;
pub mod layers;
pub mod network;
pub mod nodes;
pub mod pagination;
pub mod transactions;

use crate::db::Repository;
use crate::domain::{Epoch, LayerId};
use crate::engine::predicted_rewards;
use crate::error::AppError;
use crate::state::{NetworkSnapshot, NetworkStateCache};
use axum::{routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub network: Arc<NetworkStateCache>,
    /// bech32 prefix addresses must carry.
    pub hrp: String,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, network: Arc<NetworkStateCache>, hrp: String) -> Self {
        Self { repo, network, hrp }
    }

    /// Current snapshot, or 503 until the first refresh has succeeded.
    pub fn snapshot(&self) -> Result<Arc<NetworkSnapshot>, AppError> {
        self.network
            .snapshot()
            .ok_or_else(|| AppError::Unavailable("network state not yet available".into()))
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/accounts/:address", get(accounts::get_account))
        .route("/v1/accounts/:address/rewards", get(accounts::get_rewards))
        .route(
            "/v1/accounts/:address/rewards/details",
            get(accounts::get_reward_details),
        )
        .route(
            "/v1/accounts/:address/transactions",
            get(accounts::get_transactions),
        )
        .route(
            "/v1/accounts/:address/activations/:epoch",
            get(accounts::get_activations),
        )
        .route("/v1/nodes/:node_id", get(nodes::get_node))
        .route("/v1/nodes/:node_id/rewards", get(nodes::get_rewards))
        .route(
            "/v1/nodes/:node_id/rewards/details",
            get(nodes::get_reward_details),
        )
        .route(
            "/v1/nodes/:node_id/rewards/eligibility",
            get(nodes::get_eligibility),
        )
        .route("/v1/epochs/:epoch", get(epochs::get_epoch))
        .route("/v1/epochs/:epoch/activations", get(epochs::get_activations))
        .route("/v1/transactions", get(transactions::list_transactions))
        .route("/v1/transactions/:tx_id", get(transactions::get_transaction))
        .route("/v1/layers", get(layers::list_layers))
        .route("/v1/layers/:layer", get(layers::get_layer))
        .route(
            "/v1/layers/:layer/transactions",
            get(layers::get_transactions),
        )
        .route("/v1/layers/:layer/rewards", get(layers::get_rewards))
        .route("/v1/network", get(network::get_network))
        .layer(cors)
        .with_state(state)
}

/// Expected share of the current epoch for a given weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub epoch: u32,
    pub weight: u64,
    pub effective_num_units: u64,
    pub slots: Option<u64>,
    pub predicted_rewards: Option<u64>,
}

impl Eligibility {
    /// `weight` and `units` are what was published in the epoch before the
    /// snapshot's, i.e. what is active now.
    pub fn for_snapshot(
        state: &AppState,
        snapshot: &NetworkSnapshot,
        weight: i64,
        units: i64,
    ) -> Self {
        let weight = u64::try_from(weight).unwrap_or(0);
        let epoch = Epoch::new(snapshot.epoch);
        let slots = state
            .network
            .params()
            .eligibility
            .eligible_slots(weight, snapshot.total_weight, epoch);

        Self {
            epoch: snapshot.epoch,
            weight,
            effective_num_units: u64::try_from(units).unwrap_or(0),
            slots,
            predicted_rewards: predicted_rewards(
                snapshot.epoch_subsidy,
                weight,
                snapshot.total_weight,
            ),
        }
    }
}

pub(crate) fn parse_epoch(raw: &str) -> Result<Epoch, AppError> {
    raw.parse::<u32>()
        .map(Epoch::new)
        .map_err(|_| AppError::BadRequest(format!("invalid epoch: {}", raw)))
}

pub(crate) fn parse_layer(raw: &str) -> Result<LayerId, AppError> {
    raw.parse::<u32>()
        .map(LayerId::new)
        .map_err(|_| AppError::BadRequest(format!("invalid layer: {}", raw)))
}

/// Inclusive layer bounds of `epoch`; 400 when the epoch lies past the last
/// representable layer.
pub(crate) fn epoch_layers(state: &AppState, epoch: Epoch) -> Result<(u32, u32), AppError> {
    epoch
        .layer_range(state.network.params().layers_per_epoch)
        .map(|(first, last)| (first.as_u32(), last.as_u32()))
        .ok_or_else(|| AppError::BadRequest(format!("epoch {} is out of range", epoch)))
}
