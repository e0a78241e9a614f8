//! Read-hot network summary, recomputed in the background.
//!
//! Readers get the last complete snapshot through a single atomic slot and
//! never wait on a refresh. A refresh that fails at any step leaves the
//! previous snapshot in place.

use super::price::PriceResolver;
use crate::db::Repository;
use crate::domain::{Epoch, LayerId};
use crate::engine::{EligibilityParams, SubsidyParams, SubsidySchedule};
use crate::orchestration::BackgroundTask;
use arc_swap::ArcSwapOption;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("no layer has been processed yet")]
    NoProcessedLayer,
}

/// Network constants the snapshot is derived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub layers_per_epoch: u32,
    pub layer_duration_secs: u64,
    pub genesis_time_secs: i64,
    pub eligibility: EligibilityParams,
    pub subsidy: SubsidyParams,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            layers_per_epoch: 4032,
            layer_duration_secs: 300,
            genesis_time_secs: 1_689_321_600,
            eligibility: EligibilityParams::default(),
            subsidy: SubsidyParams::default(),
        }
    }
}

impl NetworkParams {
    /// Unix time at which `layer` starts.
    pub fn layer_start_time(&self, layer: LayerId) -> i64 {
        let offset = i64::from(layer.as_u32()).saturating_mul(self.layer_duration_secs as i64);
        self.genesis_time_secs.saturating_add(offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighestActivation {
    pub atx_id: String,
    pub atx_hex: String,
    /// Base64 of the id bytes; absent if the id is not hex.
    pub atx_base64: Option<String>,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextEpochSummary {
    pub epoch: u32,
    pub effective_units_committed: u64,
    pub total_activations: u64,
}

/// One consistent view of the network, replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub epoch: u32,
    pub layer: u32,
    pub epoch_subsidy: u64,
    /// Weight of the activations published in the previous epoch, which form
    /// the current active set.
    pub total_weight: u64,
    pub effective_units_committed: u64,
    pub total_active_smeshers: u64,
    pub total_slots: Option<u64>,
    /// Minted rewards plus the vaulted amount vested at `layer`.
    pub circulating_supply: u64,
    pub total_accounts: u64,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub highest_activation: Option<HighestActivation>,
    pub next_epoch: NextEpochSummary,
    pub refreshed_at: i64,
}

pub struct NetworkStateCache {
    repo: Arc<Repository>,
    price: Arc<PriceResolver>,
    params: NetworkParams,
    schedule: SubsidySchedule,
    subsidies: Mutex<HashMap<u32, u64>>,
    current: ArcSwapOption<NetworkSnapshot>,
}

impl NetworkStateCache {
    pub fn new(repo: Arc<Repository>, price: Arc<PriceResolver>, params: NetworkParams) -> Self {
        Self {
            repo,
            price,
            params,
            schedule: SubsidySchedule::new(params.subsidy),
            subsidies: Mutex::new(HashMap::new()),
            current: ArcSwapOption::empty(),
        }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn schedule(&self) -> &SubsidySchedule {
        &self.schedule
    }

    pub fn price(&self) -> &PriceResolver {
        &self.price
    }

    /// Last complete snapshot, if a refresh has ever succeeded.
    pub fn snapshot(&self) -> Option<Arc<NetworkSnapshot>> {
        self.current.load_full()
    }

    /// Subsidy of `epoch`. Epochs up to the current one are computed once and
    /// kept for the life of the process; later epochs are computed per call.
    pub fn epoch_subsidy(&self, epoch: Epoch) -> u64 {
        let reached = self
            .snapshot()
            .is_some_and(|snapshot| epoch.as_u32() <= snapshot.epoch);
        if reached {
            self.cached_subsidy(epoch)
        } else {
            self.schedule.epoch_subsidy(epoch)
        }
    }

    fn cached_subsidy(&self, epoch: Epoch) -> u64 {
        *self
            .subsidies
            .lock()
            .entry(epoch.as_u32())
            .or_insert_with(|| self.schedule.epoch_subsidy(epoch))
    }

    /// Recompute the snapshot from the store and publish it.
    ///
    /// # Errors
    /// Any failed read aborts the refresh and leaves the previous snapshot.
    pub async fn refresh(&self) -> Result<Arc<NetworkSnapshot>, StateError> {
        let layer = self
            .repo
            .last_processed_layer()
            .await?
            .map(LayerId::new)
            .ok_or(StateError::NoProcessedLayer)?;
        let epoch = layer.epoch(self.params.layers_per_epoch);
        let active_epoch = epoch.prev();

        let active = self
            .repo
            .get_epoch_totals(active_epoch.as_u32())
            .await?
            .unwrap_or_default();
        let next = self
            .repo
            .get_epoch_totals(epoch.as_u32())
            .await?
            .unwrap_or_default();
        let total_accounts = self.repo.count_accounts().await?;
        let info = self.repo.get_network_info().await?;
        let highest = self.repo.highest_activation(active_epoch.as_u32()).await?;

        let total_weight = non_negative(active.total_weight);
        let snapshot = NetworkSnapshot {
            epoch: epoch.as_u32(),
            layer: layer.as_u32(),
            epoch_subsidy: self.cached_subsidy(epoch),
            total_weight,
            effective_units_committed: non_negative(active.total_effective_num_units),
            total_active_smeshers: non_negative(active.total_atx),
            total_slots: self
                .params
                .eligibility
                .eligible_slots(total_weight, total_weight, epoch),
            circulating_supply: non_negative(info.circulating_supply)
                .saturating_add(self.schedule.vested(layer.as_u32())),
            total_accounts: non_negative(total_accounts),
            price: self.price.current().usd(),
            highest_activation: highest.map(|atx| HighestActivation {
                atx_base64: hex::decode(&atx.atx_id).ok().map(|b| BASE64.encode(b)),
                atx_hex: atx.atx_id.clone(),
                height: atx.height(),
                atx_id: atx.atx_id,
            }),
            next_epoch: NextEpochSummary {
                epoch: epoch.next().as_u32(),
                effective_units_committed: non_negative(next.total_effective_num_units),
                total_activations: non_negative(next.total_atx),
            },
            refreshed_at: chrono::Utc::now().timestamp(),
        };

        let snapshot = Arc::new(snapshot);
        self.current.store(Some(Arc::clone(&snapshot)));
        debug!(epoch = snapshot.epoch, layer = snapshot.layer, "Network snapshot refreshed");
        Ok(snapshot)
    }

    /// Refresh now, then every `interval` until stopped.
    pub fn start(self: &Arc<Self>, interval: Duration) -> BackgroundTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(self);

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Network state refresh started");
            loop {
                if let Err(e) = cache.refresh().await {
                    warn!(error = %e, "Network state refresh failed, keeping previous snapshot");
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Network state refresh stopped");
        });

        BackgroundTask::new("network-state", shutdown_tx, vec![handle])
    }
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
