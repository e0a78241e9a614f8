//! Stored aggregate records as returned by the read accessors.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    pub balance: i64,
    pub total_rewards: i64,
    pub sent: i64,
    pub received: i64,
    pub fees: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub reward_id: String,
    pub coinbase: String,
    pub node_id: String,
    pub atx_id: String,
    pub layer: u32,
    pub layer_reward: i64,
    pub total_reward: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub atx_id: String,
    pub node_id: String,
    pub coinbase: String,
    pub publish_epoch: u32,
    pub base_tick: i64,
    pub tick_count: i64,
    pub effective_num_units: i64,
    pub weight: i64,
    pub sequence: i64,
    pub received: i64,
}

impl Activation {
    /// Tick height reached by this activation.
    pub fn height(&self) -> i64 {
        self.base_tick.saturating_add(self.tick_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochTotals {
    pub epoch: u32,
    pub total_weight: i64,
    pub total_effective_num_units: i64,
    pub total_atx: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub tx_id: String,
    pub principal: String,
    pub receiver: Option<String>,
    pub method: u8,
    pub status: u8,
    pub layer: u32,
    pub gas: i64,
    pub gas_price: i64,
    pub fee: i64,
    pub amount: i64,
    pub counter: i64,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRecord {
    pub layer: u32,
    pub status: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub circulating_supply: i64,
    pub reward_count: i64,
    pub activation_count: i64,
}

/// Compact activation summary kept on the node record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeActivation {
    pub atx_id: String,
    pub coinbase: String,
    pub publish_epoch: u32,
    pub effective_num_units: i64,
    pub weight: i64,
    pub sequence: i64,
    pub received: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malfeasance_received: Option<i64>,
    pub activations: Vec<NodeActivation>,
}

impl Node {
    pub fn is_malfeasant(&self) -> bool {
        self.malfeasance_received.is_some()
    }
}
