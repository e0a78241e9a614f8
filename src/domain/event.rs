//! Ledger events emitted by the node, one variant per broker subject.

use serde::{Deserialize, Serialize};

/// Layer status code for a layer whose state has been applied.
pub const LAYER_STATUS_APPLIED: u8 = 3;

/// Transaction result status code for a successful execution.
pub const TX_STATUS_SUCCESS: u8 = 0;

/// Broker subject an event arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Layers,
    Rewards,
    Activations,
    TransactionsCreated,
    TransactionsResult,
    Malfeasance,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::Layers,
        Subject::Rewards,
        Subject::Activations,
        Subject::TransactionsCreated,
        Subject::TransactionsResult,
        Subject::Malfeasance,
    ];

    /// Subject name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Layers => "layers",
            Subject::Rewards => "rewards",
            Subject::Activations => "atx",
            Subject::TransactionsCreated => "transactions.created",
            Subject::TransactionsResult => "transactions.result",
            Subject::Malfeasance => "malfeasance",
        }
    }

    /// JetStream stream that carries this subject.
    pub fn stream(&self) -> &'static str {
        match self {
            Subject::TransactionsCreated | Subject::TransactionsResult => "transactions",
            other => other.as_str(),
        }
    }

    /// Durable consumer name for this subject.
    pub fn durable_name(&self) -> String {
        format!("state-api-process-{}", self.as_str().replace('.', "-"))
    }

    pub fn parse(s: &str) -> Option<Subject> {
        Subject::ALL.into_iter().find(|subject| subject.as_str() == s)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStatusEvent {
    pub layer: u32,
    pub status: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardEvent {
    /// Explicit reward id when the producer supplies one.
    #[serde(default, alias = "id")]
    pub reward_id: Option<String>,
    pub coinbase: String,
    pub node_id: String,
    pub atx_id: String,
    pub layer: u32,
    pub layer_reward: u64,
    #[serde(alias = "total")]
    pub total_reward: u64,
}

impl RewardEvent {
    /// Stable identifier for this reward.
    ///
    /// Priority: explicit `reward_id` (if present) > hash of deterministic fields.
    pub fn stable_id(&self) -> String {
        if let Some(id) = self.reward_id.as_deref().filter(|s| !s.trim().is_empty()) {
            return id.trim().to_string();
        }

        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hasher.update(self.layer.to_le_bytes());
        hash_var(&mut hasher, &self.coinbase);
        hash_var(&mut hasher, &self.atx_id);
        hash_var(&mut hasher, &self.node_id);

        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationEvent {
    pub atx_id: String,
    pub node_id: String,
    pub coinbase: String,
    pub publish_epoch: u32,
    #[serde(default)]
    pub base_tick: u64,
    pub tick_count: u64,
    #[serde(alias = "numUnits")]
    pub effective_num_units: u64,
    #[serde(default)]
    pub sequence: u64,
    #[serde(default, alias = "receivedAt")]
    pub received: i64,
}

/// Header fields shared by both transaction events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHeader {
    pub principal: String,
    pub method: u8,
    #[serde(alias = "layerId")]
    pub layer: u32,
    #[serde(default)]
    pub gas: u64,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub status: u8,
    /// Every address the transaction touched, principal included.
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCreatedEvent {
    #[serde(alias = "id")]
    pub tx_id: String,
    pub header: TransactionHeader,
    /// Base64-encoded binary body.
    #[serde(default)]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResultEvent {
    #[serde(alias = "id")]
    pub tx_id: String,
    pub header: TransactionHeader,
    /// Base64-encoded binary body.
    #[serde(default, alias = "rawBody")]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MalfeasanceEvent {
    pub node_id: String,
    #[serde(alias = "receivedAt")]
    pub received: i64,
}

/// Fields extracted from a transaction's binary body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedBody {
    pub receiver: Option<String>,
    pub amount: u64,
    pub counter: u64,
    pub gas_price: u64,
}

/// A transaction event after its body has been decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub tx_id: String,
    pub header: TransactionHeader,
    pub body: Option<DecodedBody>,
}

impl TransactionRecord {
    pub fn receiver(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.receiver.as_deref())
            .filter(|r| !r.is_empty())
    }

    pub fn amount(&self) -> u64 {
        self.body.as_ref().map(|b| b.amount).unwrap_or(0)
    }

    pub fn counter(&self) -> u64 {
        self.body.as_ref().map(|b| b.counter).unwrap_or(0)
    }

    pub fn gas_price(&self) -> u64 {
        self.body.as_ref().map(|b| b.gas_price).unwrap_or(0)
    }

    /// Whether a completed result of this transaction moves funds.
    pub fn is_effective(&self) -> bool {
        self.header.status == TX_STATUS_SUCCESS && self.header.addresses.len() >= 2
    }
}

/// A decoded ledger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    LayerStatus(LayerStatusEvent),
    Reward(RewardEvent),
    Activation(ActivationEvent),
    TransactionCreated(TransactionRecord),
    TransactionResult(TransactionRecord),
    Malfeasance(MalfeasanceEvent),
}

impl LedgerEvent {
    /// Stable identifier used to deduplicate redeliveries.
    pub fn dedup_key(&self) -> String {
        match self {
            LedgerEvent::LayerStatus(e) => format!("layer:{}", e.layer),
            LedgerEvent::Reward(e) => format!("reward:{}", e.stable_id()),
            LedgerEvent::Activation(e) => format!("atx:{}", e.atx_id),
            LedgerEvent::TransactionCreated(t) => format!("tx-created:{}", t.tx_id),
            LedgerEvent::TransactionResult(t) => format!("tx-result:{}", t.tx_id),
            LedgerEvent::Malfeasance(e) => format!("malfeasance:{}", e.node_id),
        }
    }

    pub fn subject(&self) -> Subject {
        match self {
            LedgerEvent::LayerStatus(_) => Subject::Layers,
            LedgerEvent::Reward(_) => Subject::Rewards,
            LedgerEvent::Activation(_) => Subject::Activations,
            LedgerEvent::TransactionCreated(_) => Subject::TransactionsCreated,
            LedgerEvent::TransactionResult(_) => Subject::TransactionsResult,
            LedgerEvent::Malfeasance(_) => Subject::Malfeasance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reward(id: Option<&str>) -> RewardEvent {
        RewardEvent {
            reward_id: id.map(|s| s.to_string()),
            coinbase: "A".to_string(),
            node_id: "n1".to_string(),
            atx_id: "x1".to_string(),
            layer: 10,
            layer_reward: 900,
            total_reward: 1000,
        }
    }

    #[test]
    fn test_reward_stable_id_prefers_explicit() {
        assert_eq!(reward(Some("r1")).stable_id(), "r1");
    }

    #[test]
    fn test_reward_stable_id_hash_is_deterministic() {
        let a = reward(None).stable_id();
        let b = reward(Some("  ")).stable_id();
        assert!(a.starts_with("hash:"));
        assert_eq!(a, b);

        let mut other = reward(None);
        other.layer = 11;
        assert_ne!(other.stable_id(), a);
    }

    #[test]
    fn test_subject_names() {
        assert_eq!(Subject::Activations.as_str(), "atx");
        assert_eq!(Subject::TransactionsResult.stream(), "transactions");
        assert_eq!(
            Subject::TransactionsCreated.durable_name(),
            "state-api-process-transactions-created"
        );
        assert_eq!(Subject::parse("rewards"), Some(Subject::Rewards));
        assert_eq!(Subject::parse("blocks"), None);
    }

    #[test]
    fn test_transaction_effectiveness() {
        let mut record = TransactionRecord {
            tx_id: "t1".to_string(),
            header: TransactionHeader {
                principal: "P".to_string(),
                method: 16,
                layer: 1,
                gas: 1,
                fee: 5,
                status: TX_STATUS_SUCCESS,
                addresses: vec!["P".to_string(), "R".to_string()],
            },
            body: None,
        };
        assert!(record.is_effective());

        record.header.addresses.truncate(1);
        assert!(!record.is_effective());

        record.header.addresses.push("R".to_string());
        record.header.status = 1;
        assert!(!record.is_effective());
    }
}
