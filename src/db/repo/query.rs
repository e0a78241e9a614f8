//! Read accessors. Every list accessor has a matching count.

use super::{Page, Repository};
use crate::domain::{
    Account, Activation, EpochTotals, LayerRecord, NetworkInfo, Node, NodeActivation, Reward,
    Transaction,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::NETWORK_INFO_ID;

/// Which column a reward query is keyed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOwner {
    Coinbase(String),
    Node(String),
}

impl RewardOwner {
    fn column(&self) -> &'static str {
        match self {
            RewardOwner::Coinbase(_) => "coinbase",
            RewardOwner::Node(_) => "node_id",
        }
    }

    fn value(&self) -> &str {
        match self {
            RewardOwner::Coinbase(v) | RewardOwner::Node(v) => v,
        }
    }
}

/// Rewards of one account or node, or of everyone, optionally bounded to a
/// layer range (both ends inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardFilter {
    pub owner: Option<RewardOwner>,
    pub first_layer: Option<u32>,
    pub last_layer: Option<u32>,
}

impl RewardFilter {
    pub fn all() -> Self {
        Self {
            owner: None,
            first_layer: None,
            last_layer: None,
        }
    }

    pub fn coinbase(address: impl Into<String>) -> Self {
        Self {
            owner: Some(RewardOwner::Coinbase(address.into())),
            ..Self::all()
        }
    }

    pub fn node(node_id: impl Into<String>) -> Self {
        Self {
            owner: Some(RewardOwner::Node(node_id.into())),
            ..Self::all()
        }
    }

    pub fn layers(mut self, first: Option<u32>, last: Option<u32>) -> Self {
        self.first_layer = first;
        self.last_layer = last;
        self
    }

    fn where_clause(&self) -> String {
        let bounds = "(? IS NULL OR layer >= ?) AND (? IS NULL OR layer <= ?)";
        match &self.owner {
            Some(owner) => format!("{} = ? AND {}", owner.column(), bounds),
            None => bounds.to_string(),
        }
    }
}

/// Bind the parameters of [`RewardFilter::where_clause`] in order.
macro_rules! bind_reward_filter {
    ($query:expr, $filter:expr) => {{
        let first = $filter.first_layer.map(i64::from);
        let last = $filter.last_layer.map(i64::from);
        let query = $query;
        let query = match &$filter.owner {
            Some(owner) => query.bind(owner.value().to_string()),
            None => query,
        };
        query.bind(first).bind(first).bind(last).bind(last)
    }};
}

/// Transactions touching an address and/or included in a layer. Every unset
/// field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub address: Option<String>,
    pub layer: Option<u32>,
    pub complete: Option<bool>,
}

impl TransactionFilter {
    /// Sent or received by `address`.
    pub fn account(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    pub fn layer(layer: u32) -> Self {
        Self {
            layer: Some(layer),
            ..Self::default()
        }
    }

    pub fn complete(mut self, complete: Option<bool>) -> Self {
        self.complete = complete;
        self
    }
}

const TRANSACTION_WHERE: &str = r#"
    (? IS NULL OR principal = ? OR receiver = ?)
    AND (? IS NULL OR layer = ?)
    AND (? IS NULL OR complete = ?)"#;

/// Bind the parameters of [`TRANSACTION_WHERE`] in order.
macro_rules! bind_transaction_filter {
    ($query:expr, $filter:expr) => {{
        let address = $filter.address.as_deref();
        let layer = $filter.layer.map(i64::from);
        let complete = $filter.complete.map(i64::from);
        $query
            .bind(address)
            .bind(address)
            .bind(address)
            .bind(layer)
            .bind(layer)
            .bind(complete)
            .bind(complete)
    }};
}

impl Repository {
    // =========================================================================
    // Accounts
    // =========================================================================

    pub async fn get_account(&self, address: &str) -> Result<Option<Account>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT address, balance, total_rewards, sent, received, fees FROM accounts WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Account {
            address: r.get("address"),
            balance: r.get("balance"),
            total_rewards: r.get("total_rewards"),
            sent: r.get("sent"),
            received: r.get("received"),
            fees: r.get("fees"),
        }))
    }

    pub async fn count_accounts(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    // =========================================================================
    // Rewards
    // =========================================================================

    pub async fn count_rewards(&self, filter: &RewardFilter) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "SELECT COUNT(*) AS n FROM rewards WHERE {}",
            filter.where_clause()
        );
        let row = bind_reward_filter!(sqlx::query(&sql), filter)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Rewards ordered by layer, then id.
    pub async fn list_rewards(
        &self,
        filter: &RewardFilter,
        page: Page,
    ) -> Result<Vec<Reward>, sqlx::Error> {
        let order = page.sort.as_sql();
        let sql = format!(
            r#"
            SELECT reward_id, coinbase, node_id, atx_id, layer, layer_reward, total_reward
            FROM rewards
            WHERE {}
            ORDER BY layer {order}, reward_id {order}
            LIMIT ? OFFSET ?
            "#,
            filter.where_clause()
        );

        let rows = bind_reward_filter!(sqlx::query(&sql), filter)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| Reward {
                reward_id: r.get("reward_id"),
                coinbase: r.get("coinbase"),
                node_id: r.get("node_id"),
                atx_id: r.get("atx_id"),
                layer: r.get::<i64, _>("layer") as u32,
                layer_reward: r.get("layer_reward"),
                total_reward: r.get("total_reward"),
            })
            .collect())
    }

    /// Sum of `total_reward` and number of rewards matching the filter.
    pub async fn sum_rewards(&self, filter: &RewardFilter) -> Result<(i64, i64), sqlx::Error> {
        let sql = format!(
            "SELECT COALESCE(SUM(total_reward), 0) AS total, COUNT(*) AS n FROM rewards WHERE {}",
            filter.where_clause()
        );
        let row = bind_reward_filter!(sqlx::query(&sql), filter)
            .fetch_one(&self.pool)
            .await?;
        Ok((row.get("total"), row.get("n")))
    }

    /// Sum of rewards minted in a layer range, across all accounts.
    pub async fn sum_rewards_in_layers(
        &self,
        first_layer: u32,
        last_layer: u32,
    ) -> Result<(i64, i64), sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(total_reward), 0) AS total, COUNT(*) AS n
            FROM rewards
            WHERE layer >= ? AND layer <= ?
            "#,
        )
        .bind(i64::from(first_layer))
        .bind(i64::from(last_layer))
        .fetch_one(&self.pool)
        .await?;
        Ok((row.get("total"), row.get("n")))
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub async fn count_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) AS n FROM transactions WHERE {TRANSACTION_WHERE}");
        let row = bind_transaction_filter!(sqlx::query(&sql), filter)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Transactions matching the filter, ordered by layer, then id.
    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let order = page.sort.as_sql();
        let sql = format!(
            r#"
            SELECT tx_id, principal, receiver, method, status, layer, gas, gas_price, fee,
                   amount, counter, complete
            FROM transactions
            WHERE {TRANSACTION_WHERE}
            ORDER BY layer {order}, tx_id {order}
            LIMIT ? OFFSET ?
            "#
        );

        let rows = bind_transaction_filter!(sqlx::query(&sql), filter)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_transaction).collect())
    }

    pub async fn get_transaction(&self, tx_id: &str) -> Result<Option<Transaction>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT tx_id, principal, receiver, method, status, layer, gas, gas_price, fee,
                   amount, counter, complete
            FROM transactions
            WHERE tx_id = ?
            "#,
        )
        .bind(tx_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_transaction))
    }

    // =========================================================================
    // Activations
    // =========================================================================

    pub async fn get_activation(&self, atx_id: &str) -> Result<Option<Activation>, sqlx::Error> {
        let row = sqlx::query(&format!("{ACTIVATION_COLUMNS} WHERE atx_id = ?"))
            .bind(atx_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_activation))
    }

    /// Count activations published in `epoch`, optionally for one coinbase.
    pub async fn count_activations(
        &self,
        epoch: u32,
        coinbase: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM activations
            WHERE publish_epoch = ? AND (? IS NULL OR coinbase = ?)
            "#,
        )
        .bind(i64::from(epoch))
        .bind(coinbase)
        .bind(coinbase)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    /// Activations published in `epoch`, ordered by receipt time, then id.
    pub async fn list_activations(
        &self,
        epoch: u32,
        coinbase: Option<&str>,
        page: Page,
    ) -> Result<Vec<Activation>, sqlx::Error> {
        let order = page.sort.as_sql();
        let sql = format!(
            r#"
            {ACTIVATION_COLUMNS}
            WHERE publish_epoch = ? AND (? IS NULL OR coinbase = ?)
            ORDER BY received {order}, atx_id {order}
            LIMIT ? OFFSET ?
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(i64::from(epoch))
            .bind(coinbase)
            .bind(coinbase)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_activation).collect())
    }

    /// Weight, effective units and activation count a coinbase published in
    /// `epoch`.
    pub async fn account_epoch_weight(
        &self,
        coinbase: &str,
        epoch: u32,
    ) -> Result<(i64, i64, i64), sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(weight), 0) AS weight,
                   COALESCE(SUM(effective_num_units), 0) AS units,
                   COUNT(*) AS n
            FROM activations
            WHERE coinbase = ? AND publish_epoch = ?
            "#,
        )
        .bind(coinbase)
        .bind(i64::from(epoch))
        .fetch_one(&self.pool)
        .await?;
        Ok((row.get("weight"), row.get("units"), row.get("n")))
    }

    pub async fn get_epoch_totals(&self, epoch: u32) -> Result<Option<EpochTotals>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT epoch, total_weight, total_effective_num_units, total_atx
            FROM activation_epoch_totals
            WHERE epoch = ?
            "#,
        )
        .bind(i64::from(epoch))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| EpochTotals {
            epoch: r.get::<i64, _>("epoch") as u32,
            total_weight: r.get("total_weight"),
            total_effective_num_units: r.get("total_effective_num_units"),
            total_atx: r.get("total_atx"),
        }))
    }

    /// Highest-tick activation published in `epoch` by a node without a
    /// malfeasance proof. Ties resolve to the smallest id.
    pub async fn highest_activation(&self, epoch: u32) -> Result<Option<Activation>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT a.atx_id, a.node_id, a.coinbase, a.publish_epoch, a.base_tick, a.tick_count,
                   a.effective_num_units, a.weight, a.sequence, a.received
            FROM activations a
            LEFT JOIN nodes n ON n.node_id = a.node_id
            WHERE a.publish_epoch = ? AND n.malfeasance_received IS NULL
            ORDER BY a.base_tick + a.tick_count DESC, a.atx_id ASC
            LIMIT 1
            "#,
        )
        .bind(i64::from(epoch))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_activation))
    }

    // =========================================================================
    // Layers & network
    // =========================================================================

    /// Highest layer recorded as applied.
    pub async fn last_processed_layer(&self) -> Result<Option<u32>, sqlx::Error> {
        let row = sqlx::query("SELECT MAX(layer) AS layer FROM layers")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<Option<i64>, _>("layer").map(|l| l as u32))
    }

    pub async fn get_layer(&self, layer: u32) -> Result<Option<LayerRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT layer, status FROM layers WHERE layer = ?")
            .bind(i64::from(layer))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| LayerRecord {
            layer: r.get::<i64, _>("layer") as u32,
            status: r.get::<i64, _>("status") as u8,
        }))
    }

    pub async fn count_layers(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM layers")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Applied layers ordered by number.
    pub async fn list_layers(&self, page: Page) -> Result<Vec<LayerRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT layer, status FROM layers ORDER BY layer {} LIMIT ? OFFSET ?",
            page.sort.as_sql()
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| LayerRecord {
                layer: r.get::<i64, _>("layer") as u32,
                status: r.get::<i64, _>("status") as u8,
            })
            .collect())
    }

    /// The network singleton, zeroed if nothing has been minted yet.
    pub async fn get_network_info(&self) -> Result<NetworkInfo, sqlx::Error> {
        let row = sqlx::query(
            "SELECT circulating_supply, reward_count, activation_count FROM network_info WHERE id = ?",
        )
        .bind(NETWORK_INFO_ID)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|r| NetworkInfo {
                circulating_supply: r.get("circulating_supply"),
                reward_count: r.get("reward_count"),
                activation_count: r.get("activation_count"),
            })
            .unwrap_or_default())
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Node record with its activation summaries, oldest epoch first.
    pub async fn get_node(&self, node_id: &str) -> Result<Option<Node>, sqlx::Error> {
        let Some(row) = sqlx::query("SELECT node_id, malfeasance_received FROM nodes WHERE node_id = ?")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let activations = sqlx::query(
            r#"
            SELECT atx_id, coinbase, publish_epoch, effective_num_units, weight, sequence, received
            FROM node_activations
            WHERE node_id = ?
            ORDER BY publish_epoch ASC, atx_id ASC
            "#,
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|r| NodeActivation {
            atx_id: r.get("atx_id"),
            coinbase: r.get("coinbase"),
            publish_epoch: r.get::<i64, _>("publish_epoch") as u32,
            effective_num_units: r.get("effective_num_units"),
            weight: r.get("weight"),
            sequence: r.get("sequence"),
            received: r.get("received"),
        })
        .collect();

        Ok(Some(Node {
            node_id: row.get("node_id"),
            malfeasance_received: row.get("malfeasance_received"),
            activations,
        }))
    }
}

const ACTIVATION_COLUMNS: &str = r#"
    SELECT atx_id, node_id, coinbase, publish_epoch, base_tick, tick_count,
           effective_num_units, weight, sequence, received
    FROM activations"#;

fn row_to_activation(r: &SqliteRow) -> Activation {
    Activation {
        atx_id: r.get("atx_id"),
        node_id: r.get("node_id"),
        coinbase: r.get("coinbase"),
        publish_epoch: r.get::<i64, _>("publish_epoch") as u32,
        base_tick: r.get("base_tick"),
        tick_count: r.get("tick_count"),
        effective_num_units: r.get("effective_num_units"),
        weight: r.get("weight"),
        sequence: r.get("sequence"),
        received: r.get("received"),
    }
}

fn row_to_transaction(r: &SqliteRow) -> Transaction {
    Transaction {
        tx_id: r.get("tx_id"),
        principal: r.get("principal"),
        receiver: r.get("receiver"),
        method: r.get::<i64, _>("method") as u8,
        status: r.get::<i64, _>("status") as u8,
        layer: r.get::<i64, _>("layer") as u32,
        gas: r.get("gas"),
        gas_price: r.get("gas_price"),
        fee: r.get("fee"),
        amount: r.get("amount"),
        counter: r.get("counter"),
        complete: r.get::<i64, _>("complete") != 0,
    }
}
