//! Idempotent mutation groups, one per ledger event.
//!
//! Every group runs inside one store transaction and opens it with a write
//! statement, so the SQLite write lock is held before anything is read. The
//! insert-vs-replace branch always comes from the affected-row count of the
//! write itself, never from a separate existence check.

use super::{to_stored, ApplyOutcome, Repository, StoreError, NETWORK_INFO_ID};
use crate::domain::event::LAYER_STATUS_APPLIED;
use crate::domain::{
    ActivationEvent, LayerStatusEvent, LedgerEvent, MalfeasanceEvent, RewardEvent,
    TransactionRecord,
};
use crate::engine::{add_to_total, atx_weight};
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

impl Repository {
    /// Apply one decoded event as a single atomic mutation group.
    ///
    /// # Errors
    /// Fatal errors (see [`StoreError::is_fatal`]) mean the event can never be
    /// applied. All other errors leave the store untouched and may be retried.
    pub async fn apply_event(&self, event: &LedgerEvent) -> Result<ApplyOutcome, StoreError> {
        match event {
            LedgerEvent::LayerStatus(e) => self.apply_layer_status(e).await,
            LedgerEvent::Reward(e) => self.apply_reward(e).await,
            LedgerEvent::Activation(e) => self.apply_activation(e).await,
            LedgerEvent::TransactionCreated(t) => self.apply_transaction_created(t).await,
            LedgerEvent::TransactionResult(t) => self.apply_transaction_result(t).await,
            LedgerEvent::Malfeasance(e) => self.apply_malfeasance(e).await,
        }
    }

    // =========================================================================
    // Layers
    // =========================================================================

    /// Record a layer once it reaches the applied status. Intermediate
    /// statuses are skipped.
    pub async fn apply_layer_status(
        &self,
        event: &LayerStatusEvent,
    ) -> Result<ApplyOutcome, StoreError> {
        if event.status != LAYER_STATUS_APPLIED {
            return Ok(ApplyOutcome::Skipped);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO layers (layer, status)
            VALUES (?, ?)
            ON CONFLICT(layer) DO NOTHING
            "#,
        )
        .bind(i64::from(event.layer))
        .bind(i64::from(event.status))
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() > 0 {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Duplicate
        })
    }

    // =========================================================================
    // Rewards
    // =========================================================================

    /// Insert a reward by its stable id. Only the first insert credits the
    /// coinbase account and the circulating supply.
    pub async fn apply_reward(&self, event: &RewardEvent) -> Result<ApplyOutcome, StoreError> {
        let reward_id = event.stable_id();
        let layer_reward = to_stored("layer_reward", event.layer_reward)?;
        let total_reward = to_stored("total_reward", event.total_reward)?;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO rewards (reward_id, coinbase, node_id, atx_id, layer, layer_reward, total_reward)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(reward_id) DO NOTHING
            "#,
        )
        .bind(&reward_id)
        .bind(&event.coinbase)
        .bind(&event.node_id)
        .bind(&event.atx_id)
        .bind(i64::from(event.layer))
        .bind(layer_reward)
        .bind(total_reward)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if !inserted {
            sqlx::query(
                r#"
                UPDATE rewards
                SET coinbase = ?, node_id = ?, atx_id = ?, layer = ?, layer_reward = ?, total_reward = ?
                WHERE reward_id = ?
                "#,
            )
            .bind(&event.coinbase)
            .bind(&event.node_id)
            .bind(&event.atx_id)
            .bind(i64::from(event.layer))
            .bind(layer_reward)
            .bind(total_reward)
            .bind(&reward_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            debug!(reward_id = %reward_id, "Reward redelivered, counters untouched");
            return Ok(ApplyOutcome::Duplicate);
        }

        sqlx::query(
            r#"
            INSERT INTO accounts (address, balance, total_rewards)
            VALUES (?, ?, ?)
            ON CONFLICT(address) DO UPDATE SET
                balance = balance + excluded.balance,
                total_rewards = total_rewards + excluded.total_rewards
            "#,
        )
        .bind(&event.coinbase)
        .bind(total_reward)
        .bind(total_reward)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO network_info (id, circulating_supply, reward_count)
            VALUES (?, ?, 1)
            ON CONFLICT(id) DO UPDATE SET
                circulating_supply = circulating_supply + excluded.circulating_supply,
                reward_count = reward_count + 1
            "#,
        )
        .bind(NETWORK_INFO_ID)
        .bind(total_reward)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }

    // =========================================================================
    // Activations
    // =========================================================================

    /// Insert an activation by id. Only the first insert adds its contribution
    /// to the epoch totals, appends it to the node record and registers the
    /// coinbase account.
    ///
    /// # Errors
    /// Weight or running-total overflow is fatal.
    pub async fn apply_activation(
        &self,
        event: &ActivationEvent,
    ) -> Result<ApplyOutcome, StoreError> {
        let weight = to_stored(
            "weight",
            atx_weight(event.effective_num_units, event.tick_count)?,
        )?;
        let units = to_stored("effective_num_units", event.effective_num_units)?;
        let base_tick = to_stored("base_tick", event.base_tick)?;
        let tick_count = to_stored("tick_count", event.tick_count)?;
        let sequence = to_stored("sequence", event.sequence)?;
        let epoch = i64::from(event.publish_epoch);

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO activations
            (atx_id, node_id, coinbase, publish_epoch, base_tick, tick_count, effective_num_units, weight, sequence, received)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(atx_id) DO NOTHING
            "#,
        )
        .bind(&event.atx_id)
        .bind(&event.node_id)
        .bind(&event.coinbase)
        .bind(epoch)
        .bind(base_tick)
        .bind(tick_count)
        .bind(units)
        .bind(weight)
        .bind(sequence)
        .bind(event.received)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if !inserted {
            sqlx::query(
                r#"
                UPDATE activations
                SET node_id = ?, coinbase = ?, base_tick = ?, tick_count = ?, sequence = ?, received = ?
                WHERE atx_id = ?
                "#,
            )
            .bind(&event.node_id)
            .bind(&event.coinbase)
            .bind(base_tick)
            .bind(tick_count)
            .bind(sequence)
            .bind(event.received)
            .bind(&event.atx_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            debug!(atx_id = %event.atx_id, "Activation redelivered, totals untouched");
            return Ok(ApplyOutcome::Duplicate);
        }

        add_epoch_contribution(&mut tx, epoch, weight, units).await?;

        sqlx::query("INSERT INTO nodes (node_id) VALUES (?) ON CONFLICT(node_id) DO NOTHING")
            .bind(&event.node_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO node_activations
            (node_id, atx_id, coinbase, publish_epoch, effective_num_units, weight, sequence, received)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(node_id, atx_id) DO NOTHING
            "#,
        )
        .bind(&event.node_id)
        .bind(&event.atx_id)
        .bind(&event.coinbase)
        .bind(epoch)
        .bind(units)
        .bind(weight)
        .bind(sequence)
        .bind(event.received)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO accounts (address) VALUES (?) ON CONFLICT(address) DO NOTHING")
            .bind(&event.coinbase)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO network_info (id, activation_count)
            VALUES (?, 1)
            ON CONFLICT(id) DO UPDATE SET activation_count = activation_count + 1
            "#,
        )
        .bind(NETWORK_INFO_ID)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Insert a pending transaction. An existing document (pending or
    /// complete) is left alone.
    pub async fn apply_transaction_created(
        &self,
        record: &TransactionRecord,
    ) -> Result<ApplyOutcome, StoreError> {
        let row = StoredTransaction::from_record(record)?;

        let result = sqlx::query(
            r#"
            INSERT INTO transactions
            (tx_id, principal, receiver, method, status, layer, gas, gas_price, fee, amount, counter, complete)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(tx_id) DO NOTHING
            "#,
        )
        .bind(&record.tx_id)
        .bind(&record.header.principal)
        .bind(record.receiver())
        .bind(i64::from(record.header.method))
        .bind(i64::from(record.header.status))
        .bind(i64::from(record.header.layer))
        .bind(row.gas)
        .bind(row.gas_price)
        .bind(row.fee)
        .bind(row.amount)
        .bind(row.counter)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() > 0 {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Duplicate
        })
    }

    /// Store the completed transaction and, the first time it completes, move
    /// funds if the transaction was effective.
    ///
    /// # Errors
    /// `InsufficientBalance` when the principal cannot cover `amount + fee`.
    /// The whole group is rolled back and may be retried once funds arrive.
    pub async fn apply_transaction_result(
        &self,
        record: &TransactionRecord,
    ) -> Result<ApplyOutcome, StoreError> {
        let row = StoredTransaction::from_record(record)?;
        let debit = row
            .amount
            .checked_add(row.fee)
            .ok_or(StoreError::ValueOutOfRange {
                field: "amount + fee",
                value: record.amount().saturating_add(record.header.fee),
            })?;

        let mut tx = self.pool.begin().await?;

        // Pending document completed here: first completion.
        let mut first_completion = row
            .replace(&mut tx, record, "AND complete = 0")
            .await?
            > 0;

        if !first_completion {
            // No document at all: first completion.
            first_completion = sqlx::query(
                r#"
                INSERT INTO transactions
                (tx_id, principal, receiver, method, status, layer, gas, gas_price, fee, amount, counter, complete)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
                ON CONFLICT(tx_id) DO NOTHING
                "#,
            )
            .bind(&record.tx_id)
            .bind(&record.header.principal)
            .bind(record.receiver())
            .bind(i64::from(record.header.method))
            .bind(i64::from(record.header.status))
            .bind(i64::from(record.header.layer))
            .bind(row.gas)
            .bind(row.gas_price)
            .bind(row.fee)
            .bind(row.amount)
            .bind(row.counter)
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0;
        }

        if !first_completion {
            // Already complete: re-set the document only.
            row.replace(&mut tx, record, "").await?;
            tx.commit().await?;
            debug!(tx_id = %record.tx_id, "Transaction result redelivered, balances untouched");
            return Ok(ApplyOutcome::Duplicate);
        }

        if record.is_effective() {
            if row.amount > 0 {
                if let Some(receiver) = record.receiver() {
                    sqlx::query(
                        r#"
                        INSERT INTO accounts (address, balance, received)
                        VALUES (?, ?, ?)
                        ON CONFLICT(address) DO UPDATE SET
                            balance = balance + excluded.balance,
                            received = received + excluded.received
                        "#,
                    )
                    .bind(receiver)
                    .bind(row.amount)
                    .bind(row.amount)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            // A missing principal row must read as a zero balance, not a
            // failed guard.
            sqlx::query("INSERT INTO accounts (address) VALUES (?) ON CONFLICT(address) DO NOTHING")
                .bind(&record.header.principal)
                .execute(&mut *tx)
                .await?;

            let debited = sqlx::query(
                r#"
                UPDATE accounts
                SET balance = balance - ?, sent = sent + ?, fees = fees + ?
                WHERE address = ? AND balance >= ?
                "#,
            )
            .bind(debit)
            .bind(row.amount)
            .bind(row.fee)
            .bind(&record.header.principal)
            .bind(debit)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if debited == 0 {
                return Err(StoreError::InsufficientBalance {
                    address: record.header.principal.clone(),
                    debit,
                });
            }
        } else {
            debug!(
                tx_id = %record.tx_id,
                status = record.header.status,
                addresses = record.header.addresses.len(),
                "Ineffective transaction, balances untouched"
            );
        }

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }

    // =========================================================================
    // Malfeasance
    // =========================================================================

    /// Mark a node malfeasant. The earliest proof time wins, so the flag is
    /// independent of arrival order.
    pub async fn apply_malfeasance(
        &self,
        event: &MalfeasanceEvent,
    ) -> Result<ApplyOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut changed = sqlx::query(
            r#"
            UPDATE nodes
            SET malfeasance_received = ?
            WHERE node_id = ? AND (malfeasance_received IS NULL OR malfeasance_received > ?)
            "#,
        )
        .bind(event.received)
        .bind(&event.node_id)
        .bind(event.received)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if !changed {
            changed = sqlx::query(
                r#"
                INSERT INTO nodes (node_id, malfeasance_received)
                VALUES (?, ?)
                ON CONFLICT(node_id) DO NOTHING
                "#,
            )
            .bind(&event.node_id)
            .bind(event.received)
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0;
        }

        tx.commit().await?;
        Ok(if changed {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Duplicate
        })
    }

    // =========================================================================
    // Genesis accounts
    // =========================================================================

    /// Credit a pre-funded genesis account exactly once.
    ///
    /// Returns true if the account was credited by this call.
    pub async fn seed_genesis_account(
        &self,
        address: &str,
        balance: u64,
    ) -> Result<bool, StoreError> {
        let balance = to_stored("balance", balance)?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO genesis_accounts (address, balance) VALUES (?, ?) ON CONFLICT(address) DO NOTHING",
        )
        .bind(address)
        .bind(balance)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            sqlx::query(
                r#"
                INSERT INTO accounts (address, balance)
                VALUES (?, ?)
                ON CONFLICT(address) DO UPDATE SET balance = balance + excluded.balance
                "#,
            )
            .bind(address)
            .bind(balance)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

/// Read the epoch's running totals and store them with one more activation.
async fn add_epoch_contribution(
    tx: &mut Transaction<'_, Sqlite>,
    epoch: i64,
    weight: i64,
    units: i64,
) -> Result<(), StoreError> {
    let current = sqlx::query(
        "SELECT total_weight, total_effective_num_units, total_atx FROM activation_epoch_totals WHERE epoch = ?",
    )
    .bind(epoch)
    .fetch_optional(&mut **tx)
    .await?;

    let (total_weight, total_units, total_atx) = current
        .map(|r| {
            (
                r.get::<i64, _>("total_weight"),
                r.get::<i64, _>("total_effective_num_units"),
                r.get::<i64, _>("total_atx"),
            )
        })
        .unwrap_or((0, 0, 0));

    let total_weight = add_to_total(total_weight, weight)?;
    let total_units = add_to_total(total_units, units)?;
    let total_atx = add_to_total(total_atx, 1)?;

    sqlx::query(
        r#"
        INSERT INTO activation_epoch_totals (epoch, total_weight, total_effective_num_units, total_atx)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(epoch) DO UPDATE SET
            total_weight = excluded.total_weight,
            total_effective_num_units = excluded.total_effective_num_units,
            total_atx = excluded.total_atx
        "#,
    )
    .bind(epoch)
    .bind(total_weight)
    .bind(total_units)
    .bind(total_atx)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Transaction numeric fields converted to their stored form.
struct StoredTransaction {
    gas: i64,
    gas_price: i64,
    fee: i64,
    amount: i64,
    counter: i64,
}

impl StoredTransaction {
    fn from_record(record: &TransactionRecord) -> Result<Self, StoreError> {
        Ok(Self {
            gas: to_stored("gas", record.header.gas)?,
            gas_price: to_stored("gas_price", record.gas_price())?,
            fee: to_stored("fee", record.header.fee)?,
            amount: to_stored("amount", record.amount())?,
            counter: to_stored("counter", record.counter())?,
        })
    }

    /// Overwrite the document as complete. `guard` narrows the WHERE clause.
    async fn replace(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        record: &TransactionRecord,
        guard: &'static str,
    ) -> Result<u64, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE transactions
            SET principal = ?, receiver = ?, method = ?, status = ?, layer = ?, gas = ?,
                gas_price = ?, fee = ?, amount = ?, counter = ?, complete = 1
            WHERE tx_id = ? {}
            "#,
            guard
        );

        let result = sqlx::query(&sql)
            .bind(&record.header.principal)
            .bind(record.receiver())
            .bind(i64::from(record.header.method))
            .bind(i64::from(record.header.status))
            .bind(i64::from(record.header.layer))
            .bind(self.gas)
            .bind(self.gas_price)
            .bind(self.fee)
            .bind(self.amount)
            .bind(self.counter)
            .bind(&record.tx_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use crate::domain::{TransactionHeader, TransactionRecord};
    use crate::domain::event::DecodedBody;

    fn reward(id: &str, coinbase: &str, total: u64) -> RewardEvent {
        RewardEvent {
            reward_id: Some(id.to_string()),
            coinbase: coinbase.to_string(),
            node_id: "n1".to_string(),
            atx_id: "x1".to_string(),
            layer: 10,
            layer_reward: total,
            total_reward: total,
        }
    }

    fn activation(atx_id: &str, units: u64, ticks: u64) -> ActivationEvent {
        ActivationEvent {
            atx_id: atx_id.to_string(),
            node_id: "n1".to_string(),
            coinbase: "A".to_string(),
            publish_epoch: 2,
            base_tick: 100,
            tick_count: ticks,
            effective_num_units: units,
            sequence: 0,
            received: 1_000,
        }
    }

    fn transfer(status: u8, amount: u64, fee: u64) -> TransactionRecord {
        TransactionRecord {
            tx_id: "t1".to_string(),
            header: TransactionHeader {
                principal: "P".to_string(),
                method: 16,
                layer: 5,
                gas: 1,
                fee,
                status,
                addresses: vec!["P".to_string(), "R".to_string()],
            },
            body: Some(DecodedBody {
                receiver: Some("R".to_string()),
                amount,
                counter: 1,
                gas_price: 1,
            }),
        }
    }

    #[tokio::test]
    async fn test_layer_status_only_applied_retained() {
        let (repo, _temp) = setup_test_db().await;

        let pending = LayerStatusEvent { layer: 7, status: 1 };
        assert_eq!(
            repo.apply_layer_status(&pending).await.unwrap(),
            ApplyOutcome::Skipped
        );
        assert_eq!(repo.last_processed_layer().await.unwrap(), None);

        let applied = LayerStatusEvent { layer: 7, status: 3 };
        assert_eq!(
            repo.apply_layer_status(&applied).await.unwrap(),
            ApplyOutcome::Applied
        );
        assert_eq!(
            repo.apply_layer_status(&applied).await.unwrap(),
            ApplyOutcome::Duplicate
        );
        assert_eq!(repo.last_processed_layer().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_reward_credits_once() {
        let (repo, _temp) = setup_test_db().await;

        let event = reward("r1", "A", 1000);
        assert_eq!(repo.apply_reward(&event).await.unwrap(), ApplyOutcome::Applied);
        assert_eq!(repo.apply_reward(&event).await.unwrap(), ApplyOutcome::Duplicate);

        let account = repo.get_account("A").await.unwrap().unwrap();
        assert_eq!(account.total_rewards, 1000);
        assert_eq!(account.balance, 1000);
        assert_eq!(repo.get_network_info().await.unwrap().circulating_supply, 1000);
    }

    #[tokio::test]
    async fn test_activation_adds_to_epoch_once() {
        let (repo, _temp) = setup_test_db().await;

        let event = activation("x1", 10, 5);
        assert_eq!(
            repo.apply_activation(&event).await.unwrap(),
            ApplyOutcome::Applied
        );
        assert_eq!(
            repo.apply_activation(&event).await.unwrap(),
            ApplyOutcome::Duplicate
        );

        let totals = repo.get_epoch_totals(2).await.unwrap().unwrap();
        assert_eq!(totals.total_weight, 50);
        assert_eq!(totals.total_effective_num_units, 10);
        assert_eq!(totals.total_atx, 1);

        let node = repo.get_node("n1").await.unwrap().unwrap();
        assert_eq!(node.activations.len(), 1);
        assert!(repo.get_account("A").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_activation_overflow_is_fatal_and_rolled_back() {
        let (repo, _temp) = setup_test_db().await;

        let err = repo
            .apply_activation(&activation("x2", u64::MAX, 2))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(repo.get_activation("x2").await.unwrap().is_none());
        assert!(repo.get_epoch_totals(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_epoch_total_overflow_rolls_back_insert() {
        let (repo, _temp) = setup_test_db().await;

        let big = activation("x1", 1, i64::MAX as u64);
        repo.apply_activation(&big).await.unwrap();

        let err = repo
            .apply_activation(&activation("x2", 1, 1))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(repo.get_activation("x2").await.unwrap().is_none());
        assert_eq!(
            repo.get_epoch_totals(2).await.unwrap().unwrap().total_atx,
            1
        );
    }

    #[tokio::test]
    async fn test_transaction_result_moves_funds_once() {
        let (repo, _temp) = setup_test_db().await;
        repo.seed_genesis_account("P", 1_000).await.unwrap();

        let record = transfer(0, 100, 5);
        repo.apply_transaction_created(&record).await.unwrap();
        assert_eq!(
            repo.apply_transaction_result(&record).await.unwrap(),
            ApplyOutcome::Applied
        );
        assert_eq!(
            repo.apply_transaction_result(&record).await.unwrap(),
            ApplyOutcome::Duplicate
        );

        let principal = repo.get_account("P").await.unwrap().unwrap();
        assert_eq!(principal.balance, 895);
        assert_eq!(principal.sent, 100);
        assert_eq!(principal.fees, 5);
        let receiver = repo.get_account("R").await.unwrap().unwrap();
        assert_eq!(receiver.balance, 100);
        assert_eq!(receiver.received, 100);
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_balances() {
        let (repo, _temp) = setup_test_db().await;
        repo.seed_genesis_account("P", 1_000).await.unwrap();

        repo.apply_transaction_result(&transfer(1, 100, 5))
            .await
            .unwrap();

        assert_eq!(repo.get_account("P").await.unwrap().unwrap().balance, 1_000);
        assert!(repo.get_account("R").await.unwrap().is_none());
        assert!(repo.get_transaction("t1").await.unwrap().unwrap().complete);
    }

    #[tokio::test]
    async fn test_insufficient_balance_rolls_back() {
        let (repo, _temp) = setup_test_db().await;
        repo.seed_genesis_account("P", 50).await.unwrap();

        let err = repo
            .apply_transaction_result(&transfer(0, 100, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientBalance { .. }));
        assert!(!err.is_fatal());

        assert_eq!(repo.get_account("P").await.unwrap().unwrap().balance, 50);
        assert!(repo.get_account("R").await.unwrap().is_none());
        assert!(repo.get_transaction("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malfeasance_keeps_earliest() {
        let (repo, _temp) = setup_test_db().await;

        let late = MalfeasanceEvent {
            node_id: "n1".to_string(),
            received: 200,
        };
        let early = MalfeasanceEvent {
            node_id: "n1".to_string(),
            received: 100,
        };

        assert_eq!(repo.apply_malfeasance(&late).await.unwrap(), ApplyOutcome::Applied);
        assert_eq!(repo.apply_malfeasance(&early).await.unwrap(), ApplyOutcome::Applied);
        assert_eq!(repo.apply_malfeasance(&late).await.unwrap(), ApplyOutcome::Duplicate);

        let node = repo.get_node("n1").await.unwrap().unwrap();
        assert_eq!(node.malfeasance_received, Some(100));
    }

    #[tokio::test]
    async fn test_genesis_seed_is_idempotent() {
        let (repo, _temp) = setup_test_db().await;

        assert!(repo.seed_genesis_account("G", 500).await.unwrap());
        assert!(!repo.seed_genesis_account("G", 500).await.unwrap());
        assert_eq!(repo.get_account("G").await.unwrap().unwrap().balance, 500);
    }
}
