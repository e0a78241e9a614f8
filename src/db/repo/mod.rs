//! Repository layer for the aggregate store.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by direction:
//! - `ingest.rs` - Per-event mutation groups applied by the ingestion workers
//! - `query.rs` - Read accessors used by the query service and the state cache

mod ingest;
mod query;

use crate::engine::WeightError;
use sqlx::sqlite::SqlitePool;
use thiserror::Error;

pub use query::{RewardFilter, RewardOwner, TransactionFilter};

/// Key of the `network_info` singleton row.
pub const NETWORK_INFO_ID: &str = "info";

/// Outcome of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// First application: all side effects committed.
    Applied,
    /// Redelivery of an already-applied event: document re-set, no counters touched.
    Duplicate,
    /// Event deliberately not retained.
    Skipped,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Weight(#[from] WeightError),
    #[error("{field} value {value} does not fit a stored integer")]
    ValueOutOfRange { field: &'static str, value: u64 },
    #[error("insufficient balance on {address} for debit of {debit}")]
    InsufficientBalance { address: String, debit: i64 },
}

impl StoreError {
    /// Domain invariant violations. Retrying can never succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Weight(_) | StoreError::ValueOutOfRange { .. }
        )
    }
}

/// Sort direction for list accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Offset/limit window for list accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
    pub sort: SortOrder,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
            sort: SortOrder::Asc,
        }
    }
}

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool once all outstanding operations have completed.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_stored(field: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::ValueOutOfRange { field, value })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let overflow = StoreError::from(WeightError::Overflow {
            num_units: u64::MAX,
            tick_count: 2,
        });
        assert!(overflow.is_fatal());
        assert!(StoreError::ValueOutOfRange {
            field: "amount",
            value: u64::MAX
        }
        .is_fatal());
        assert!(!StoreError::InsufficientBalance {
            address: "A".to_string(),
            debit: 1
        }
        .is_fatal());
        assert!(!StoreError::Db(sqlx::Error::PoolTimedOut).is_fatal());
    }

    #[test]
    fn test_to_stored_bounds() {
        assert_eq!(to_stored("amount", 5).unwrap(), 5);
        assert!(to_stored("amount", u64::MAX).is_err());
    }
}
