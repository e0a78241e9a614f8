//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer: idempotent mutation groups and read accessors

pub mod migrations;
pub mod repo;

pub use migrations::{init_db, init_db_with};
pub use repo::{
    ApplyOutcome, Page, Repository, RewardFilter, RewardOwner, SortOrder, StoreError,
    TransactionFilter,
};
