//! Domain types for the ledger-state indexer.
//!
//! This module provides:
//! - Primitives: LayerId, Epoch, bech32 Address
//! - Ledger events as they arrive from the node, one type per subject
//! - Stored record types returned by the read accessors

pub mod event;
pub mod primitives;
pub mod records;

pub use event::{
    ActivationEvent, DecodedBody, LayerStatusEvent, LedgerEvent, MalfeasanceEvent, RewardEvent,
    Subject, TransactionCreatedEvent, TransactionHeader, TransactionRecord, TransactionResultEvent,
};
pub use primitives::{Address, AddressParseError, Epoch, LayerId};
pub use records::{
    Account, Activation, EpochTotals, LayerRecord, NetworkInfo, Node, NodeActivation, Reward,
    Transaction,
};
