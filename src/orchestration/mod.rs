//! Ingestion orchestration: subscription workers, per-message processing,
//! genesis seeding.

pub mod genesis;
pub mod processor;
pub mod subscription;
pub mod task;

pub use genesis::{seed_from_file, GenesisError};
pub use processor::{Disposition, EventProcessor, ProcessError};
pub use subscription::{SubscriptionConfig, SubscriptionManager};
pub use task::BackgroundTask;
