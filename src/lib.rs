pub mod api;
pub mod broker;
pub mod config;
pub mod datasource;
pub mod db;
pub mod decoder;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod state;

pub use broker::{Broker, BrokerError, JetStreamBroker, MemoryBroker};
pub use config::Config;
pub use datasource::{CoinPaprikaSource, DataSourceError, MockPriceSource, PriceSource, XtSource};
pub use db::{init_db, ApplyOutcome, Repository, StoreError};
pub use decoder::{DecodeError, EventDecoder};
pub use domain::{Address, Epoch, LayerId, LedgerEvent, Subject};
pub use error::AppError;
pub use orchestration::{BackgroundTask, EventProcessor, SubscriptionManager};
pub use state::{NetworkSnapshot, NetworkStateCache, PriceQuote, PriceResolver};
