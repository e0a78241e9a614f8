//! Message broker abstraction: durable pull subscriptions with explicit
//! acknowledgement.

use crate::domain::Subject;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod jetstream;
pub mod memory;

pub use jetstream::JetStreamBroker;
pub use memory::{AckCounts, MemoryBroker};

/// Broker that hands out one durable pull subscription per subject.
#[async_trait]
pub trait Broker: Send + Sync + fmt::Debug {
    /// Open (creating if needed) the durable consumer for `subject`.
    async fn subscribe(&self, subject: Subject) -> Result<Box<dyn Subscription>, BrokerError>;
}

/// A durable pull consumer.
#[async_trait]
pub trait Subscription: Send {
    /// Fetch up to `max_messages`, waiting at most `wait` for the first one.
    ///
    /// An empty batch is not an error.
    async fn fetch(
        &mut self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<Delivery>, BrokerError>;
}

/// Settles one delivery with the broker.
#[async_trait]
pub trait AckHandle: Send + Sync {
    /// Processing succeeded: never redeliver.
    async fn ack(&self) -> Result<(), BrokerError>;
    /// Processing failed transiently: redeliver.
    async fn nak(&self) -> Result<(), BrokerError>;
    /// Processing can never succeed: stop redelivering.
    async fn term(&self) -> Result<(), BrokerError>;
}

/// One message handed to a worker.
pub struct Delivery {
    pub subject: String,
    pub payload: Vec<u8>,
    /// Number of times this message has been delivered, starting at 1.
    pub delivered: u64,
    pub handle: Box<dyn AckHandle>,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("subject", &self.subject)
            .field("payload_len", &self.payload.len())
            .field("delivered", &self.delivered)
            .finish()
    }
}

#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(String),
    #[error("consumer setup failed for {subject}: {message}")]
    Consumer { subject: String, message: String },
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("acknowledgement failed: {0}")]
    Ack(String),
}
