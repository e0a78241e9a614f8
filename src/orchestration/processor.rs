//! Per-message processing: decode, apply, settle with the broker.

use crate::broker::Delivery;
use crate::db::{ApplyOutcome, Repository, StoreError};
use crate::decoder::{DecodeError, EventDecoder};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Nak,
    Term,
}

impl ProcessError {
    /// Decode and transient store failures are redelivered. Domain invariant
    /// violations are terminated.
    pub fn disposition(&self) -> Disposition {
        match self {
            ProcessError::Decode(_) => Disposition::Nak,
            ProcessError::Store(e) if e.is_fatal() => Disposition::Term,
            ProcessError::Store(_) => Disposition::Nak,
        }
    }
}

/// Decodes and applies deliveries against the aggregate store.
#[derive(Debug, Clone)]
pub struct EventProcessor {
    decoder: EventDecoder,
    repo: Arc<Repository>,
    poison_threshold: u64,
}

impl EventProcessor {
    pub fn new(decoder: EventDecoder, repo: Arc<Repository>, poison_threshold: u64) -> Self {
        Self {
            decoder,
            repo,
            poison_threshold,
        }
    }

    /// Decode `payload` received on `subject` and apply it.
    pub async fn process(&self, subject: &str, payload: &[u8]) -> Result<ApplyOutcome, ProcessError> {
        let event = self.decoder.decode_named(subject, payload)?;
        let outcome = self.repo.apply_event(&event).await?;
        debug!(
            subject = %subject,
            key = %event.dedup_key(),
            outcome = ?outcome,
            "Event processed"
        );
        Ok(outcome)
    }

    /// Process one delivery and settle it. The message is acknowledged only
    /// after the mutation group has committed.
    pub async fn handle(&self, delivery: Delivery) -> Disposition {
        let disposition = match self.process(&delivery.subject, &delivery.payload).await {
            Ok(_) => Disposition::Ack,
            Err(e) => {
                let disposition = e.disposition();
                match disposition {
                    Disposition::Term => error!(
                        subject = %delivery.subject,
                        delivered = delivery.delivered,
                        error = %e,
                        "Domain invariant violated, terminating message"
                    ),
                    _ if delivery.delivered >= self.poison_threshold => error!(
                        subject = %delivery.subject,
                        delivered = delivery.delivered,
                        error = %e,
                        "Suspected poison message, redelivering"
                    ),
                    _ => warn!(
                        subject = %delivery.subject,
                        delivered = delivery.delivered,
                        error = %e,
                        "Processing failed, redelivering"
                    ),
                }
                disposition
            }
        };

        let settled = match disposition {
            Disposition::Ack => delivery.handle.ack().await,
            Disposition::Nak => delivery.handle.nak().await,
            Disposition::Term => delivery.handle.term().await,
        };
        if let Err(e) = settled {
            // The broker redelivers unsettled messages after its ack wait.
            warn!(subject = %delivery.subject, error = %e, "Failed to settle message");
        }

        disposition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Broker, MemoryBroker};
    use crate::db::repo::test_support::setup_test_db;
    use crate::domain::Subject;
    use crate::engine::WeightError;
    use std::time::Duration;

    #[test]
    fn test_disposition_mapping() {
        let decode = ProcessError::from(DecodeError::TransactionBody("bad".to_string()));
        assert_eq!(decode.disposition(), Disposition::Nak);

        let fatal = ProcessError::from(StoreError::from(WeightError::Overflow {
            num_units: u64::MAX,
            tick_count: 2,
        }));
        assert_eq!(fatal.disposition(), Disposition::Term);

        let transient = ProcessError::from(StoreError::InsufficientBalance {
            address: "A".to_string(),
            debit: 5,
        });
        assert_eq!(transient.disposition(), Disposition::Nak);
    }

    #[tokio::test]
    async fn test_handle_settles_by_outcome() {
        let (repo, _temp) = setup_test_db().await;
        let processor = EventProcessor::new(EventDecoder::new("sm"), Arc::new(repo), 3);
        let broker = MemoryBroker::new();

        broker.publish(Subject::Layers, br#"{"layer": 1, "status": 3}"#.to_vec());
        broker.publish(Subject::Layers, b"garbage".to_vec());
        let mut sub = broker.subscribe(Subject::Layers).await.unwrap();

        let mut batch = sub.fetch(10, Duration::from_millis(10)).await.unwrap();
        let bad = batch.pop().unwrap();
        let good = batch.pop().unwrap();

        assert_eq!(processor.handle(good).await, Disposition::Ack);
        assert_eq!(processor.handle(bad).await, Disposition::Nak);
        assert_eq!(broker.pending(Subject::Layers), 1);
    }
}
