//! Subscription manager: one durable pull worker per subject.
//!
//! Each worker fetches a bounded batch, fans it out over a bounded pool and
//! waits for the whole batch before fetching again. Workers share nothing but
//! the store, so a stalled subject never blocks the others.

use super::processor::EventProcessor;
use super::task::BackgroundTask;
use crate::broker::{Broker, BrokerError, Subscription};
use crate::domain::Subject;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Pause after a failed fetch before trying again.
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionConfig {
    pub batch_size: usize,
    pub fetch_wait: Duration,
    pub concurrency: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            fetch_wait: Duration::from_secs(5),
            concurrency: 4,
        }
    }
}

pub struct SubscriptionManager {
    broker: Arc<dyn Broker>,
    processor: EventProcessor,
    config: SubscriptionConfig,
}

impl SubscriptionManager {
    pub fn new(
        broker: Arc<dyn Broker>,
        processor: EventProcessor,
        config: SubscriptionConfig,
    ) -> Self {
        Self {
            broker,
            processor,
            config,
        }
    }

    /// Open a durable consumer for every subject and spawn its worker.
    ///
    /// # Errors
    /// Fails if any consumer cannot be created. Workers already spawned are
    /// stopped before returning.
    pub async fn start(&self, subjects: &[Subject]) -> Result<BackgroundTask, BrokerError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(subjects.len());

        for &subject in subjects {
            let subscription = match self.broker.subscribe(subject).await {
                Ok(s) => s,
                Err(e) => {
                    BackgroundTask::new("subscriptions", shutdown_tx, handles)
                        .stop()
                        .await;
                    return Err(e);
                }
            };

            handles.push(tokio::spawn(run_worker(
                subject,
                subscription,
                self.processor.clone(),
                self.config,
                shutdown_rx.clone(),
            )));
        }

        info!(subjects = subjects.len(), "Subscription workers started");
        Ok(BackgroundTask::new("subscriptions", shutdown_tx, handles))
    }
}

async fn run_worker(
    subject: Subject,
    mut subscription: Box<dyn Subscription>,
    processor: EventProcessor,
    config: SubscriptionConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(subject = %subject, "Worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let fetched = tokio::select! {
            result = subscription.fetch(config.batch_size, config.fetch_wait) => result,
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        };

        let batch = match fetched {
            Ok(batch) => batch,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Fetch failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(FETCH_RETRY_DELAY) => {}
                    _ = shutdown_rx.changed() => {}
                }
                continue;
            }
        };

        if batch.is_empty() {
            continue;
        }

        let size = batch.len();
        // The batch always runs to completion, even once shutdown is signalled.
        stream::iter(batch)
            .for_each_concurrent(config.concurrency.max(1), |delivery| {
                let processor = processor.clone();
                async move {
                    processor.handle(delivery).await;
                }
            })
            .await;
        debug!(subject = %subject, size, "Batch settled");
    }

    info!(subject = %subject, "Worker stopped");
}
