//! In-process broker: per-subject queues with redelivery on nak.
//!
//! Used by tests and for running without a NATS server.

use super::{AckHandle, Broker, BrokerError, Delivery, Subscription};
use crate::domain::Subject;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Settlement counters across all subjects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckCounts {
    pub acked: u64,
    pub naked: u64,
    pub termed: u64,
}

#[derive(Debug)]
struct Queued {
    payload: Vec<u8>,
    delivered: u64,
}

#[derive(Default)]
struct Inner {
    queues: Mutex<HashMap<Subject, VecDeque<Queued>>>,
    counts: Mutex<AckCounts>,
    notify: Notify,
}

impl Inner {
    fn enqueue(&self, subject: Subject, item: Queued) {
        self.queues.lock().entry(subject).or_default().push_back(item);
        self.notify.notify_waiters();
    }

    fn take(&self, subject: Subject, max: usize) -> Vec<Queued> {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(&subject) else {
            return Vec::new();
        };
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }
}

/// In-memory broker. Cloning shares the queues.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("counts", &self.counts())
            .finish_non_exhaustive()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message on `subject` for first delivery.
    pub fn publish(&self, subject: Subject, payload: impl Into<Vec<u8>>) {
        self.inner.enqueue(
            subject,
            Queued {
                payload: payload.into(),
                delivered: 0,
            },
        );
    }

    /// Messages waiting (including redeliveries) on `subject`.
    pub fn pending(&self, subject: Subject) -> usize {
        self.inner
            .queues
            .lock()
            .get(&subject)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn counts(&self) -> AckCounts {
        *self.inner.counts.lock()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn subscribe(&self, subject: Subject) -> Result<Box<dyn Subscription>, BrokerError> {
        Ok(Box::new(MemorySubscription {
            subject,
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemorySubscription {
    subject: Subject,
    inner: Arc<Inner>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn fetch(
        &mut self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let mut items = self.inner.take(self.subject, max_messages);
        if items.is_empty() {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking so a concurrent publish is not lost.
            notified.as_mut().enable();
            items = self.inner.take(self.subject, max_messages);
            if items.is_empty() {
                let _ = tokio::time::timeout(wait, notified).await;
                items = self.inner.take(self.subject, max_messages);
            }
        }

        Ok(items
            .into_iter()
            .map(|item| {
                let delivered = item.delivered + 1;
                Delivery {
                    subject: self.subject.as_str().to_string(),
                    payload: item.payload.clone(),
                    delivered,
                    handle: Box::new(MemoryAck {
                        subject: self.subject,
                        payload: item.payload,
                        delivered,
                        inner: Arc::clone(&self.inner),
                        settled: Mutex::new(false),
                    }),
                }
            })
            .collect())
    }
}

struct MemoryAck {
    subject: Subject,
    payload: Vec<u8>,
    delivered: u64,
    inner: Arc<Inner>,
    settled: Mutex<bool>,
}

impl MemoryAck {
    /// Mark settled; false if it already was.
    fn settle(&self) -> bool {
        let mut settled = self.settled.lock();
        !std::mem::replace(&mut *settled, true)
    }
}

#[async_trait]
impl AckHandle for MemoryAck {
    async fn ack(&self) -> Result<(), BrokerError> {
        if self.settle() {
            self.inner.counts.lock().acked += 1;
        }
        Ok(())
    }

    async fn nak(&self) -> Result<(), BrokerError> {
        if self.settle() {
            self.inner.counts.lock().naked += 1;
            self.inner.enqueue(
                self.subject,
                Queued {
                    payload: self.payload.clone(),
                    delivered: self.delivered,
                },
            );
        }
        Ok(())
    }

    async fn term(&self) -> Result<(), BrokerError> {
        if self.settle() {
            self.inner.counts.lock().termed += 1;
        }
        Ok(())
    }
}
