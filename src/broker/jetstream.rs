//! NATS JetStream broker.

use super::{AckHandle, Broker, BrokerError, Delivery, Subscription};
use crate::domain::Subject;
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, DeliverPolicy, PullConsumer},
    AckKind,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// JetStream broker. One durable pull consumer per subject, explicit ack.
#[derive(Clone)]
pub struct JetStreamBroker {
    context: jetstream::Context,
}

impl fmt::Debug for JetStreamBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JetStreamBroker").finish_non_exhaustive()
    }
}

impl JetStreamBroker {
    /// Connect to the NATS server at `url`.
    ///
    /// # Errors
    /// Returns `BrokerError::Connection` if the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        info!(url = %url, "Connected to NATS");
        Ok(Self {
            context: jetstream::new(client),
        })
    }
}

#[async_trait]
impl Broker for JetStreamBroker {
    async fn subscribe(&self, subject: Subject) -> Result<Box<dyn Subscription>, BrokerError> {
        let consumer_err = |e: String| BrokerError::Consumer {
            subject: subject.to_string(),
            message: e,
        };

        let stream = self
            .context
            .get_stream(subject.stream())
            .await
            .map_err(|e| consumer_err(e.to_string()))?;

        let durable = subject.durable_name();
        let consumer: PullConsumer = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    filter_subject: subject.as_str().to_string(),
                    ack_policy: AckPolicy::Explicit,
                    deliver_policy: DeliverPolicy::Last,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| consumer_err(e.to_string()))?;

        info!(subject = %subject, consumer = %durable, "Durable consumer ready");
        Ok(Box::new(JetStreamSubscription { consumer }))
    }
}

struct JetStreamSubscription {
    consumer: PullConsumer,
}

#[async_trait]
impl Subscription for JetStreamSubscription {
    async fn fetch(
        &mut self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(wait)
            .messages()
            .await
            .map_err(|e| BrokerError::Fetch(e.to_string()))?;

        let mut deliveries = Vec::with_capacity(max_messages);
        while let Some(message) = batch.next().await {
            let message = message.map_err(|e| BrokerError::Fetch(e.to_string()))?;
            let delivered = message
                .info()
                .map(|info| info.delivered.max(1) as u64)
                .unwrap_or(1);

            deliveries.push(Delivery {
                subject: message.subject.to_string(),
                payload: message.payload.to_vec(),
                delivered,
                handle: Box::new(JetStreamAck { message }),
            });
        }

        debug!(count = deliveries.len(), "Fetched batch");
        Ok(deliveries)
    }
}

struct JetStreamAck {
    message: jetstream::Message,
}

#[async_trait]
impl AckHandle for JetStreamAck {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.message
            .ack()
            .await
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }

    async fn nak(&self) -> Result<(), BrokerError> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }

    async fn term(&self) -> Result<(), BrokerError> {
        self.message
            .ack_with(AckKind::Term)
            .await
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }
}
