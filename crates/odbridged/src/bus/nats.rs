//! NATS transport.

use std::sync::Arc;

use async_nats::connection::State;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tracing::debug;

use super::{BusClient, BusConnector, BusError, InboundMessage, Subscription};

/// Bus client backed by an async-nats connection.
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BusClient for NatsBus {
    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| BusError::Subscribe {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;

        debug!(subject = %subject, "Subscribed");

        Ok(subscriber
            .map(|message| InboundMessage {
                subject: message.subject.to_string(),
                reply: message.reply.map(|r| r.to_string()),
                payload: message.payload,
            })
            .boxed())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| BusError::Publish {
                subject: subject.to_string(),
                reason: e.to_string(),
            })
    }

    async fn drain(&self) -> Result<(), BusError> {
        self.client
            .drain()
            .await
            .map_err(|e| BusError::Drain(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.client.connection_state() == State::Connected
    }
}

/// Opens [`NatsBus`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct NatsConnector;

#[async_trait]
impl BusConnector for NatsConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn BusClient>, BusError> {
        let client = async_nats::connect(address)
            .await
            .map_err(|e| BusError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Arc::new(NatsBus::new(client)))
    }
}
