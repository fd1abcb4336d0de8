//! Bus Client capability.
//!
//! The bridge talks to the message bus only through [`BusClient`]. Two
//! transports are provided:
//! - [`nats`] - async-nats client for real deployments
//! - [`memory`] - in-process bus that records publishes, for tests
//!
//! A [`BusConnector`] opens a client for an address so the lifecycle can
//! treat connection as its own fallible step.

pub mod memory;
pub mod nats;

pub use memory::{MemoryBus, MemoryConnector, PublishedMessage};
pub use nats::{NatsBus, NatsConnector};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by a bus transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Connecting to the bus server failed
    #[error("Failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// Subscribing to a subject failed
    #[error("Failed to subscribe to {subject}: {reason}")]
    Subscribe { subject: String, reason: String },

    /// Publishing a message failed
    #[error("Failed to publish to {subject}: {reason}")]
    Publish { subject: String, reason: String },

    /// Draining the connection failed
    #[error("Failed to drain connection: {0}")]
    Drain(String),
}

// ============================================================================
// Messages
// ============================================================================

/// A message received on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub subject: String,
    /// Reply subject supplied by the sender, if any
    pub reply: Option<String>,
    pub payload: Bytes,
}

impl InboundMessage {
    /// Reply subject, treating an empty string as absent.
    pub fn reply_subject(&self) -> Option<&str> {
        self.reply.as_deref().filter(|r| !r.is_empty())
    }

    /// Payload as text, with invalid UTF-8 replaced.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Stream of messages for one subscription. Ends when the subscription
/// closes.
pub type Subscription = BoxStream<'static, InboundMessage>;

// ============================================================================
// Capability Traits
// ============================================================================

/// An open bus connection.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Starts receiving messages published to `subject`.
    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError>;

    /// Publishes `payload` to `subject`.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError>;

    /// Flushes pending publishes, stops subscriptions and closes the
    /// connection.
    async fn drain(&self) -> Result<(), BusError>;

    /// Whether the connection is currently up.
    fn is_connected(&self) -> bool;
}

/// Opens bus connections.
#[async_trait]
pub trait BusConnector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Arc<dyn BusClient>, BusError>;
}
