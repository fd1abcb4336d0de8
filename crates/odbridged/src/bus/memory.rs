//! In-process bus.
//!
//! Records every publish and lets callers inject inbound messages onto
//! subscribed subjects. Subjects match exactly; there are no wildcards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use tokio::sync::Mutex;

use super::{BusClient, BusConnector, BusError, InboundMessage, Subscription};

/// A message published through a [`MemoryBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

impl PublishedMessage {
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Default)]
struct MemoryState {
    subscribers: HashMap<String, Vec<UnboundedSender<InboundMessage>>>,
    published: Vec<PublishedMessage>,
    failing_subjects: Vec<String>,
}

/// In-memory [`BusClient`].
pub struct MemoryBus {
    state: Mutex<MemoryState>,
    connected: AtomicBool,
    drains: AtomicUsize,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            connected: AtomicBool::new(true),
            drains: AtomicUsize::new(0),
        }
    }
}

impl MemoryBus {
    /// Creates a connected bus.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delivers a message to every live subscription on `subject`.
    ///
    /// Returns the number of subscriptions it was delivered to.
    pub async fn inject(&self, subject: &str, reply: Option<&str>, payload: impl Into<Bytes>) -> usize {
        let message = InboundMessage {
            subject: subject.to_string(),
            reply: reply.map(str::to_string),
            payload: payload.into(),
        };

        let mut state = self.state.lock().await;
        let Some(senders) = state.subscribers.get_mut(subject) else {
            return 0;
        };
        senders.retain(|tx| tx.unbounded_send(message.clone()).is_ok());
        senders.len()
    }

    /// Every message published so far, in publish order.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().await.published.clone()
    }

    /// Messages published to one subject, in publish order.
    pub async fn published_to(&self, subject: &str) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .await
            .published
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Subjects with at least one live subscription, sorted.
    pub async fn subscribed_subjects(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut subjects: Vec<String> = state
            .subscribers
            .iter()
            .filter(|(_, senders)| senders.iter().any(|tx| !tx.is_closed()))
            .map(|(subject, _)| subject.clone())
            .collect();
        subjects.sort();
        subjects
    }

    /// Makes every later publish to `subject` fail.
    pub async fn fail_publishes_to(&self, subject: &str) {
        self.state
            .lock()
            .await
            .failing_subjects
            .push(subject.to_string());
    }

    /// Ends every open subscription stream.
    pub async fn close_subscriptions(&self) {
        self.state.lock().await.subscribers.clear();
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Number of times [`BusClient::drain`] has been called.
    pub fn drain_count(&self) -> usize {
        self.drains.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusClient for MemoryBus {
    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError> {
        if !self.is_connected() {
            return Err(BusError::Subscribe {
                subject: subject.to_string(),
                reason: "not connected".to_string(),
            });
        }

        let (tx, rx) = unbounded();
        self.state
            .lock()
            .await
            .subscribers
            .entry(subject.to_string())
            .or_default()
            .push(tx);
        Ok(rx.boxed())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        if !self.is_connected() || state.failing_subjects.iter().any(|s| s == subject) {
            return Err(BusError::Publish {
                subject: subject.to_string(),
                reason: "rejected by memory bus".to_string(),
            });
        }
        state.published.push(PublishedMessage {
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }

    async fn drain(&self) -> Result<(), BusError> {
        self.drains.fetch_add(1, Ordering::SeqCst);
        self.state.lock().await.subscribers.clear();
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Hands out a shared [`MemoryBus`], or refuses to connect.
pub struct MemoryConnector {
    bus: Arc<MemoryBus>,
    refuse: Option<String>,
    addresses: Mutex<Vec<String>>,
}

impl MemoryConnector {
    pub fn new(bus: Arc<MemoryBus>) -> Self {
        Self {
            bus,
            refuse: None,
            addresses: Mutex::new(Vec::new()),
        }
    }

    /// A connector whose every connect attempt fails with `reason`.
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            bus: MemoryBus::new(),
            refuse: Some(reason.into()),
            addresses: Mutex::new(Vec::new()),
        }
    }

    /// Addresses passed to `connect`, in call order.
    pub async fn connect_attempts(&self) -> Vec<String> {
        self.addresses.lock().await.clone()
    }
}

#[async_trait]
impl BusConnector for MemoryConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn BusClient>, BusError> {
        self.addresses.lock().await.push(address.to_string());
        if let Some(reason) = &self.refuse {
            return Err(BusError::Connect {
                address: address.to_string(),
                reason: reason.clone(),
            });
        }
        let bus: Arc<dyn BusClient> = self.bus.clone();
        Ok(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inject_reaches_subscriber() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("a.b").await.unwrap();

        assert_eq!(bus.inject("a.b", Some("reply.1"), "hi").await, 1);
        assert_eq!(bus.inject("a.c", None, "ignored").await, 0);

        let message = sub.next().await.unwrap();
        assert_eq!(message.reply_subject(), Some("reply.1"));
        assert_eq!(message.payload_text(), "hi");
    }

    #[tokio::test]
    async fn test_publish_is_recorded_in_order() {
        let bus = MemoryBus::new();
        bus.publish("x", Bytes::from_static(b"1")).await.unwrap();
        bus.publish("y", Bytes::from_static(b"2")).await.unwrap();
        bus.publish("x", Bytes::from_static(b"3")).await.unwrap();

        let texts: Vec<_> = bus.published_to("x").await.iter().map(|m| m.payload_text()).collect();
        assert_eq!(texts, vec!["1", "3"]);
        assert_eq!(bus.published().await.len(), 3);
    }

    #[tokio::test]
    async fn test_failing_subject_rejects_publish() {
        let bus = MemoryBus::new();
        bus.fail_publishes_to("bad").await;
        assert!(bus.publish("bad", Bytes::new()).await.is_err());
        assert!(bus.publish("good", Bytes::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_closes_subscriptions() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("a").await.unwrap();
        bus.drain().await.unwrap();

        assert!(sub.next().await.is_none());
        assert!(!bus.is_connected());
        assert_eq!(bus.drain_count(), 1);
    }

    #[tokio::test]
    async fn test_refusing_connector() {
        let connector = MemoryConnector::refusing("connection refused");
        let err = connector.connect("nats://127.0.0.1:4222").await.err().unwrap();
        assert!(matches!(err, BusError::Connect { .. }));
        assert_eq!(connector.connect_attempts().await, vec!["nats://127.0.0.1:4222"]);
    }

    #[test]
    fn test_empty_reply_is_absent() {
        let message = InboundMessage {
            subject: "s".to_string(),
            reply: Some(String::new()),
            payload: Bytes::new(),
        };
        assert_eq!(message.reply_subject(), None);
    }
}
