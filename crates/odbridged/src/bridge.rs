//! Bridge loop - subscriptions and periodic telemetry.
//!
//! The loop runs as a single task. Discovery requests, control messages
//! and telemetry sweeps are handled one at a time, each to completion, so
//! none of them ever overlap.
//!
//! # States
//!
//! ```text
//!            subscribe all
//!   start ─────────────────▶ Waiting ◀───────────┐
//!                              │  │               │ sweep done,
//!              inbound message │  │ interval      │ timer re-armed
//!              (handled inline)│  ▼ elapsed       │
//!                              │ Publishing ──────┘
//!                              │
//!                   cancelled  ▼
//!                            Stopped
//! ```
//!
//! The interval is measured from the end of the previous sweep, not
//! aligned to the wall clock.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Sampling and publish failures are isolated per axis
//! - Only failing to subscribe at startup ends the loop with an error

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{select_all, StreamExt};
use odbridge_protocol::{
    control_subject, parse_axis_subject, state_subject, DiscoveryResponse, SubjectKind,
    DISCOVERY_SUBJECT,
};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{BusClient, BusError, InboundMessage, Subscription};
use crate::control::{ControlHandler, ControlTarget, LoggingControlHandler};
use crate::registry::DeviceRegistry;
use crate::sampler::sample;

// ============================================================================
// Constants
// ============================================================================

/// Default time between the end of one telemetry sweep and the next.
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// Error Types
// ============================================================================

/// Errors that stop the bridge loop.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A startup subscription could not be made
    #[error("Bridge setup failed: {0}")]
    Subscribe(#[from] BusError),
}

// ============================================================================
// Sweep Report
// ============================================================================

/// Outcome of one telemetry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Status records published
    pub published: u32,
    /// Axes skipped because sampling, encoding or publishing failed
    pub failed: u32,
}

// ============================================================================
// Bridge Loop
// ============================================================================

/// Ties the device registry to the bus.
pub struct BridgeLoop {
    registry: DeviceRegistry,
    bus: Arc<dyn BusClient>,
    control: Arc<dyn ControlHandler>,
    interval: Duration,
}

impl BridgeLoop {
    /// Creates a loop publishing every [`PUBLISH_INTERVAL`] and logging
    /// control requests.
    pub fn new(registry: DeviceRegistry, bus: Arc<dyn BusClient>) -> Self {
        Self {
            registry,
            bus,
            control: Arc::new(LoggingControlHandler),
            interval: PUBLISH_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replaces the handler that receives control messages.
    #[must_use]
    pub fn with_control_handler(mut self, control: Arc<dyn ControlHandler>) -> Self {
        self.control = control;
        self
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs until `cancel` fires.
    ///
    /// Subscribes to the discovery subject and to every axis' control
    /// subject, then alternates between handling inbound messages and
    /// publishing telemetry sweeps. Returns an error only if a
    /// subscription cannot be made.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BridgeError> {
        let mut inbound = self.subscribe_all().await?;
        let mut inbound_open = true;

        info!(
            devices = self.registry.len(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Bridge loop started"
        );

        let timer = tokio::time::sleep(self.interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Bridge loop shutting down");
                    break;
                }

                // Before inbound: a backlog of messages must not delay a sweep
                () = &mut timer => {
                    let report = self.publish_sweep(&cancel).await;
                    debug!(
                        published = report.published,
                        failed = report.failed,
                        "Telemetry sweep complete"
                    );
                    timer.as_mut().reset(Instant::now() + self.interval);
                }

                message = inbound.next(), if inbound_open => {
                    match message {
                        Some(message) => self.dispatch(&message).await,
                        None => {
                            warn!("All bus subscriptions closed, continuing with telemetry only");
                            inbound_open = false;
                        }
                    }
                }
            }
        }

        debug!("Bridge loop completed");
        Ok(())
    }

    /// Subscribes to discovery and to every control subject, merged into
    /// one stream.
    async fn subscribe_all(&self) -> Result<Subscription, BridgeError> {
        let mut subscriptions = Vec::with_capacity(1 + self.registry.len() * 2);

        subscriptions.push(self.bus.subscribe(DISCOVERY_SUBJECT).await?);
        debug!(subject = DISCOVERY_SUBJECT, "Listening for discovery requests");

        for (device, axis) in self.registry.iter_axes() {
            let subject = control_subject(device.serial(), axis);
            subscriptions.push(self.bus.subscribe(&subject).await?);
            debug!(subject = %subject, "Listening for control requests");
        }

        Ok(select_all(subscriptions).boxed())
    }

    async fn dispatch(&self, message: &InboundMessage) {
        if message.subject == DISCOVERY_SUBJECT {
            self.handle_discovery(message).await;
        } else {
            self.handle_control(message).await;
        }
    }

    /// Answers a discovery request with one response per axis, sent to
    /// the request's reply subject.
    ///
    /// A request without a reply subject is logged as an error and
    /// dropped. Returns the number of responses published.
    pub async fn handle_discovery(&self, message: &InboundMessage) -> usize {
        info!(
            subject = %message.subject,
            reply = message.reply.as_deref().unwrap_or(""),
            body = %message.payload_text(),
            "Discovery request received"
        );

        let Some(reply) = message.reply_subject() else {
            error!(
                subject = %message.subject,
                "Discovery request has no reply subject, dropping"
            );
            return 0;
        };

        let mut sent = 0;
        for (device, axis) in self.registry.iter_axes() {
            let response = DiscoveryResponse::for_axis(device.serial(), axis);
            let payload = match response.to_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(serial = %device.serial(), axis = %axis, error = %e, "Failed to encode discovery response");
                    continue;
                }
            };

            debug!(
                reply = %reply,
                payload = %String::from_utf8_lossy(&payload),
                "Publishing discovery response"
            );

            match self.bus.publish(reply, payload).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(serial = %device.serial(), axis = %axis, error = %e, "Failed to send discovery response");
                }
            }
        }
        sent
    }

    /// Routes a control message to the control handler.
    ///
    /// Messages on subjects that do not name a registered axis' control
    /// subject are logged and ignored.
    pub async fn handle_control(&self, message: &InboundMessage) {
        let parsed = match parse_axis_subject(&message.subject) {
            Ok(parsed) if parsed.kind == SubjectKind::Control => parsed,
            Ok(parsed) => {
                warn!(subject = %message.subject, kind = %parsed.kind, "Ignoring message on non-control subject");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Ignoring message on unrecognised subject");
                return;
            }
        };

        let Some(device) = self
            .registry
            .devices()
            .iter()
            .find(|d| d.serial() == &parsed.serial)
        else {
            warn!(
                subject = %message.subject,
                serial = %parsed.serial,
                "Ignoring control request for unknown device"
            );
            return;
        };

        let target = ControlTarget {
            serial: parsed.serial,
            axis: parsed.axis,
        };
        self.control.handle(device, &target, message).await;
    }

    /// Samples every axis and publishes its status record on the axis'
    /// state subject, in registry then slot order.
    ///
    /// A failure on one axis is logged and does not stop the others.
    /// Cancellation is checked before each axis; records already published
    /// stay published.
    pub async fn publish_sweep(&self, cancel: &CancellationToken) -> SweepReport {
        let mut report = SweepReport::default();

        for (device, axis) in self.registry.iter_axes() {
            if cancel.is_cancelled() {
                debug!("Telemetry sweep interrupted by shutdown");
                break;
            }

            let record = match sample(device, axis).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(serial = %device.serial(), axis = %axis, error = %e, "Failed to sample axis");
                    report.failed += 1;
                    continue;
                }
            };

            let payload = match record.to_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(serial = %device.serial(), axis = %axis, error = %e, "Failed to encode status record");
                    report.failed += 1;
                    continue;
                }
            };

            let subject = state_subject(device.serial(), axis);
            debug!(
                subject = %subject,
                payload = %String::from_utf8_lossy(&payload),
                "Publishing status"
            );

            match self.bus.publish(&subject, payload).await {
                Ok(()) => report.published += 1,
                Err(e) => {
                    warn!(subject = %subject, error = %e, "Failed to publish status");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
