//! Control commands.
//!
//! Control messages arrive on per-axis control subjects. Their payload
//! format is not defined yet, so the default handler only records them.
//! Executing commands against the hardware belongs behind
//! [`ControlHandler`].

use async_trait::async_trait;
use odbridge_core::{AxisSlot, DeviceSerial};
use tracing::info;

use crate::bus::InboundMessage;
use crate::registry::Device;

/// Axis a control message is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTarget {
    pub serial: DeviceSerial,
    pub axis: AxisSlot,
}

/// Receives control messages routed to a registered axis.
///
/// Called inline on the bridge task, so an implementation must not block
/// for long: telemetry for every axis waits on it.
#[async_trait]
pub trait ControlHandler: Send + Sync {
    async fn handle(&self, device: &Device, target: &ControlTarget, message: &InboundMessage);
}

/// Logs every control request and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingControlHandler;

#[async_trait]
impl ControlHandler for LoggingControlHandler {
    async fn handle(&self, _device: &Device, target: &ControlTarget, message: &InboundMessage) {
        info!(
            serial = %target.serial,
            axis = %target.axis,
            subject = %message.subject,
            reply = message.reply.as_deref().unwrap_or(""),
            payload = %message.payload_text(),
            "Control request received"
        );
    }
}
