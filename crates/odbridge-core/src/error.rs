//! Device backend error types following panic-free policy.

use crate::{AxisSlot, DeviceAddress, DeviceSerial};
use thiserror::Error;

/// Errors raised across the Device Backend boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Scanning the host for candidate controllers failed
    #[error("Device scan failed: {0}")]
    ScanFailed(String),

    /// A candidate controller could not be attached
    #[error("Failed to attach device at {address}: {reason}")]
    AttachFailed {
        address: DeviceAddress,
        reason: String,
    },

    /// Reading a live value from an attached controller failed
    #[error("Read of {field} on {serial}-{axis} failed: {reason}")]
    ReadFailed {
        serial: DeviceSerial,
        axis: AxisSlot,
        field: &'static str,
        reason: String,
    },

    /// Reading a board-level value (not tied to an axis) failed
    #[error("Read of {field} on {serial} failed: {reason}")]
    DeviceReadFailed {
        serial: DeviceSerial,
        field: &'static str,
        reason: String,
    },

    /// The controller is no longer reachable
    #[error("Device {0} disconnected")]
    Disconnected(DeviceSerial),
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
