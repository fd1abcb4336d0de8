//! Device identity and axis value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Serial number of a motor-controller board.
///
/// Reported by the controller itself once attached. Used verbatim in bus
/// subjects, so it is never reformatted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceSerial(String);

impl DeviceSerial {
    /// Creates a new DeviceSerial from a string.
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceSerial {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceSerial {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for DeviceSerial {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Backend-specific location of a controller before it is attached.
///
/// USB controllers use the `usb:<bus>:<address>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Builds a USB address from bus and device numbers.
    pub fn usb(bus: u8, address: u8) -> Self {
        Self(format!("usb:{bus}:{address}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Axis Slots
// ============================================================================

/// One of the two motor-control channels on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisSlot {
    Axis0,
    Axis1,
}

impl AxisSlot {
    /// Every slot, in enumeration order.
    pub const ALL: [AxisSlot; 2] = [AxisSlot::Axis0, AxisSlot::Axis1];

    /// Wire name used in subjects (`axis0`, `axis1`).
    pub fn name(&self) -> &'static str {
        match self {
            AxisSlot::Axis0 => "axis0",
            AxisSlot::Axis1 => "axis1",
        }
    }

    /// Zero-based slot index.
    pub fn index(&self) -> usize {
        match self {
            AxisSlot::Axis0 => 0,
            AxisSlot::Axis1 => 1,
        }
    }

    /// Parses a wire name back into a slot.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "axis0" => Some(AxisSlot::Axis0),
            "axis1" => Some(AxisSlot::Axis1),
            _ => None,
        }
    }
}

impl fmt::Display for AxisSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Axis Lifecycle State
// ============================================================================

/// Vendor code for an idle axis.
pub const AXIS_STATE_IDLE: u32 = 1;

/// Vendor code for an axis running closed-loop control.
pub const AXIS_STATE_CLOSED_LOOP_CONTROL: u32 = 8;

/// Lifecycle state of an axis as reported by the controller.
///
/// Backends translate raw vendor codes into this closed set at the
/// boundary so nothing downstream depends on vendor constants. Every code
/// other than the two the bridge understands is kept as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisState {
    Idle,
    ClosedLoopControl,
    Other(u32),
}

impl AxisState {
    /// Total mapping from a raw vendor state code.
    pub fn from_raw(code: u32) -> Self {
        match code {
            AXIS_STATE_IDLE => AxisState::Idle,
            AXIS_STATE_CLOSED_LOOP_CONTROL => AxisState::ClosedLoopControl,
            other => AxisState::Other(other),
        }
    }

    /// Raw vendor code for this state.
    pub fn raw(&self) -> u32 {
        match self {
            AxisState::Idle => AXIS_STATE_IDLE,
            AxisState::ClosedLoopControl => AXIS_STATE_CLOSED_LOOP_CONTROL,
            AxisState::Other(code) => *code,
        }
    }
}

impl fmt::Display for AxisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisState::Idle => f.write_str("idle"),
            AxisState::ClosedLoopControl => f.write_str("closed-loop-control"),
            AxisState::Other(code) => write!(f, "other({code})"),
        }
    }
}
