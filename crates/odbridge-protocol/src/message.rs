//! Bus payload types.
//!
//! Payloads are UTF-8 JSON objects. Field order on the wire follows the
//! declaration order of each struct.

use bytes::Bytes;
use odbridge_core::{AxisSlot, AxisState, DeviceSerial};
use serde::{Deserialize, Serialize};

use crate::subject::{control_subject, state_subject};

// ============================================================================
// Telemetry
// ============================================================================

/// Coarse axis status published to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisStatus {
    Idle,
    Active,
    Unknown,
}

impl From<AxisState> for AxisStatus {
    /// Total mapping; any state other than idle or closed-loop control is
    /// reported as unknown.
    fn from(state: AxisState) -> Self {
        match state {
            AxisState::Idle => AxisStatus::Idle,
            AxisState::ClosedLoopControl => AxisStatus::Active,
            AxisState::Other(_) => AxisStatus::Unknown,
        }
    }
}

/// Per-axis telemetry published on the axis' state subject every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub bus_voltage: f64,
    pub enabled: bool,
    pub status: AxisStatus,
    pub temperature: f64,
    pub current_velocity: f64,
    pub velocity_integrator_current: f64,
}

impl StatusRecord {
    /// Encodes the record as a JSON payload.
    pub fn to_payload(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Kind of peripheral a discovery response describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeripheralKind {
    Motion,
}

/// Input a motion peripheral accepts on its control subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionInput {
    Velocity,
}

/// Reply to a discovery request, one per axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    #[serde(rename = "type")]
    pub kind: PeripheralKind,
    pub motion_input: MotionInput,
    /// Subject accepting commands for the axis
    pub control: String,
    /// Subject carrying the axis' telemetry
    pub state: String,
}

impl DiscoveryResponse {
    /// Builds the response advertising one axis of a device.
    pub fn for_axis(serial: &DeviceSerial, axis: AxisSlot) -> Self {
        Self {
            kind: PeripheralKind::Motion,
            motion_input: MotionInput::Velocity,
            control: control_subject(serial, axis),
            state: state_subject(serial, axis),
        }
    }

    /// Encodes the response as a JSON payload.
    pub fn to_payload(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_status_mapping() {
        assert_eq!(AxisStatus::from(AxisState::Idle), AxisStatus::Idle);
        assert_eq!(
            AxisStatus::from(AxisState::ClosedLoopControl),
            AxisStatus::Active
        );
        for code in [0, 2, 3, 7, 9, 11, 255] {
            assert_eq!(
                AxisStatus::from(AxisState::from_raw(code)),
                AxisStatus::Unknown
            );
        }
    }

    #[test]
    fn test_status_record_wire_format() {
        let record = StatusRecord {
            bus_voltage: 24.5,
            enabled: true,
            status: AxisStatus::Active,
            temperature: 31.25,
            current_velocity: -2.0,
            velocity_integrator_current: 0.5,
        };
        let json = String::from_utf8(record.to_payload().unwrap().to_vec()).unwrap();
        assert_eq!(
            json,
            r#"{"bus_voltage":24.5,"enabled":true,"status":"active","temperature":31.25,"current_velocity":-2.0,"velocity_integrator_current":0.5}"#
        );
    }

    #[test]
    fn test_discovery_response_wire_format() {
        let response = DiscoveryResponse::for_axis(&DeviceSerial::new("111"), AxisSlot::Axis0);
        let json = String::from_utf8(response.to_payload().unwrap().to_vec()).unwrap();
        assert_eq!(
            json,
            r#"{"type":"motion","motion_input":"velocity","control":"robot.devices.od111-axis0.control","state":"robot.devices.od111-axis0.state"}"#
        );
    }

    #[test]
    fn test_discovery_response_parses_from_client_json() {
        let json = r#"{"type":"motion","motion_input":"velocity","control":"c","state":"s"}"#;
        let parsed: DiscoveryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind, PeripheralKind::Motion);
        assert_eq!(parsed.control, "c");
    }
}
