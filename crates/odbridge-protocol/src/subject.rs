//! Subject naming.
//!
//! Subjects are derived from (serial, axis) every time they are needed and
//! are never stored:
//!
//! ```text
//! robot.devices.discovery
//! robot.devices.od<serial>-<axis>.control
//! robot.devices.od<serial>-<axis>.state
//! ```

use std::fmt;

use odbridge_core::{AxisSlot, DeviceSerial};
use thiserror::Error;

/// Root of every subject the bridge uses.
const SUBJECT_ROOT: &str = "robot.devices";

/// Prefix placed before the serial number in per-axis subjects.
const DEVICE_PREFIX: &str = "od";

/// Subject on which clients ask which devices exist.
pub const DISCOVERY_SUBJECT: &str = "robot.devices.discovery";

/// Kind of per-axis subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    /// Commands from clients to the axis
    Control,
    /// Telemetry from the axis to clients
    State,
}

impl SubjectKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            SubjectKind::Control => "control",
            SubjectKind::State => "state",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "control" => Some(SubjectKind::Control),
            "state" => Some(SubjectKind::State),
            _ => None,
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// The discovery subject.
pub fn discovery_subject() -> &'static str {
    DISCOVERY_SUBJECT
}

/// Subject a client publishes commands for `axis` to.
pub fn control_subject(serial: &DeviceSerial, axis: AxisSlot) -> String {
    axis_subject(serial, axis, SubjectKind::Control)
}

/// Subject the bridge publishes telemetry for `axis` on.
pub fn state_subject(serial: &DeviceSerial, axis: AxisSlot) -> String {
    axis_subject(serial, axis, SubjectKind::State)
}

fn axis_subject(serial: &DeviceSerial, axis: AxisSlot, kind: SubjectKind) -> String {
    format!("{SUBJECT_ROOT}.{DEVICE_PREFIX}{serial}-{axis}.{kind}")
}

/// A per-axis subject broken back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisSubject {
    pub serial: DeviceSerial,
    pub axis: AxisSlot,
    pub kind: SubjectKind,
}

/// Errors from parsing a subject string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubjectError {
    #[error("Subject {0} is not under robot.devices")]
    ForeignRoot(String),

    #[error("Subject {0} has no od<serial>-<axis> segment")]
    MissingDevice(String),

    #[error("Subject {subject} names unknown axis {axis}")]
    UnknownAxis { subject: String, axis: String },

    #[error("Subject {subject} has unknown kind {kind}")]
    UnknownKind { subject: String, kind: String },
}

/// Parses a control or state subject.
///
/// Serial numbers may themselves contain `-`, so the axis is taken from
/// the last `-` in the device segment.
pub fn parse_axis_subject(subject: &str) -> Result<AxisSubject, SubjectError> {
    let rest = subject
        .strip_prefix(SUBJECT_ROOT)
        .and_then(|r| r.strip_prefix('.'))
        .ok_or_else(|| SubjectError::ForeignRoot(subject.to_string()))?;

    let (device, kind) = rest
        .rsplit_once('.')
        .ok_or_else(|| SubjectError::MissingDevice(subject.to_string()))?;

    let kind = SubjectKind::from_suffix(kind).ok_or_else(|| SubjectError::UnknownKind {
        subject: subject.to_string(),
        kind: kind.to_string(),
    })?;

    let (serial, axis_name) = device
        .strip_prefix(DEVICE_PREFIX)
        .and_then(|d| d.rsplit_once('-'))
        .filter(|(serial, _)| !serial.is_empty() && !serial.contains('.'))
        .ok_or_else(|| SubjectError::MissingDevice(subject.to_string()))?;

    let axis = AxisSlot::from_name(axis_name).ok_or_else(|| SubjectError::UnknownAxis {
        subject: subject.to_string(),
        axis: axis_name.to_string(),
    })?;

    Ok(AxisSubject {
        serial: DeviceSerial::new(serial),
        axis,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_subject() {
        assert_eq!(discovery_subject(), "robot.devices.discovery");
    }

    #[test]
    fn test_axis_subjects_are_bit_exact() {
        let serial = DeviceSerial::new("111");
        assert_eq!(
            control_subject(&serial, AxisSlot::Axis0),
            "robot.devices.od111-axis0.control"
        );
        assert_eq!(
            state_subject(&serial, AxisSlot::Axis1),
            "robot.devices.od111-axis1.state"
        );
    }

    #[test]
    fn test_state_and_control_differ_only_in_suffix() {
        for serial in ["111", "2061377C3548", "a-b"] {
            let serial = DeviceSerial::new(serial);
            for axis in AxisSlot::ALL {
                let state = state_subject(&serial, axis);
                let control = control_subject(&serial, axis);
                assert_eq!(state.replace(".state", ".control"), control);
            }
        }
    }

    #[test]
    fn test_parse_control_subject() {
        let parsed = parse_axis_subject("robot.devices.od222-axis1.control").unwrap();
        assert_eq!(parsed.serial.as_str(), "222");
        assert_eq!(parsed.axis, AxisSlot::Axis1);
        assert_eq!(parsed.kind, SubjectKind::Control);
    }

    #[test]
    fn test_parse_serial_containing_dash() {
        let serial = DeviceSerial::new("a-b");
        let subject = state_subject(&serial, AxisSlot::Axis0);
        let parsed = parse_axis_subject(&subject).unwrap();
        assert_eq!(parsed.serial, serial);
        assert_eq!(parsed.kind, SubjectKind::State);
    }

    #[test]
    fn test_parse_rejects_malformed_subjects() {
        assert!(matches!(
            parse_axis_subject("robot.other.od1-axis0.state"),
            Err(SubjectError::ForeignRoot(_))
        ));
        assert!(matches!(
            parse_axis_subject("robot.devices.discovery"),
            Err(SubjectError::MissingDevice(_))
        ));
        assert!(matches!(
            parse_axis_subject("robot.devices.od1-axis0.status"),
            Err(SubjectError::UnknownKind { .. })
        ));
        assert!(matches!(
            parse_axis_subject("robot.devices.od1-axis2.state"),
            Err(SubjectError::UnknownAxis { .. })
        ));
        assert!(matches!(
            parse_axis_subject("robot.devices.xx1-axis0.state"),
            Err(SubjectError::MissingDevice(_))
        ));
        assert!(matches!(
            parse_axis_subject("robot.devices.od-axis0.state"),
            Err(SubjectError::MissingDevice(_))
        ));
    }
}
