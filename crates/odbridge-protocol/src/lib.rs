//! odbridge protocol - bus subjects and payloads
//!
//! This crate provides the subject naming scheme and the JSON payloads
//! exchanged between the bridge daemon and remote bus clients.

pub mod message;
pub mod subject;

pub use message::{AxisStatus, DiscoveryResponse, MotionInput, PeripheralKind, StatusRecord};
pub use subject::{
    control_subject, discovery_subject, parse_axis_subject, state_subject, AxisSubject,
    SubjectError, SubjectKind, DISCOVERY_SUBJECT,
};
