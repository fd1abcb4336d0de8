//! odbridge core - shared device types for the ODrive bus bridge
//!
//! This crate provides the domain types shared between the daemon
//! (odbridged) and the wire protocol crate, plus the Device Backend
//! capability that hardware adapters implement.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod backend;
pub mod device;
pub mod error;

#[cfg(feature = "sim")]
pub mod sim;

// Re-exports for convenience
pub use backend::{DeviceBackend, DeviceHandle};
pub use device::{AxisSlot, AxisState, DeviceAddress, DeviceSerial};
pub use error::{BackendError, BackendResult};

#[cfg(feature = "sim")]
pub use sim::{SimAxis, SimBackend, SimDevice};
