//! Device Backend capability.
//!
//! The bridge never talks to controller hardware directly. A backend
//! adapter (USB, UART, simulated) implements these traits and translates
//! vendor values into the types in [`crate::device`].
//!
//! # Contract
//!
//! * `scan` lists candidate controllers without opening them.
//! * `attach` opens one candidate and returns a live handle that stays
//!   open for the lifetime of the process.
//! * Every accessor on [`DeviceHandle`] performs a fresh read. A failed
//!   read is returned to the caller and never retried here.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{AxisSlot, AxisState, BackendResult, DeviceAddress, DeviceSerial};

/// Live connection to one attached controller board.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    /// Serial number reported by the board at attach time.
    fn serial_number(&self) -> &DeviceSerial;

    /// DC bus voltage of the board, in volts.
    async fn bus_voltage(&self) -> BackendResult<f64>;

    /// Current lifecycle state of the axis.
    async fn lifecycle_state(&self, axis: AxisSlot) -> BackendResult<AxisState>;

    /// Whether the axis motor is armed.
    async fn armed_state(&self, axis: AxisSlot) -> BackendResult<bool>;

    /// Inverter temperature of the axis motor, in degrees Celsius.
    async fn temperature(&self, axis: AxisSlot) -> BackendResult<f64>;

    /// Velocity setpoint of the axis controller.
    async fn velocity_setpoint(&self, axis: AxisSlot) -> BackendResult<f64>;

    /// Velocity integrator accumulator of the axis controller.
    async fn velocity_integrator_current(&self, axis: AxisSlot) -> BackendResult<f64>;
}

/// Source of attachable controllers.
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Lists the addresses of candidate controllers.
    async fn scan(&self) -> BackendResult<Vec<DeviceAddress>>;

    /// Attaches the controller at `address`.
    async fn attach(&self, address: &DeviceAddress) -> BackendResult<Arc<dyn DeviceHandle>>;
}
