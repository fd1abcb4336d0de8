//! Simulated Device Backend.
//!
//! Provides in-process controllers so the bridge can run and be tested on
//! any host without hardware attached. Simulated values can be changed
//! while the bridge is running, and individual axes can be faulted to
//! exercise read-failure paths.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    AxisSlot, AxisState, BackendError, BackendResult, DeviceAddress, DeviceBackend, DeviceHandle,
    DeviceSerial,
};

/// Simulated state of one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SimAxis {
    pub state: AxisState,
    pub armed: bool,
    pub temperature: f64,
    pub velocity_setpoint: f64,
    pub velocity_integrator_current: f64,
    /// When set, every read on this axis fails
    pub faulted: bool,
}

impl Default for SimAxis {
    fn default() -> Self {
        Self {
            state: AxisState::Idle,
            armed: false,
            temperature: 25.0,
            velocity_setpoint: 0.0,
            velocity_integrator_current: 0.0,
            faulted: false,
        }
    }
}

/// Simulated controller board.
#[derive(Debug, Clone, PartialEq)]
pub struct SimDevice {
    pub serial: DeviceSerial,
    pub bus_voltage: f64,
    pub axes: [SimAxis; 2],
    /// When false, attaching this board fails
    pub attachable: bool,
}

impl SimDevice {
    /// Creates an idle 24V board with the given serial number.
    pub fn new(serial: impl Into<DeviceSerial>) -> Self {
        Self {
            serial: serial.into(),
            bus_voltage: 24.0,
            axes: [SimAxis::default(), SimAxis::default()],
            attachable: true,
        }
    }

    /// Replaces the state of one axis.
    #[must_use]
    pub fn with_axis(mut self, slot: AxisSlot, axis: SimAxis) -> Self {
        if let Some(target) = self.axes.get_mut(slot.index()) {
            *target = axis;
        }
        self
    }

    #[must_use]
    pub fn with_bus_voltage(mut self, volts: f64) -> Self {
        self.bus_voltage = volts;
        self
    }

    /// Marks the board as failing to attach.
    #[must_use]
    pub fn unattachable(mut self) -> Self {
        self.attachable = false;
        self
    }

    fn axis(&self, slot: AxisSlot) -> Option<&SimAxis> {
        self.axes.get(slot.index())
    }
}

/// Backend serving a fixed set of simulated boards.
///
/// Boards appear at `sim:<n>` addresses, numbered from 1 in the order
/// given.
#[derive(Debug, Default)]
pub struct SimBackend {
    boards: Vec<(DeviceAddress, Arc<RwLock<SimDevice>>)>,
    scan_error: Option<String>,
}

impl SimBackend {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        let boards = devices
            .into_iter()
            .enumerate()
            .map(|(i, device)| (Self::address(i + 1), Arc::new(RwLock::new(device))))
            .collect();

        Self {
            boards,
            scan_error: None,
        }
    }

    /// Address of the `n`th board, counting from 1.
    pub fn address(n: usize) -> DeviceAddress {
        DeviceAddress::new(format!("sim:{n}"))
    }

    /// Creates idle boards for each serial number.
    pub fn from_serials<I, S>(serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DeviceSerial>,
    {
        Self::new(serials.into_iter().map(SimDevice::new).collect())
    }

    /// Creates a backend whose scan always fails.
    pub fn failing_scan(reason: impl Into<String>) -> Self {
        Self {
            boards: Vec::new(),
            scan_error: Some(reason.into()),
        }
    }

    /// Applies `update` to one axis of a live board.
    ///
    /// Returns false if no board has the given serial number.
    pub async fn update_axis<F>(&self, serial: &DeviceSerial, slot: AxisSlot, update: F) -> bool
    where
        F: FnOnce(&mut SimAxis),
    {
        for (_, board) in &self.boards {
            let mut device = board.write().await;
            if &device.serial == serial {
                if let Some(axis) = device.axes.get_mut(slot.index()) {
                    update(axis);
                    return true;
                }
            }
        }
        false
    }
}

#[async_trait]
impl DeviceBackend for SimBackend {
    async fn scan(&self) -> BackendResult<Vec<DeviceAddress>> {
        if let Some(reason) = &self.scan_error {
            return Err(BackendError::ScanFailed(reason.clone()));
        }
        Ok(self.boards.iter().map(|(address, _)| address.clone()).collect())
    }

    async fn attach(&self, address: &DeviceAddress) -> BackendResult<Arc<dyn DeviceHandle>> {
        let Some((_, board)) = self.boards.iter().find(|(a, _)| a == address) else {
            return Err(BackendError::AttachFailed {
                address: address.clone(),
                reason: "no simulated device at this address".to_string(),
            });
        };

        let device = board.read().await;
        if !device.attachable {
            return Err(BackendError::AttachFailed {
                address: address.clone(),
                reason: "simulated attach failure".to_string(),
            });
        }

        debug!(address = %address, serial = %device.serial, "Attached simulated device");

        Ok(Arc::new(SimHandle {
            serial: device.serial.clone(),
            board: Arc::clone(board),
        }))
    }
}

/// Handle onto a simulated board.
struct SimHandle {
    serial: DeviceSerial,
    board: Arc<RwLock<SimDevice>>,
}

impl SimHandle {
    async fn read_axis<T>(
        &self,
        slot: AxisSlot,
        field: &'static str,
        read: impl FnOnce(&SimAxis) -> T,
    ) -> BackendResult<T> {
        let device = self.board.read().await;
        let fail = |reason: &str| BackendError::ReadFailed {
            serial: self.serial.clone(),
            axis: slot,
            field,
            reason: reason.to_string(),
        };

        match device.axis(slot) {
            Some(axis) if axis.faulted => Err(fail("simulated axis fault")),
            Some(axis) => Ok(read(axis)),
            None => Err(fail("no such axis")),
        }
    }
}

#[async_trait]
impl DeviceHandle for SimHandle {
    fn serial_number(&self) -> &DeviceSerial {
        &self.serial
    }

    async fn bus_voltage(&self) -> BackendResult<f64> {
        Ok(self.board.read().await.bus_voltage)
    }

    async fn lifecycle_state(&self, axis: AxisSlot) -> BackendResult<AxisState> {
        self.read_axis(axis, "current_state", |a| a.state).await
    }

    async fn armed_state(&self, axis: AxisSlot) -> BackendResult<bool> {
        self.read_axis(axis, "armed_state", |a| a.armed).await
    }

    async fn temperature(&self, axis: AxisSlot) -> BackendResult<f64> {
        self.read_axis(axis, "inverter_temp", |a| a.temperature).await
    }

    async fn velocity_setpoint(&self, axis: AxisSlot) -> BackendResult<f64> {
        self.read_axis(axis, "vel_setpoint", |a| a.velocity_setpoint).await
    }

    async fn velocity_integrator_current(&self, axis: AxisSlot) -> BackendResult<f64> {
        self.read_axis(axis, "vel_integrator_current", |a| {
            a.velocity_integrator_current
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_lists_boards_in_order() {
        let backend = SimBackend::from_serials(["111", "222"]);
        let addresses = backend.scan().await.unwrap();
        assert_eq!(
            addresses,
            vec![SimBackend::address(1), SimBackend::address(2)]
        );
    }

    #[tokio::test]
    async fn test_failing_scan() {
        let backend = SimBackend::failing_scan("libusb unavailable");
        let err = backend.scan().await.unwrap_err();
        assert!(matches!(err, BackendError::ScanFailed(_)));
    }

    #[tokio::test]
    async fn test_attach_reports_serial() {
        let backend = SimBackend::from_serials(["111"]);
        let handle = backend.attach(&SimBackend::address(1)).await.unwrap();
        assert_eq!(handle.serial_number().as_str(), "111");
        assert_eq!(handle.bus_voltage().await.unwrap(), 24.0);
    }

    #[tokio::test]
    async fn test_attach_unknown_or_unattachable_fails() {
        let backend = SimBackend::new(vec![SimDevice::new("111").unattachable()]);
        assert!(backend.attach(&SimBackend::address(1)).await.is_err());
        assert!(backend.attach(&DeviceAddress::usb(1, 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_axis_is_visible_through_handle() {
        let backend = SimBackend::from_serials(["111"]);
        let handle = backend.attach(&SimBackend::address(1)).await.unwrap();

        let serial = DeviceSerial::new("111");
        assert!(
            backend
                .update_axis(&serial, AxisSlot::Axis1, |axis| {
                    axis.state = AxisState::ClosedLoopControl;
                    axis.velocity_setpoint = 4.5;
                })
                .await
        );

        assert_eq!(
            handle.lifecycle_state(AxisSlot::Axis1).await.unwrap(),
            AxisState::ClosedLoopControl
        );
        assert_eq!(handle.velocity_setpoint(AxisSlot::Axis1).await.unwrap(), 4.5);
        assert_eq!(
            handle.lifecycle_state(AxisSlot::Axis0).await.unwrap(),
            AxisState::Idle
        );
    }

    #[tokio::test]
    async fn test_faulted_axis_reads_fail() {
        let device = SimDevice::new("111").with_axis(
            AxisSlot::Axis0,
            SimAxis {
                faulted: true,
                ..SimAxis::default()
            },
        );
        let backend = SimBackend::new(vec![device]);
        let handle = backend.attach(&SimBackend::address(1)).await.unwrap();

        let err = handle.temperature(AxisSlot::Axis0).await.unwrap_err();
        assert!(matches!(err, BackendError::ReadFailed { axis: AxisSlot::Axis0, .. }));
        assert!(handle.temperature(AxisSlot::Axis1).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_axis_unknown_serial() {
        let backend = SimBackend::from_serials(["111"]);
        let updated = backend
            .update_axis(&DeviceSerial::new("999"), AxisSlot::Axis0, |a| a.armed = true)
            .await;
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_large_backend_addresses_are_distinct() {
        let serials: Vec<String> = (0..300).map(|n| format!("SN{n}")).collect();
        let backend = SimBackend::from_serials(serials);

        let addresses = backend.scan().await.unwrap();
        let unique: std::collections::HashSet<_> = addresses.iter().collect();
        assert_eq!(unique.len(), 300);

        let last = backend.attach(&addresses[299]).await.unwrap();
        assert_eq!(last.serial_number().as_str(), "SN299");
    }
}
