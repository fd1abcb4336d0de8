//! Device registry - controllers attached at startup.
//!
//! Enumeration happens once, in two phases: the backend scans for
//! candidate addresses, then each candidate is attached on its own. A
//! candidate that fails to attach is skipped so the rest still come up.
//! The registry is never modified after enumeration.

use std::sync::Arc;

use odbridge_core::{AxisSlot, DeviceAddress, DeviceBackend, DeviceHandle, DeviceSerial};
use tracing::{debug, info, warn};

// ============================================================================
// Device
// ============================================================================

/// One attached controller board.
#[derive(Clone)]
pub struct Device {
    serial: DeviceSerial,
    address: DeviceAddress,
    handle: Arc<dyn DeviceHandle>,
}

impl Device {
    pub fn new(address: DeviceAddress, handle: Arc<dyn DeviceHandle>) -> Self {
        Self {
            serial: handle.serial_number().clone(),
            address,
            handle,
        }
    }

    pub fn serial(&self) -> &DeviceSerial {
        &self.serial
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Live backend handle, held for the lifetime of the process.
    pub fn handle(&self) -> &dyn DeviceHandle {
        self.handle.as_ref()
    }

    /// The two axes of the board, in slot order.
    pub fn axes(&self) -> [AxisSlot; 2] {
        AxisSlot::ALL
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("serial", &self.serial)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Enumeration Result
// ============================================================================

/// Outcome counters of an enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumerationResult {
    /// Number of devices attached
    pub attached: u32,
    /// Number of candidates that failed to attach
    pub failed: u32,
}

// ============================================================================
// Device Registry
// ============================================================================

/// Write-once set of attached devices, in attach order.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    /// Builds a registry from already attached devices.
    #[must_use]
    pub fn from_devices(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    /// Scans the backend and attaches every candidate it reports.
    ///
    /// Never fails: a failed scan yields an empty registry and a failed
    /// attach skips that candidate. Both are logged.
    pub async fn enumerate(backend: &dyn DeviceBackend) -> (Self, EnumerationResult) {
        let mut result = EnumerationResult::default();

        let candidates = match backend.scan().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Device scan failed, continuing with no devices");
                return (Self::default(), result);
            }
        };

        info!(candidates = candidates.len(), "Found candidate devices");

        let mut devices = Vec::with_capacity(candidates.len());
        for address in candidates {
            debug!(address = %address, "Attaching device");
            match backend.attach(&address).await {
                Ok(handle) => {
                    let device = Device::new(address, handle);
                    info!(
                        serial = %device.serial(),
                        address = %device.address(),
                        "Attached device"
                    );
                    devices.push(device);
                    result.attached += 1;
                }
                Err(e) => {
                    warn!(address = %address, error = %e, "Failed to attach device, skipping");
                    result.failed += 1;
                }
            }
        }

        info!(
            attached = result.attached,
            failed = result.failed,
            "Device enumeration complete"
        );

        (Self { devices }, result)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Every (device, axis) pair, devices in registry order then axes in
    /// slot order.
    pub fn iter_axes(&self) -> impl Iterator<Item = (&Device, AxisSlot)> + '_ {
        self.devices
            .iter()
            .flat_map(|device| device.axes().into_iter().map(move |axis| (device, axis)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odbridge_core::{SimBackend, SimDevice};

    #[tokio::test]
    async fn test_enumerate_attaches_all_candidates() {
        let backend = SimBackend::from_serials(["111", "222"]);
        let (registry, result) = DeviceRegistry::enumerate(&backend).await;

        assert_eq!(result, EnumerationResult { attached: 2, failed: 0 });
        let serials: Vec<_> = registry.devices().iter().map(|d| d.serial().as_str()).collect();
        assert_eq!(serials, vec!["111", "222"]);
    }

    #[tokio::test]
    async fn test_enumerate_skips_failed_attach() {
        let backend = SimBackend::new(vec![
            SimDevice::new("111"),
            SimDevice::new("bad").unattachable(),
            SimDevice::new("333"),
        ]);
        let (registry, result) = DeviceRegistry::enumerate(&backend).await;

        assert_eq!(result, EnumerationResult { attached: 2, failed: 1 });
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.devices()[1].serial().as_str(), "333");
        assert_eq!(registry.devices()[1].address(), &SimBackend::address(3));
    }

    #[tokio::test]
    async fn test_enumerate_scan_failure_is_empty() {
        let backend = SimBackend::failing_scan("no usb");
        let (registry, result) = DeviceRegistry::enumerate(&backend).await;

        assert!(registry.is_empty());
        assert_eq!(result, EnumerationResult::default());
    }

    #[tokio::test]
    async fn test_enumerate_many_devices_keeps_serials_unique() {
        let backend = SimBackend::from_serials((1..=300).map(|n| n.to_string()));
        let (registry, result) = DeviceRegistry::enumerate(&backend).await;

        assert_eq!(result.attached, 300);
        let serials: std::collections::HashSet<_> =
            registry.devices().iter().map(|d| d.serial().clone()).collect();
        assert_eq!(serials.len(), 300);
    }

    #[tokio::test]
    async fn test_iter_axes_order() {
        let backend = SimBackend::from_serials(["111", "222"]);
        let (registry, _) = DeviceRegistry::enumerate(&backend).await;

        let pairs: Vec<_> = registry
            .iter_axes()
            .map(|(d, a)| format!("{}-{}", d.serial(), a))
            .collect();
        assert_eq!(
            pairs,
            vec!["111-axis0", "111-axis1", "222-axis0", "222-axis1"]
        );
    }
}
