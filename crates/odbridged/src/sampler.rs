//! Telemetry sampler.
//!
//! Reads the live values of one axis and maps them into a [`StatusRecord`].
//! Backend read failures are returned to the caller as-is; nothing is
//! retried here.

use odbridge_core::{AxisSlot, BackendError};
use odbridge_protocol::{AxisStatus, StatusRecord};
use thiserror::Error;

use crate::registry::Device;

/// Errors from sampling an axis.
#[derive(Debug, Error)]
pub enum SampleError {
    /// A backend read failed
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Samples `axis` of `device` into a fresh status record.
pub async fn sample(device: &Device, axis: AxisSlot) -> Result<StatusRecord, SampleError> {
    let handle = device.handle();

    let bus_voltage = handle.bus_voltage().await?;
    let state = handle.lifecycle_state(axis).await?;
    let enabled = handle.armed_state(axis).await?;
    let temperature = handle.temperature(axis).await?;
    let current_velocity = handle.velocity_setpoint(axis).await?;
    let velocity_integrator_current = handle.velocity_integrator_current(axis).await?;

    Ok(StatusRecord {
        bus_voltage,
        enabled,
        status: AxisStatus::from(state),
        temperature,
        current_velocity,
        velocity_integrator_current,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use odbridge_core::{AxisState, DeviceBackend, SimAxis, SimBackend, SimDevice};

    async fn attach(backend: &SimBackend) -> Device {
        let address = SimBackend::address(1);
        let handle = backend.attach(&address).await.unwrap();
        Device::new(address, handle)
    }

    #[tokio::test]
    async fn test_sample_maps_live_values() {
        let backend = SimBackend::new(vec![SimDevice::new("111")
            .with_bus_voltage(23.5)
            .with_axis(
                AxisSlot::Axis1,
                SimAxis {
                    state: AxisState::ClosedLoopControl,
                    armed: true,
                    temperature: 41.0,
                    velocity_setpoint: 3.0,
                    velocity_integrator_current: 0.25,
                    faulted: false,
                },
            )]);
        let device = attach(&backend).await;

        let record = sample(&device, AxisSlot::Axis1).await.unwrap();
        assert_eq!(
            record,
            StatusRecord {
                bus_voltage: 23.5,
                enabled: true,
                status: AxisStatus::Active,
                temperature: 41.0,
                current_velocity: 3.0,
                velocity_integrator_current: 0.25,
            }
        );

        let idle = sample(&device, AxisSlot::Axis0).await.unwrap();
        assert_eq!(idle.status, AxisStatus::Idle);
        assert!(!idle.enabled);
    }

    #[tokio::test]
    async fn test_sample_unknown_state_does_not_fail() {
        let backend = SimBackend::from_serials(["111"]);
        let device = attach(&backend).await;
        backend
            .update_axis(device.serial(), AxisSlot::Axis0, |a| {
                a.state = AxisState::from_raw(3);
            })
            .await;

        let record = sample(&device, AxisSlot::Axis0).await.unwrap();
        assert_eq!(record.status, AxisStatus::Unknown);
    }

    #[tokio::test]
    async fn test_sample_propagates_read_failure() {
        let backend = SimBackend::from_serials(["111"]);
        let device = attach(&backend).await;
        backend
            .update_axis(device.serial(), AxisSlot::Axis1, |a| a.faulted = true)
            .await;

        let err = sample(&device, AxisSlot::Axis1).await.unwrap_err();
        assert!(matches!(
            err,
            SampleError::Backend(BackendError::ReadFailed { .. })
        ));
        assert!(sample(&device, AxisSlot::Axis0).await.is_ok());
    }
}
