//! Lifecycle controller - startup, run and shutdown sequencing.
//!
//! ```text
//! enumerate devices ─▶ connect bus ─▶ spawn bridge loop ─▶ await loop ─▶ drain bus
//!                          │
//!                          └─ failure: fatal, the loop never starts
//! ```
//!
//! Enumeration and connection are attempted once each. After the bridge
//! loop has been started the bus is always drained on the way out, however
//! the loop ended, provided the connection is still up.
//!
//! Termination signals reach the loop through the shared
//! [`CancellationToken`]; see [`spawn_signal_listener`].

use std::io;
use std::sync::Arc;

use odbridge_core::DeviceBackend;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bridge::{BridgeError, BridgeLoop};
use crate::bus::{BusClient, BusConnector, BusError};
use crate::config::BridgeConfig;
use crate::control::ControlHandler;
use crate::registry::{DeviceRegistry, EnumerationResult};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that end a run of the daemon.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The bus could not be reached at startup
    #[error("Cannot start without a bus connection: {0}")]
    Connect(#[source] BusError),

    /// The bridge loop could not set up its subscriptions
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The bridge task panicked or was aborted
    #[error("Bridge task ended abnormally: {0}")]
    Task(String),
}

/// What happened during a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub enumeration: EnumerationResult,
    /// Whether the bus connection was drained on shutdown
    pub drained: bool,
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Runs the bridge from device enumeration to bus drain.
pub struct Lifecycle {
    config: BridgeConfig,
    control: Option<Arc<dyn ControlHandler>>,
}

impl Lifecycle {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            control: None,
        }
    }

    /// Routes control messages to `control` instead of only logging them.
    #[must_use]
    pub fn with_control_handler(mut self, control: Arc<dyn ControlHandler>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Runs one full lifecycle and returns once `cancel` has stopped the
    /// bridge loop and the bus has been drained.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Connect`] without starting the loop if the
    /// bus cannot be reached. Loop failures are returned after the drain.
    pub async fn run(
        &self,
        backend: &dyn DeviceBackend,
        connector: &dyn BusConnector,
        cancel: CancellationToken,
    ) -> Result<RunReport, LifecycleError> {
        let (registry, enumeration) = DeviceRegistry::enumerate(backend).await;
        if registry.is_empty() {
            warn!("No devices attached, discovery requests will get no responses");
        }

        let bus = match connector.connect(&self.config.bus_address).await {
            Ok(bus) => bus,
            Err(e) => {
                error!(address = %self.config.bus_address, error = %e, "Failed to connect to bus");
                return Err(LifecycleError::Connect(e));
            }
        };
        info!(address = %self.config.bus_address, "Connected to bus");

        let mut bridge = BridgeLoop::new(registry, Arc::clone(&bus))
            .with_interval(self.config.publish_interval);
        if let Some(control) = &self.control {
            bridge = bridge.with_control_handler(Arc::clone(control));
        }

        let loop_token = cancel.clone();
        let task = tokio::spawn(async move { bridge.run(loop_token).await });

        let outcome = match task.await {
            Ok(Ok(())) => {
                info!("Bridge loop stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Bridge loop failed");
                Err(LifecycleError::Bridge(e))
            }
            Err(e) => {
                error!(error = %e, "Bridge task ended abnormally");
                Err(LifecycleError::Task(e.to_string()))
            }
        };

        let drained = drain_bus(bus.as_ref()).await;

        outcome.map(|()| RunReport {
            enumeration,
            drained,
        })
    }
}

/// Drains the bus if it is still connected. Returns whether a drain
/// completed.
async fn drain_bus(bus: &dyn BusClient) -> bool {
    if !bus.is_connected() {
        info!("Bus already disconnected, skipping drain");
        return false;
    }

    match bus.drain().await {
        Ok(()) => {
            info!("Bus connection drained");
            true
        }
        Err(e) => {
            warn!(error = %e, "Failed to drain bus connection");
            false
        }
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Spawns a task that cancels `token` on SIGTERM or SIGINT (Ctrl+C on
/// non-Unix targets).
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = wait_for_shutdown_signal() => {
                if let Err(e) = result {
                    error!(error = %e, "Error waiting for shutdown signal");
                }
                info!("Shutdown signal received");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_listener_exits_when_token_cancelled() {
        let token = CancellationToken::new();
        let listener = spawn_signal_listener(token.clone());
        token.cancel();
        assert!(listener.await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_skipped_when_disconnected() {
        let bus = crate::bus::MemoryBus::new();
        bus.set_connected(false);
        assert!(!drain_bus(bus.as_ref()).await);
        assert_eq!(bus.drain_count(), 0);
    }
}
