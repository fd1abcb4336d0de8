//! odbridge daemon - bridges ODrive controllers onto a NATS bus
//!
//! Attaches every controller found at startup, answers discovery requests,
//! logs control requests and publishes per-axis telemetry every interval
//! until stopped.
//!
//! # Usage
//!
//! ```bash
//! # Connect to the default server (nats://127.0.0.1:4222)
//! odbridged
//!
//! # Connect to another server
//! odbridged --nats nats://10.0.0.5:4222
//!
//! # Run against two simulated controllers
//! ODBRIDGE_SIM_DEVICES=111,222 odbridged
//!
//! # Enable debug logging (overrides log_level from the config file)
//! RUST_LOG=odbridged=debug odbridged
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown, draining the bus connection

use std::env;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use odbridge_core::SimBackend;
use odbridged::bus::NatsConnector;
use odbridged::config::{BridgeConfig, LogLevel};
use odbridged::lifecycle::{spawn_signal_listener, Lifecycle};

/// Environment variable listing simulated controller serial numbers.
const SIM_DEVICES_ENV: &str = "ODBRIDGE_SIM_DEVICES";

/// odbridge daemon - ODrive to NATS bridge
#[derive(Parser, Debug)]
#[command(name = "odbridged", version, about)]
struct Args {
    /// NATS server address [default: nats://127.0.0.1:4222]
    #[arg(short = 'n', long = "nats", value_name = "ADDRESS")]
    nats: Option<String>,
}

/// Installs the global subscriber. `RUST_LOG` wins when set.
fn init_tracing(level: LogLevel) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn")
            .add_directive(format!("odbridged={level}").parse()?)
            .add_directive(format!("odbridge_core={level}").parse()?)
            .add_directive(format!("odbridge_protocol={level}").parse()?),
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Serial numbers of simulated controllers to expose.
fn sim_serials() -> Vec<String> {
    env::var(SIM_DEVICES_ENV)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config =
        BridgeConfig::load(args.nats.as_deref()).context("Failed to load configuration")?;

    init_tracing(config.log_level)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        bus_address = %config.bus_address,
        "odbridge daemon starting"
    );

    let backend = SimBackend::from_serials(sim_serials());

    let cancel_token = CancellationToken::new();
    let _signals = spawn_signal_listener(cancel_token.clone());

    let report = Lifecycle::new(config)
        .run(&backend, &NatsConnector, cancel_token)
        .await
        .context("Bridge stopped with an error")?;

    info!(
        attached = report.enumeration.attached,
        drained = report.drained,
        "odbridge daemon stopped"
    );
    Ok(())
}
