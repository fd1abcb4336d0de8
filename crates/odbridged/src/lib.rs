//! odbridge daemon - device registry, telemetry loop and bus lifecycle
//!
//! This crate provides the moving parts of the bridge daemon:
//! - `registry` - Controllers attached at startup
//! - `sampler` - Reads one axis into a wire status record
//! - `bus` - Bus Client capability with NATS and in-memory transports
//! - `control` - Extension point for control commands
//! - `bridge` - Subscriptions and the periodic telemetry sweep
//! - `lifecycle` - Startup, run and drain sequencing
//! - `config` - Layered configuration
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        odbridged                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌─────────────────┐  enumerate  ┌────────────────────────┐  │
//! │  │    Lifecycle    │────────────▶│    DeviceRegistry      │  │
//! │  │ (start / drain) │             │ (attached controllers) │  │
//! │  └────────┬────────┘             └───────────┬────────────┘  │
//! │           │ connect + spawn                  │ sample        │
//! │           ▼                                  ▼               │
//! │  ┌─────────────────┐  publish    ┌────────────────────────┐  │
//! │  │   BridgeLoop    │────────────▶│       BusClient        │  │
//! │  │ (single task)   │◀────────────│  (NATS / in-memory)    │  │
//! │  └─────────────────┘  inbound    └────────────────────────┘  │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows a panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Per-device and per-axis failures are logged and never abort the daemon

pub mod bridge;
pub mod bus;
pub mod config;
pub mod control;
pub mod lifecycle;
pub mod registry;
pub mod sampler;
