//! Signal Controller - adaptive traffic-signal timing
//!
//! This library schedules four-way intersections from live lane-density
//! telemetry. Each cycle the available green time is split across the lanes
//! in proportion to demand, bounded per lane, and the resulting phase
//! schedule is published to the intersection's actuator.
//!
//! # High-Level API
//!
//! The [`controller`] module runs everything over a pub/sub [`transport`]:
//!
//! ```ignore
//! use std::sync::Arc;
//! use signal_controller::clock::SystemClock;
//! use signal_controller::config::ConfigFile;
//! use signal_controller::controller::{Controller, MetricsHandles};
//! use signal_controller::transport::{MemoryBroker, topic::TELEMETRY_FILTER};
//!
//! let config = ConfigFile::load()?.controller_config()?;
//! let broker = MemoryBroker::new();
//! let telemetry = broker.subscribe(TELEMETRY_FILTER, 1024);
//!
//! let handle = Controller::start(
//!     &config,
//!     Arc::new(broker),
//!     telemetry,
//!     Arc::new(SystemClock),
//!     MetricsHandles::detached(),
//! )?;
//! let report = handle.monitor().report();
//! handle.shutdown().await;
//! ```

pub mod clock;
pub mod config;
pub mod controller;
pub mod lane;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod publisher;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod transport;

/// Version of the signal controller library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
