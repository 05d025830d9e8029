//! Metrics collection.
//!
//! This module provides a 3-layer architecture for metrics:
//!
//! 1. **Emission Layer** ([`MetricsClient`]) - Fire-and-forget event emission
//! 2. **Aggregation Layer** ([`MetricsDaemon`]) - Independent event processing
//! 3. **Access Layer** ([`MetricsSystem`]) - Owns both, hands out clients and
//!    snapshots of [`ControllerMetrics`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  EMISSION LAYER                                                      │
//! │  MetricsClient (cloneable, cheap, fire-and-forget)                  │
//! │  - Used by: TelemetryIngest, cycle tasks, CommandPublisher          │
//! └──────────────────────────────┬──────────────────────────────────────┘
//!                                │ MetricEvent (mpsc channel)
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  AGGREGATION LAYER                                                   │
//! │  MetricsDaemon (independent async task)                              │
//! │  - Updates counters in ControllerMetrics                            │
//! │  - Publishes a copy after each batch of events                      │
//! └──────────────────────────────┬──────────────────────────────────────┘
//!                                │ read-only access to state
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ACCESS LAYER                                                        │
//! │  MetricsSystem::snapshot() → Monitor, CLI status report             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use signal_controller::metrics::MetricsSystem;
//!
//! let system = MetricsSystem::new(&tokio::runtime::Handle::current());
//! let client = system.client();
//! client.publish_retried();
//!
//! let counters = system.snapshot();
//! system.shutdown().await;
//! ```

mod client;
mod daemon;
mod event;
mod state;

pub use client::MetricsClient;
pub use daemon::{MetricsDaemon, SharedMetricsState};
pub use event::MetricEvent;
pub use state::ControllerMetrics;

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The complete metrics system.
///
/// Factory for a [`MetricsClient`], owner of the daemon task, and source of
/// state snapshots.
pub struct MetricsSystem {
    client: MetricsClient,
    state_handle: SharedMetricsState,
    daemon_handle: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl MetricsSystem {
    /// Creates a new metrics system and starts the daemon on `runtime_handle`.
    pub fn new(runtime_handle: &tokio::runtime::Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = MetricsClient::new(tx);

        let daemon = MetricsDaemon::new(rx);
        let state_handle = daemon.state_handle();
        let shutdown = CancellationToken::new();

        let daemon_shutdown = shutdown.clone();
        let daemon_handle = Some(runtime_handle.spawn(async move {
            daemon.run(daemon_shutdown).await;
        }));

        Self {
            client,
            state_handle,
            daemon_handle,
            shutdown,
        }
    }

    /// Returns a clone of the metrics client.
    pub fn client(&self) -> MetricsClient {
        self.client.clone()
    }

    /// Returns a handle to the shared metrics state.
    pub fn state_handle(&self) -> SharedMetricsState {
        Arc::clone(&self.state_handle)
    }

    /// Copy of the counters as last published by the daemon.
    pub fn snapshot(&self) -> ControllerMetrics {
        self.state_handle.read().clone()
    }

    /// Signals the daemon to stop and waits for its final update.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.daemon_handle.take() {
            let _ = handle.await;
        }
    }

    /// Returns true if the daemon is still running.
    pub fn is_running(&self) -> bool {
        self.daemon_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for MetricsSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsSystem")
            .field("running", &self.is_running())
            .finish()
    }
}
