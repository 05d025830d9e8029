//! Metrics aggregation daemon.
//!
//! The [`MetricsDaemon`] runs as an independent async task that:
//!
//! 1. Receives events from the channel (sent by `MetricsClient`)
//! 2. Updates counters in `ControllerMetrics`
//! 3. Publishes a copy to a shared handle after each batch of events
//!
//! # Design Notes
//!
//! The daemon owns mutable state and is the only writer. Readers access
//! state through a shared `RwLock` handle, so they never block event
//! processing for longer than one copy.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::event::MetricEvent;
use super::state::ControllerMetrics;

/// Shared state handle for read-only access.
pub type SharedMetricsState = Arc<RwLock<ControllerMetrics>>;

/// The metrics aggregation daemon.
pub struct MetricsDaemon {
    /// Channel receiver for incoming events.
    rx: mpsc::UnboundedReceiver<MetricEvent>,

    /// Current aggregated state.
    state: ControllerMetrics,

    /// Shared state handle for readers.
    shared_state: SharedMetricsState,
}

impl MetricsDaemon {
    pub fn new(rx: mpsc::UnboundedReceiver<MetricEvent>) -> Self {
        Self {
            rx,
            state: ControllerMetrics::new(),
            shared_state: Arc::new(RwLock::new(ControllerMetrics::new())),
        }
    }

    /// Returns a handle to the shared state.
    pub fn state_handle(&self) -> SharedMetricsState {
        Arc::clone(&self.shared_state)
    }

    /// Runs the daemon until shutdown is signaled or every client is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Metrics daemon starting");

        loop {
            tokio::select! {
                biased;

                // Check shutdown first
                _ = shutdown.cancelled() => {
                    tracing::info!("Metrics daemon shutting down");
                    break;
                }

                event = self.rx.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("All metrics clients dropped");
                        break;
                    };
                    self.process_event(event);
                    self.drain_pending();
                    self.update_shared_state();
                }
            }
        }

        // Events sent before shutdown still count
        self.drain_pending();
        self.update_shared_state();
        tracing::debug!("Metrics daemon stopped");
    }

    fn drain_pending(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.process_event(event);
        }
    }

    /// Processes a single event, updating the aggregated state.
    fn process_event(&mut self, event: MetricEvent) {
        match event {
            // Telemetry events
            MetricEvent::TelemetryAccepted { lost } => {
                self.state.telemetry_accepted += 1;
                self.state.messages_lost += lost;
            }
            MetricEvent::TelemetryDuplicate => {
                self.state.telemetry_duplicates += 1;
            }
            MetricEvent::TelemetryMalformed { reason } => {
                self.state.telemetry_malformed += 1;
                *self.state.malformed_by_reason.entry(reason).or_insert(0) += 1;
            }
            MetricEvent::ClockSkew => {
                self.state.clock_skew_events += 1;
            }

            // Cycle events
            MetricEvent::CycleScheduled {
                stale_lanes,
                infeasible,
            } => {
                self.state.cycles_scheduled += 1;
                self.state.stale_lane_cycles += u64::from(stale_lanes);
                if infeasible {
                    self.state.infeasible_cycles += 1;
                }
            }
            MetricEvent::CyclesSkipped { cycles } => {
                self.state.cycles_skipped += cycles;
            }

            // Publish events
            MetricEvent::PublishSucceeded { .. } => {
                self.state.publish_succeeded += 1;
            }
            MetricEvent::PublishRetried => {
                self.state.publish_retries += 1;
            }
            MetricEvent::PublishFellBack => {
                self.state.publish_fallbacks += 1;
            }
            MetricEvent::PublishFailed => {
                self.state.publish_failures += 1;
            }
        }
    }

    fn update_shared_state(&self) {
        *self.shared_state.write() = self.state.clone();
    }
}
