//! Metrics emission layer.
//!
//! The [`MetricsClient`] provides a fire-and-forget interface for emitting
//! metric events. It is cheap to clone and never blocks.
//!
//! # Usage
//!
//! ```ignore
//! use signal_controller::metrics::MetricsClient;
//!
//! let client: MetricsClient = ...;
//!
//! client.telemetry_accepted(0);
//! client.publish_retried();
//! ```

use super::event::MetricEvent;
use tokio::sync::mpsc;

/// Client for emitting metric events to the metrics daemon.
///
/// # Fire-and-Forget Semantics
///
/// All methods silently ignore failures (e.g. if the daemon has shut down),
/// so metrics collection never affects the control loop.
#[derive(Clone, Debug)]
pub struct MetricsClient {
    tx: mpsc::UnboundedSender<MetricEvent>,
}

impl MetricsClient {
    /// Creates a new metrics client with the given channel sender.
    pub fn new(tx: mpsc::UnboundedSender<MetricEvent>) -> Self {
        Self { tx }
    }

    /// A client whose events go nowhere.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    #[inline]
    fn send(&self, event: MetricEvent) {
        // Ignore send errors - daemon may have shut down
        let _ = self.tx.send(event);
    }

    // =========================================================================
    // Telemetry Events
    // =========================================================================

    #[inline]
    pub fn telemetry_accepted(&self, lost: u64) {
        self.send(MetricEvent::TelemetryAccepted { lost });
    }

    #[inline]
    pub fn telemetry_duplicate(&self) {
        self.send(MetricEvent::TelemetryDuplicate);
    }

    #[inline]
    pub fn telemetry_malformed(&self, reason: &'static str) {
        self.send(MetricEvent::TelemetryMalformed { reason });
    }

    #[inline]
    pub fn clock_skew(&self) {
        self.send(MetricEvent::ClockSkew);
    }

    // =========================================================================
    // Cycle Events
    // =========================================================================

    #[inline]
    pub fn cycle_scheduled(&self, stale_lanes: u32, infeasible: bool) {
        self.send(MetricEvent::CycleScheduled {
            stale_lanes,
            infeasible,
        });
    }

    #[inline]
    pub fn cycles_skipped(&self, cycles: u64) {
        self.send(MetricEvent::CyclesSkipped { cycles });
    }

    // =========================================================================
    // Publish Events
    // =========================================================================

    #[inline]
    pub fn publish_succeeded(&self, attempts: u32) {
        self.send(MetricEvent::PublishSucceeded { attempts });
    }

    #[inline]
    pub fn publish_retried(&self) {
        self.send(MetricEvent::PublishRetried);
    }

    #[inline]
    pub fn publish_fell_back(&self) {
        self.send(MetricEvent::PublishFellBack);
    }

    #[inline]
    pub fn publish_failed(&self) {
        self.send(MetricEvent::PublishFailed);
    }
}
