//! Metric events for the emission layer.
//!
//! Events are fire-and-forget: producers send them to the daemon without
//! waiting for acknowledgment. Telemetry events are per reading, cycle events
//! per intersection cycle, publish events per command.

/// Events emitted by controller components to the metrics daemon.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricEvent {
    // =========================================================================
    // Telemetry Events
    // =========================================================================
    /// A reading advanced its lane's sequence.
    TelemetryAccepted {
        /// Sequence numbers skipped before this reading.
        lost: u64,
    },

    /// A reading at or below the lane's last sequence number.
    TelemetryDuplicate,

    /// A message that failed validation.
    TelemetryMalformed {
        /// Short label of the validation failure.
        reason: &'static str,
    },

    /// A reading timestamped ahead of the controller clock.
    ClockSkew,

    // =========================================================================
    // Cycle Events
    // =========================================================================
    /// A schedule was computed for one cycle.
    CycleScheduled {
        /// Lanes scheduled with the neutral weight.
        stale_lanes: u32,
        /// The green bounds could not all be honoured.
        infeasible: bool,
    },

    /// The cycle timer fell behind and whole cycles were skipped.
    CyclesSkipped { cycles: u64 },

    // =========================================================================
    // Publish Events
    // =========================================================================
    /// A fresh schedule reached the transport.
    PublishSucceeded {
        /// Attempts used, including the first.
        attempts: u32,
    },

    /// A publish attempt failed and another will follow.
    PublishRetried,

    /// The previous schedule was re-sent after the fresh one failed.
    PublishFellBack,

    /// Neither the fresh nor a fallback schedule reached the transport.
    PublishFailed,
}
