//! Aggregated metrics state.
//!
//! The daemon owns the mutable [`ControllerMetrics`] and updates it from
//! incoming events. Readers get a shared copy.

use std::collections::BTreeMap;

use serde::Serialize;

/// Process-wide counters for the controller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ControllerMetrics {
    // Telemetry
    pub telemetry_accepted: u64,
    pub telemetry_duplicates: u64,
    pub telemetry_malformed: u64,
    /// Malformed messages per validation failure label.
    pub malformed_by_reason: BTreeMap<&'static str, u64>,
    pub messages_lost: u64,
    pub clock_skew_events: u64,

    // Cycles
    pub cycles_scheduled: u64,
    pub infeasible_cycles: u64,
    /// Sum over all cycles of lanes scheduled with the neutral weight.
    pub stale_lane_cycles: u64,
    pub cycles_skipped: u64,

    // Publishing
    pub publish_succeeded: u64,
    pub publish_retries: u64,
    pub publish_fallbacks: u64,
    pub publish_failures: u64,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of expected readings that never arrived, in [0, 1].
    pub fn loss_ratio(&self) -> f64 {
        let expected = self.telemetry_accepted + self.messages_lost;
        if expected == 0 {
            0.0
        } else {
            self.messages_lost as f64 / expected as f64
        }
    }

    /// Cycles whose command reached the transport, fresh or fallback.
    pub fn cycles_delivered(&self) -> u64 {
        self.publish_succeeded + self.publish_fallbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_ratio() {
        let mut metrics = ControllerMetrics::new();
        assert_eq!(metrics.loss_ratio(), 0.0);

        metrics.telemetry_accepted = 3;
        metrics.messages_lost = 1;
        assert!((metrics.loss_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serializes_reason_breakdown() {
        let mut metrics = ControllerMetrics::new();
        metrics.malformed_by_reason.insert("unknown_lane", 2);

        let value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(value["malformed_by_reason"]["unknown_lane"], 2);
        assert_eq!(value["publish_failures"], 0);
    }
}
