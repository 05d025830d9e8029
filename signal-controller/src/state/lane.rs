//! Per-lane telemetry state and sequence accounting.

use tracing::{debug, warn};

use super::window::LatencyWindow;
use crate::lane::Lane;
use crate::telemetry::TelemetryReading;

/// How a reading related to the lane's sequence history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// First reading, or exactly the expected sequence number.
    InOrder,
    /// Accepted after a forward gap of `lost` sequence numbers.
    Gap { lost: u64 },
    /// Duplicate or older than the last accepted reading.
    Stale,
}

/// What applying one reading did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplyOutcome {
    pub disposition: Disposition,
    /// Recorded latency sample, never negative.
    pub latency_ms: f64,
    /// The raw latency was negative (sender clock ahead of ours).
    pub clock_skew: bool,
}

/// Latest-known state of one lane.
#[derive(Debug, Clone)]
pub struct LaneState {
    pub lane: Lane,
    pub density_pct: f64,
    pub queue_len: u64,
    /// Highest accepted sequence number; `None` until the first reading.
    pub last_seq: Option<u64>,
    pub messages_received: u64,
    pub messages_lost: u64,
    /// Sender-reported creation time of the freshest reading.
    pub last_ts: Option<f64>,
    /// Controller-local arrival time of the freshest reading.
    pub last_receipt_time: Option<f64>,
    pub latency: LatencyWindow,
}

impl LaneState {
    pub fn new(lane: Lane, latency_window: usize) -> Self {
        Self {
            lane,
            density_pct: 0.0,
            queue_len: 0,
            last_seq: None,
            messages_received: 0,
            messages_lost: 0,
            last_ts: None,
            last_receipt_time: None,
            latency: LatencyWindow::new(latency_window),
        }
    }

    /// Next sequence number that would be accepted without loss.
    pub fn expected_seq(&self) -> u64 {
        self.last_seq.map_or(0, |s| s.saturating_add(1))
    }

    /// Whether this lane has ever accepted a reading.
    pub fn has_reported(&self) -> bool {
        self.last_seq.is_some()
    }

    /// Apply a validated reading that arrived at `receipt_time`.
    ///
    /// The first reading establishes the sequence baseline. Afterwards a
    /// forward jump counts the skipped numbers as lost, and anything at or
    /// below `last_seq` is counted but leaves the lane's values untouched.
    pub fn apply(&mut self, reading: &TelemetryReading, receipt_time: f64) -> ApplyOutcome {
        self.messages_received += 1;

        let raw_latency_ms = (receipt_time - reading.ts) * 1000.0;
        let clock_skew = raw_latency_ms < 0.0;
        let latency_ms = raw_latency_ms.max(0.0);
        self.latency.push(latency_ms);
        if clock_skew {
            warn!(
                intersection = %reading.intersection_id,
                lane = %self.lane,
                seq = reading.seq,
                skew_ms = -raw_latency_ms,
                "Reading timestamped in the future, latency clamped to 0"
            );
        }

        let disposition = match self.last_seq {
            None => Disposition::InOrder,
            Some(last) if reading.seq <= last => Disposition::Stale,
            Some(_) => {
                let expected = self.expected_seq();
                if reading.seq == expected {
                    Disposition::InOrder
                } else {
                    Disposition::Gap {
                        lost: reading.seq - expected,
                    }
                }
            }
        };

        match disposition {
            Disposition::Stale => {
                debug!(
                    intersection = %reading.intersection_id,
                    lane = %self.lane,
                    seq = reading.seq,
                    last_seq = ?self.last_seq,
                    "Duplicate or out-of-order reading ignored for freshness"
                );
            }
            Disposition::Gap { lost } => {
                self.messages_lost += lost;
                warn!(
                    intersection = %reading.intersection_id,
                    lane = %self.lane,
                    expected = self.expected_seq(),
                    seq = reading.seq,
                    lost,
                    "Sequence gap detected"
                );
                self.accept(reading, receipt_time);
            }
            Disposition::InOrder => self.accept(reading, receipt_time),
        }

        ApplyOutcome {
            disposition,
            latency_ms,
            clock_skew,
        }
    }

    fn accept(&mut self, reading: &TelemetryReading, receipt_time: f64) {
        self.last_seq = Some(reading.seq);
        self.density_pct = reading.density_pct;
        self.queue_len = reading.queue_len;
        self.last_ts = Some(reading.ts);
        self.last_receipt_time = Some(receipt_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(seq: u64, density: f64, ts: f64) -> TelemetryReading {
        TelemetryReading {
            intersection_id: "i1".into(),
            lane: Lane::North,
            density_pct: density,
            queue_len: (density / 10.0) as u64,
            seq,
            ts,
        }
    }

    #[test]
    fn test_gap_counts_skipped_numbers() {
        let mut lane = LaneState::new(Lane::North, 30);
        for seq in [1, 2, 3] {
            lane.apply(&reading(seq, 10.0, 100.0), 100.1);
        }
        let outcome = lane.apply(&reading(7, 50.0, 100.0), 100.1);

        assert_eq!(outcome.disposition, Disposition::Gap { lost: 3 });
        assert_eq!(lane.messages_lost, 3);
        assert_eq!(lane.last_seq, Some(7));
        assert_eq!(lane.expected_seq(), 8);
        assert_eq!(lane.density_pct, 50.0);
    }

    #[test]
    fn test_duplicate_does_not_regress() {
        let mut lane = LaneState::new(Lane::North, 30);
        for seq in [1, 2, 3, 7] {
            lane.apply(&reading(seq, seq as f64, 100.0), 101.0);
        }
        let outcome = lane.apply(&reading(3, 99.0, 100.0), 105.0);

        assert_eq!(outcome.disposition, Disposition::Stale);
        assert_eq!(lane.messages_lost, 3);
        assert_eq!(lane.last_seq, Some(7));
        assert_eq!(lane.messages_received, 5);
        // Freshness stays with seq 7.
        assert_eq!(lane.density_pct, 7.0);
        assert_eq!(lane.last_receipt_time, Some(101.0));
        // The stale reading still contributes a latency sample.
        assert_eq!(lane.latency.len(), 5);
    }

    #[test]
    fn test_first_reading_sets_baseline() {
        let mut lane = LaneState::new(Lane::North, 30);
        assert_eq!(lane.expected_seq(), 0);

        let outcome = lane.apply(&reading(40, 20.0, 100.0), 100.0);
        assert_eq!(outcome.disposition, Disposition::InOrder);
        assert_eq!(lane.messages_lost, 0);
        assert!(lane.has_reported());
    }

    #[test]
    fn test_future_timestamp_is_clamped() {
        let mut lane = LaneState::new(Lane::North, 30);
        let outcome = lane.apply(&reading(0, 20.0, 1_001.0), 1_000.0);

        assert!(outcome.clock_skew);
        assert_eq!(outcome.latency_ms, 0.0);
        assert_eq!(lane.latency.last(), Some(0.0));
    }

    #[test]
    fn test_latency_in_milliseconds() {
        let mut lane = LaneState::new(Lane::North, 30);
        let outcome = lane.apply(&reading(0, 20.0, 1_000.0), 1_000.25);
        assert!(!outcome.clock_skew);
        assert!((outcome.latency_ms - 250.0).abs() < 1e-6);
    }
}
