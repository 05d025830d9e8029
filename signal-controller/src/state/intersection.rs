//! Per-intersection state and its immutable snapshot.

use super::lane::{ApplyOutcome, LaneState};
use crate::config::TimingConfig;
use crate::lane::{Lane, PerLane};
use crate::scheduler::PhaseSchedule;
use crate::telemetry::TelemetryReading;

/// Live state of one intersection. Owned by the store, mutated under its lock.
#[derive(Debug, Clone)]
pub struct IntersectionState {
    pub intersection_id: String,
    pub lanes: PerLane<LaneState>,
    pub cycle_count: u64,
    /// Start of the currently active cycle, Unix seconds.
    pub cycle_start_ts: f64,
    pub timing: TimingConfig,
    pub last_published_schedule: Option<PhaseSchedule>,
}

impl IntersectionState {
    pub fn new(
        intersection_id: impl Into<String>,
        timing: TimingConfig,
        latency_window: usize,
        cycle_start_ts: f64,
    ) -> Self {
        Self {
            intersection_id: intersection_id.into(),
            lanes: PerLane::from_fn(|lane| LaneState::new(lane, latency_window)),
            cycle_count: 0,
            cycle_start_ts,
            timing,
            last_published_schedule: None,
        }
    }

    pub fn apply(&mut self, reading: &TelemetryReading, receipt_time: f64) -> ApplyOutcome {
        self.lanes[reading.lane].apply(reading, receipt_time)
    }

    pub fn snapshot(&self) -> IntersectionSnapshot {
        IntersectionSnapshot {
            intersection_id: self.intersection_id.clone(),
            lanes: PerLane::from_fn(|lane| LaneSnapshot::from(&self.lanes[lane])),
            cycle_count: self.cycle_count,
            cycle_start_ts: self.cycle_start_ts,
            timing: self.timing,
            last_published_schedule: self.last_published_schedule.clone(),
        }
    }
}

/// Copy of one lane's state, detached from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneSnapshot {
    pub lane: Lane,
    pub density_pct: f64,
    pub queue_len: u64,
    pub last_seq: Option<u64>,
    pub messages_received: u64,
    pub messages_lost: u64,
    pub last_ts: Option<f64>,
    pub last_receipt_time: Option<f64>,
    /// Retained latency samples in milliseconds, oldest first.
    pub latency_samples: Vec<f64>,
}

impl LaneSnapshot {
    /// Whether the freshest reading is older than `window_secs` at `now`.
    ///
    /// A lane that never reported is stale.
    pub fn is_stale(&self, now: f64, window_secs: f64) -> bool {
        match self.last_receipt_time {
            Some(received) => now - received > window_secs,
            None => true,
        }
    }
}

impl From<&LaneState> for LaneSnapshot {
    fn from(state: &LaneState) -> Self {
        Self {
            lane: state.lane,
            density_pct: state.density_pct,
            queue_len: state.queue_len,
            last_seq: state.last_seq,
            messages_received: state.messages_received,
            messages_lost: state.messages_lost,
            last_ts: state.last_ts,
            last_receipt_time: state.last_receipt_time,
            latency_samples: state.latency.samples().collect(),
        }
    }
}

/// Point-in-time copy of an intersection, safe to use without any lock.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionSnapshot {
    pub intersection_id: String,
    pub lanes: PerLane<LaneSnapshot>,
    pub cycle_count: u64,
    pub cycle_start_ts: f64,
    pub timing: TimingConfig,
    pub last_published_schedule: Option<PhaseSchedule>,
}
