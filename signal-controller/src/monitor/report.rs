//! Serializable report types.

use serde::Serialize;

use crate::lane::Lane;
use crate::metrics::ControllerMetrics;
use crate::state::{IntersectionSnapshot, LaneSnapshot};

/// Latency statistics over the retained sample window, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    /// Moving average.
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub samples: usize,
}

impl LatencyStats {
    /// Statistics over `samples`, or `None` when there are none.
    pub fn from_samples(samples: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for sample in samples {
            count += 1;
            sum += sample;
            min = min.min(sample);
            max = max.max(sample);
        }
        (count > 0).then(|| Self {
            mean_ms: sum / count as f64,
            min_ms: min,
            max_ms: max,
            samples: count,
        })
    }
}

/// One lane as seen by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneReport {
    pub lane: Lane,
    pub density_pct: f64,
    pub queue_len: u64,
    /// Green seconds in the last published schedule, 0 before the first.
    pub green: u32,
    pub messages_received: u64,
    pub messages_lost: u64,
    pub stale: bool,
    pub latency: Option<LatencyStats>,
}

/// Read-only view of one intersection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionReport {
    pub intersection_id: String,
    pub cycle_count: u64,
    pub cycle_start_ts: f64,
    /// Cycle number of the last schedule the transport accepted.
    pub last_published_cycle: Option<u64>,
    pub lanes: Vec<LaneReport>,
    /// Pooled over all four lanes' windows.
    pub latency_ms: Option<LatencyStats>,
    pub messages_received: u64,
    pub messages_lost: u64,
}

impl IntersectionReport {
    /// Project a snapshot taken at `now`.
    pub fn from_snapshot(snapshot: &IntersectionSnapshot, now: f64) -> Self {
        let window = snapshot.timing.staleness_window().as_secs_f64();
        let published = snapshot.last_published_schedule.as_ref();

        let lanes: Vec<LaneReport> = snapshot
            .lanes
            .iter()
            .map(|(lane, state)| LaneReport {
                lane,
                density_pct: state.density_pct,
                queue_len: state.queue_len,
                green: published.map(|s| s.green(lane)).unwrap_or(0),
                messages_received: state.messages_received,
                messages_lost: state.messages_lost,
                stale: state.is_stale(now, window),
                latency: LatencyStats::from_samples(state.latency_samples.iter().copied()),
            })
            .collect();

        let all_lanes = || snapshot.lanes.iter().map(|(_, state)| state);
        Self {
            intersection_id: snapshot.intersection_id.clone(),
            cycle_count: snapshot.cycle_count,
            cycle_start_ts: snapshot.cycle_start_ts,
            last_published_cycle: published.map(|s| s.cycle_count),
            latency_ms: LatencyStats::from_samples(
                all_lanes().flat_map(|state: &LaneSnapshot| state.latency_samples.iter().copied()),
            ),
            messages_received: all_lanes().map(|s| s.messages_received).sum(),
            messages_lost: all_lanes().map(|s| s.messages_lost).sum(),
            lanes,
        }
    }

    pub fn lane(&self, lane: Lane) -> &LaneReport {
        &self.lanes[lane.index()]
    }
}

/// Everything the monitor knows, for the status report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerReport {
    pub generated_at: f64,
    pub intersections: Vec<IntersectionReport>,
    pub counters: ControllerMetrics,
}
