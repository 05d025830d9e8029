//! Per-cycle schedule computation.
//!
//! [`compute_schedule`] turns an [`IntersectionSnapshot`] into the next
//! [`PhaseSchedule`]:
//!
//! 1. Each lane's weight is its density, floored at [`EPSILON_WEIGHT`], or
//!    [`NEUTRAL_WEIGHT`] when its last reading is older than the staleness
//!    window.
//! 2. [`allocate`] splits `cycle_length - Σ yellow` across the lanes.
//! 3. The new cycle starts on the boundary after the previous one, so cycle
//!    starts partition time regardless of how late the computation ran.
//!
//! Identical snapshots and clock readings always yield identical schedules.

mod allocation;
mod schedule;

pub use allocation::{allocate, Allocation, Feasibility};
pub use schedule::{PhaseEntry, PhaseSchedule, ALGORITHM};

use crate::lane::{Lane, PerLane};
use crate::state::IntersectionSnapshot;

/// Smallest weight a lane can have, on the 0..=100 density scale.
pub const EPSILON_WEIGHT: f64 = 1.0;

/// Weight substituted for a lane without a fresh reading.
pub const NEUTRAL_WEIGHT: f64 = 25.0;

/// A computed schedule and the diagnostics of computing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleOutcome {
    pub schedule: PhaseSchedule,
    /// Lanes scheduled with [`NEUTRAL_WEIGHT`], in canonical order.
    pub stale_lanes: Vec<Lane>,
    pub feasibility: Feasibility,
    /// Whole cycles jumped over because the computation ran late.
    pub skipped_cycles: u64,
}

/// Scheduling weight per lane at `now`, plus the lanes that were stale.
pub fn lane_weights(snapshot: &IntersectionSnapshot, now: f64) -> (PerLane<f64>, Vec<Lane>) {
    let window = snapshot.timing.staleness_window().as_secs_f64();
    let mut stale = Vec::new();
    let weights = PerLane::from_fn(|lane| {
        let state = &snapshot.lanes[lane];
        if state.is_stale(now, window) {
            stale.push(lane);
            NEUTRAL_WEIGHT
        } else {
            state.density_pct.max(EPSILON_WEIGHT)
        }
    });
    (weights, stale)
}

/// Start of the cycle following `previous_start`, as seen at `now`.
///
/// Normally `previous_start + cycle_length`. When `now` is already past
/// the end of that cycle too, jumps to the latest boundary at or before
/// `now` and reports how many cycles were skipped.
pub fn next_cycle_start(previous_start: f64, cycle_length: u32, now: f64) -> (f64, u64) {
    let length = f64::from(cycle_length.max(1));
    let elapsed_cycles = ((now - previous_start) / length).floor();
    let steps = if elapsed_cycles.is_finite() && elapsed_cycles > 1.0 {
        elapsed_cycles as u64
    } else {
        1
    };
    (previous_start + steps as f64 * length, steps - 1)
}

/// Compute the schedule for the cycle after the snapshot's current one.
pub fn compute_schedule(snapshot: &IntersectionSnapshot, now: f64) -> ScheduleOutcome {
    let timing = &snapshot.timing;
    let (weights, stale_lanes) = lane_weights(snapshot, now);
    let allocation = allocate(
        &weights,
        timing.available_green(),
        timing.green_min(),
        timing.green_max(),
    );
    let (cycle_start_ts, skipped_cycles) =
        next_cycle_start(snapshot.cycle_start_ts, timing.cycle_length(), now);

    let schedule = PhaseSchedule::new(
        snapshot.intersection_id.clone(),
        cycle_start_ts,
        timing.cycle_length(),
        snapshot.cycle_count + 1 + skipped_cycles,
        allocation.greens,
        timing.yellows(),
    );
    debug_assert!(
        schedule.is_consistent(),
        "phase schedule must fill the cycle exactly: {schedule:?}"
    );

    ScheduleOutcome {
        schedule,
        stale_lanes,
        feasibility: allocation.feasibility,
        skipped_cycles,
    }
}
