//! Per-intersection signal timing configuration.

use std::time::Duration;

use thiserror::Error;

use super::defaults::{
    DEFAULT_CYCLE_LENGTH_SECS, DEFAULT_GREEN_MAX_SECS, DEFAULT_GREEN_MIN_SECS,
    DEFAULT_STALENESS_WINDOW_SECS, DEFAULT_YELLOW_SECS,
};
use crate::lane::{Lane, PerLane};

/// Timing values that can never produce a valid schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimingError {
    #[error("cycle_length must be positive")]
    ZeroCycle,

    #[error("cycle_length {cycle_length}s leaves no green time after {yellow_total}s of yellow")]
    NoGreenTime { cycle_length: u32, yellow_total: u32 },

    #[error("green_min {green_min}s exceeds green_max {green_max}s")]
    InvertedBounds { green_min: u32, green_max: u32 },
}

/// Bounds that are valid but cannot all be honoured at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsConflict {
    /// `4 · green_min > available`: some lane must get less than the minimum.
    MinimumTooLarge { required: u32, available: u32 },
    /// `4 · green_max < available`: some lane must get more than the maximum.
    MaximumTooSmall { allowed: u32, available: u32 },
}

/// Signal timing for one intersection.
///
/// # Example
///
/// ```
/// use signal_controller::config::TimingConfig;
/// use signal_controller::lane::Lane;
///
/// let timing = TimingConfig::new(60, 3).with_green_bounds(5, 30);
/// assert_eq!(timing.available_green(), 48);
/// assert_eq!(timing.yellow(Lane::East), 3);
/// assert!(timing.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    cycle_length: u32,
    yellow: PerLane<u32>,
    green_min: u32,
    green_max: u32,
    staleness_window: Duration,
}

impl TimingConfig {
    /// Timing with a uniform yellow and default green bounds.
    pub fn new(cycle_length: u32, yellow: u32) -> Self {
        Self {
            cycle_length,
            yellow: PerLane::uniform(yellow),
            ..Self::default()
        }
    }

    pub fn with_green_bounds(mut self, green_min: u32, green_max: u32) -> Self {
        self.green_min = green_min;
        self.green_max = green_max;
        self
    }

    /// Override the yellow time of a single lane.
    pub fn with_lane_yellow(mut self, lane: Lane, yellow: u32) -> Self {
        self.yellow[lane] = yellow;
        self
    }

    /// Set how old a lane's last reading may be before it counts as stale.
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_cycle_length(mut self, cycle_length: u32) -> Self {
        self.cycle_length = cycle_length;
        self
    }

    pub fn cycle_length(&self) -> u32 {
        self.cycle_length
    }

    pub fn yellow(&self, lane: Lane) -> u32 {
        self.yellow[lane]
    }

    pub fn yellows(&self) -> PerLane<u32> {
        self.yellow
    }

    pub fn green_min(&self) -> u32 {
        self.green_min
    }

    pub fn green_max(&self) -> u32 {
        self.green_max
    }

    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    /// Total yellow seconds per cycle, saturating at `u32::MAX`.
    pub fn yellow_total(&self) -> u32 {
        self.yellow
            .as_array()
            .iter()
            .try_fold(0u32, |total, &y| total.checked_add(y))
            .unwrap_or(u32::MAX)
    }

    /// Seconds left to distribute as green: `cycle_length - Σ yellow`.
    pub fn available_green(&self) -> u32 {
        self.cycle_length.saturating_sub(self.yellow_total())
    }

    /// Reject timings that cannot yield a schedule at all.
    pub fn validate(&self) -> Result<(), TimingError> {
        if self.cycle_length == 0 {
            return Err(TimingError::ZeroCycle);
        }
        if self.cycle_length <= self.yellow_total() {
            return Err(TimingError::NoGreenTime {
                cycle_length: self.cycle_length,
                yellow_total: self.yellow_total(),
            });
        }
        if self.green_min > self.green_max {
            return Err(TimingError::InvertedBounds {
                green_min: self.green_min,
                green_max: self.green_max,
            });
        }
        Ok(())
    }

    /// Whether the green bounds can all hold for this cycle.
    pub fn bounds_conflict(&self) -> Option<BoundsConflict> {
        let available = self.available_green();
        let lanes = Lane::ALL.len() as u32;
        let required = self.green_min.saturating_mul(lanes);
        let allowed = self.green_max.saturating_mul(lanes);

        if required > available {
            Some(BoundsConflict::MinimumTooLarge {
                required,
                available,
            })
        } else if allowed < available {
            Some(BoundsConflict::MaximumTooSmall { allowed, available })
        } else {
            None
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_length: DEFAULT_CYCLE_LENGTH_SECS,
            yellow: PerLane::uniform(DEFAULT_YELLOW_SECS),
            green_min: DEFAULT_GREEN_MIN_SECS,
            green_max: DEFAULT_GREEN_MAX_SECS,
            staleness_window: Duration::from_secs_f64(DEFAULT_STALENESS_WINDOW_SECS),
        }
    }
}
