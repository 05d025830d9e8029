//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::timing::TimingConfig;
use crate::lane::{Lane, PerLane};

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Managed intersections
    pub controller: ControllerSettings,
    /// Timing shared by every intersection
    pub timing: TimingSettings,
    /// Per-intersection timing overrides from `[intersection.<id>]`
    pub overrides: BTreeMap<String, TimingOverrides>,
    /// Command publishing retry policy
    pub publish: PublishSettings,
    /// Datagram transport
    pub transport: TransportSettings,
    /// Loss and latency monitoring
    pub monitor: MonitorSettings,
    /// Logging
    pub logging: LoggingSettings,
}

/// `[controller]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    /// Intersection identifiers, in configuration order.
    pub intersections: Vec<String>,
}

/// `[timing]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSettings {
    pub cycle_length: u32,
    /// Yellow applied to lanes without an explicit `yellow_<lane>`.
    pub yellow: u32,
    pub lane_yellow: PerLane<Option<u32>>,
    pub green_min: u32,
    pub green_max: u32,
    pub staleness_window_secs: f64,
}

impl TimingSettings {
    /// Effective yellow for `lane`.
    pub fn yellow_for(&self, lane: Lane) -> u32 {
        self.lane_yellow[lane].unwrap_or(self.yellow)
    }

    pub fn to_timing_config(&self) -> TimingConfig {
        let mut timing = TimingConfig::new(self.cycle_length, self.yellow)
            .with_green_bounds(self.green_min, self.green_max)
            .with_staleness_window(Duration::from_secs_f64(self.staleness_window_secs.max(0.0)));
        for lane in Lane::ALL {
            timing = timing.with_lane_yellow(lane, self.yellow_for(lane));
        }
        timing
    }
}

/// `[intersection.<id>]` section. Unset keys inherit from `[timing]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingOverrides {
    pub cycle_length: Option<u32>,
    pub yellow: Option<u32>,
    pub lane_yellow: PerLane<Option<u32>>,
    pub green_min: Option<u32>,
    pub green_max: Option<u32>,
    pub staleness_window_secs: Option<f64>,
}

impl TimingOverrides {
    /// Layer these overrides on top of `base`.
    pub fn apply_to(&self, base: &TimingSettings) -> TimingSettings {
        let yellow = self.yellow.unwrap_or(base.yellow);
        // A section-level `yellow` resets inherited per-lane values.
        let inherited_lane_yellow = if self.yellow.is_some() {
            PerLane::uniform(None)
        } else {
            base.lane_yellow
        };
        TimingSettings {
            cycle_length: self.cycle_length.unwrap_or(base.cycle_length),
            yellow,
            lane_yellow: PerLane::from_fn(|lane| {
                self.lane_yellow[lane].or(inherited_lane_yellow[lane])
            }),
            green_min: self.green_min.unwrap_or(base.green_min),
            green_max: self.green_max.unwrap_or(base.green_max),
            staleness_window_secs: self
                .staleness_window_secs
                .unwrap_or(base.staleness_window_secs),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `[publish]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout_ms: u64,
}

/// `[transport]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub listen_addr: SocketAddr,
    pub command_peers: Vec<SocketAddr>,
    pub queue_capacity: usize,
    pub recv_timeout_ms: u64,
}

/// `[monitor]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Latency samples retained per lane.
    pub latency_window: usize,
    /// Seconds between status reports written to the log.
    pub report_interval_secs: u64,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub file: PathBuf,
}
