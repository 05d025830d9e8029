//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use super::settings::*;
use crate::lane::PerLane;

// =============================================================================
// Timing
// =============================================================================

/// Default cycle length in seconds.
pub const DEFAULT_CYCLE_LENGTH_SECS: u32 = 60;

/// Default yellow time per lane in seconds.
pub const DEFAULT_YELLOW_SECS: u32 = 3;

/// Default minimum green per lane in seconds.
pub const DEFAULT_GREEN_MIN_SECS: u32 = 5;

/// Default maximum green per lane in seconds.
pub const DEFAULT_GREEN_MAX_SECS: u32 = 30;

/// Default age after which a lane's reading is considered stale.
pub const DEFAULT_STALENESS_WINDOW_SECS: f64 = 4.0;

// =============================================================================
// Publishing
// =============================================================================

/// Default total publish attempts per cycle.
pub const DEFAULT_PUBLISH_MAX_ATTEMPTS: u32 = 4;

/// Default delay before the first publish retry.
pub const DEFAULT_PUBLISH_BASE_DELAY_MS: u64 = 100;

/// Default cap on a single publish backoff delay.
pub const DEFAULT_PUBLISH_MAX_DELAY_MS: u64 = 2_000;

/// Default timeout for one publish call.
pub const DEFAULT_PUBLISH_ATTEMPT_TIMEOUT_MS: u64 = 1_000;

// =============================================================================
// Transport
// =============================================================================

/// Default port telemetry datagrams are received on.
pub const DEFAULT_LISTEN_PORT: u16 = 47_300;

/// Default port of the local actuator peer.
pub const DEFAULT_COMMAND_PORT: u16 = 47_301;

/// Default inbound telemetry queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default socket receive timeout.
pub const DEFAULT_TRANSPORT_RECV_TIMEOUT_MS: u64 = 500;

/// Default receive timeout of the ingest loop.
pub const DEFAULT_INGEST_RECV_TIMEOUT_MS: u64 = 500;

pub fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT))
}

pub fn default_command_peers() -> Vec<SocketAddr> {
    vec![SocketAddr::from(([127, 0, 0, 1], DEFAULT_COMMAND_PORT))]
}

// =============================================================================
// Monitor
// =============================================================================

pub use crate::state::DEFAULT_LATENCY_WINDOW;

/// Default interval between status reports written to the log.
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 10;

// =============================================================================
// Controller and logging
// =============================================================================

/// Intersection managed when none are configured explicitly.
pub const DEFAULT_INTERSECTION_ID: &str = "intersection_1";

/// Default log file name.
pub const DEFAULT_LOG_FILE_NAME: &str = "signal-controller.log";

/// Default log file location (~/.signal-controller/signal-controller.log).
pub fn default_log_file() -> PathBuf {
    super::file::config_directory().join(DEFAULT_LOG_FILE_NAME)
}

// =============================================================================
// ConfigFile defaults
// =============================================================================

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            cycle_length: DEFAULT_CYCLE_LENGTH_SECS,
            yellow: DEFAULT_YELLOW_SECS,
            lane_yellow: PerLane::uniform(None),
            green_min: DEFAULT_GREEN_MIN_SECS,
            green_max: DEFAULT_GREEN_MAX_SECS,
            staleness_window_secs: DEFAULT_STALENESS_WINDOW_SECS,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            controller: ControllerSettings {
                intersections: vec![DEFAULT_INTERSECTION_ID.to_string()],
            },
            timing: TimingSettings::default(),
            overrides: BTreeMap::new(),
            publish: PublishSettings {
                max_attempts: DEFAULT_PUBLISH_MAX_ATTEMPTS,
                base_delay_ms: DEFAULT_PUBLISH_BASE_DELAY_MS,
                max_delay_ms: DEFAULT_PUBLISH_MAX_DELAY_MS,
                attempt_timeout_ms: DEFAULT_PUBLISH_ATTEMPT_TIMEOUT_MS,
            },
            transport: TransportSettings {
                listen_addr: default_listen_addr(),
                command_peers: default_command_peers(),
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                recv_timeout_ms: DEFAULT_TRANSPORT_RECV_TIMEOUT_MS,
            },
            monitor: MonitorSettings {
                latency_window: DEFAULT_LATENCY_WINDOW,
                report_interval_secs: DEFAULT_REPORT_INTERVAL_SECS,
            },
            logging: LoggingSettings {
                file: default_log_file(),
            },
        }
    }
}
