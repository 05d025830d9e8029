//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::fmt::Write;
use std::path::Path;

use super::parser::INTERSECTION_SECTION_PREFIX;
use super::settings::{ConfigFile, TimingOverrides};
use crate::lane::{Lane, PerLane};

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let intersections = config.controller.intersections.join(", ");
    let lane_yellow = lane_yellow_lines(&config.timing.lane_yellow);
    let command_peers = config
        .transport
        .command_peers
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = format!(
        r#"[controller]
; Comma-separated intersection identifiers managed by this controller.
; Telemetry is accepted on traffic/<id>/<lane>/density for each of them.
intersections = {}

[timing]
; Full signal cycle in seconds (default: 60)
cycle_length = {}
; Yellow time per lane in seconds (default: 3)
yellow = {}
; Per-lane yellow overrides, e.g. yellow_east = 4
{}; Green bounds per lane in seconds (defaults: 5 and 30)
; If 4 * green_min exceeds the available green, or 4 * green_max falls short
; of it, the bounds cannot all hold and the remainder is given to north.
green_min = {}
green_max = {}
; A lane with no reading for this many seconds is scheduled neutrally (default: 4)
staleness_window_secs = {}

[publish]
; Publish attempts per cycle, including the first (default: 4)
max_attempts = {}
; Backoff before the first retry, doubled on each further retry (default: 100)
base_delay_ms = {}
; Upper bound for a single backoff delay (default: 2000)
max_delay_ms = {}
; Timeout for one publish attempt (default: 1000)
attempt_timeout_ms = {}

[transport]
; Address telemetry datagrams are received on
listen_addr = {}
; Comma-separated actuator addresses that receive every command
command_peers = {}
; Inbound telemetry queue capacity; datagrams beyond it are dropped (default: 1024)
queue_capacity = {}
; Socket receive timeout in milliseconds (default: 500)
recv_timeout_ms = {}

[monitor]
; Latency samples retained per lane (default: 30)
latency_window = {}
; Seconds between status reports in the log (default: 10)
report_interval_secs = {}

[logging]
; Log file location
file = {}
"#,
        intersections,
        config.timing.cycle_length,
        config.timing.yellow,
        lane_yellow,
        config.timing.green_min,
        config.timing.green_max,
        config.timing.staleness_window_secs,
        config.publish.max_attempts,
        config.publish.base_delay_ms,
        config.publish.max_delay_ms,
        config.publish.attempt_timeout_ms,
        config.transport.listen_addr,
        command_peers,
        config.transport.queue_capacity,
        config.transport.recv_timeout_ms,
        config.monitor.latency_window,
        config.monitor.report_interval_secs,
        path_to_string(&config.logging.file),
    );

    for (id, overrides) in &config.overrides {
        out.push('\n');
        out.push_str(&override_section(id, overrides));
    }

    out
}

fn override_section(id: &str, overrides: &TimingOverrides) -> String {
    let mut section = format!(
        "[{INTERSECTION_SECTION_PREFIX}{id}]\n; Timing overrides for {id}; unset keys inherit [timing]\n"
    );
    // Writing to a String cannot fail.
    if let Some(v) = overrides.cycle_length {
        let _ = writeln!(section, "cycle_length = {v}");
    }
    if let Some(v) = overrides.yellow {
        let _ = writeln!(section, "yellow = {v}");
    }
    section.push_str(&lane_yellow_lines(&overrides.lane_yellow));
    if let Some(v) = overrides.green_min {
        let _ = writeln!(section, "green_min = {v}");
    }
    if let Some(v) = overrides.green_max {
        let _ = writeln!(section, "green_max = {v}");
    }
    if let Some(v) = overrides.staleness_window_secs {
        let _ = writeln!(section, "staleness_window_secs = {v}");
    }
    section
}

fn lane_yellow_lines(lane_yellow: &PerLane<Option<u32>>) -> String {
    Lane::ALL
        .iter()
        .filter_map(|&lane| lane_yellow[lane].map(|v| format!("yellow_{lane} = {v}\n")))
        .collect()
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_every_section() {
        let content = to_config_string(&ConfigFile::default());
        for section in [
            "[controller]",
            "[timing]",
            "[publish]",
            "[transport]",
            "[monitor]",
            "[logging]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
        assert!(content.contains("intersections = intersection_1"));
        assert!(!content.contains("yellow_north"));
    }

    #[test]
    fn test_override_section_lists_only_set_keys() {
        let overrides = TimingOverrides {
            green_max: Some(45),
            lane_yellow: PerLane::new([None, None, Some(5), None]),
            ..Default::default()
        };
        let section = override_section("harbour_rd", &overrides);

        assert!(section.starts_with("[intersection.harbour_rd]\n"));
        assert!(section.contains("green_max = 45\n"));
        assert!(section.contains("yellow_east = 5\n"));
        assert!(!section.contains("cycle_length"));
    }
}
