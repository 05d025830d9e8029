//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::{ConfigFile, TimingOverrides};
use crate::lane::Lane;

/// Prefix of per-intersection override sections.
pub(super) const INTERSECTION_SECTION_PREFIX: &str = "intersection.";

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()`, overlays any values found in the INI
/// and validates the result.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [controller] section
    if let Some(section) = ini.section(Some("controller")) {
        if let Some(v) = section.get("intersections") {
            config.controller.intersections = parse_intersection_list(v)?;
        }
    }

    // [timing] section
    if let Some(section) = ini.section(Some("timing")) {
        let overrides = parse_timing_section("timing", section)?;
        config.timing = overrides.apply_to(&config.timing);
    }

    // [intersection.<id>] sections
    for (name, section) in ini.iter() {
        let Some(id) = name.and_then(|n| n.strip_prefix(INTERSECTION_SECTION_PREFIX)) else {
            continue;
        };
        let section_name = format!("{INTERSECTION_SECTION_PREFIX}{id}");
        if !config.controller.intersections.iter().any(|i| i == id) {
            return Err(ConfigFileError::InvalidValue {
                section: section_name,
                key: "-".to_string(),
                value: id.to_string(),
                reason: "intersection is not listed in [controller] intersections".to_string(),
            });
        }
        let overrides = parse_timing_section(&section_name, section)?;
        config.overrides.insert(id.to_string(), overrides);
    }

    // [publish] section
    if let Some(section) = ini.section(Some("publish")) {
        if let Some(v) = section.get("max_attempts") {
            config.publish.max_attempts =
                parse_positive("publish", "max_attempts", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("base_delay_ms") {
            config.publish.base_delay_ms = parse_value(
                "publish",
                "base_delay_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("max_delay_ms") {
            config.publish.max_delay_ms = parse_value(
                "publish",
                "max_delay_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("attempt_timeout_ms") {
            config.publish.attempt_timeout_ms = parse_positive(
                "publish",
                "attempt_timeout_ms",
                v,
                "must be a positive integer (milliseconds)",
            )?;
        }
    }

    // [transport] section
    if let Some(section) = ini.section(Some("transport")) {
        if let Some(v) = section.get("listen_addr") {
            config.transport.listen_addr = parse_value(
                "transport",
                "listen_addr",
                v,
                "expected host:port like '0.0.0.0:47300'",
            )?;
        }
        if let Some(v) = section.get("command_peers") {
            config.transport.command_peers = parse_peer_list(v)?;
        }
        if let Some(v) = section.get("queue_capacity") {
            config.transport.queue_capacity =
                parse_positive("transport", "queue_capacity", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("recv_timeout_ms") {
            config.transport.recv_timeout_ms = parse_positive(
                "transport",
                "recv_timeout_ms",
                v,
                "must be a positive integer (milliseconds)",
            )?;
        }
    }

    // [monitor] section
    if let Some(section) = ini.section(Some("monitor")) {
        if let Some(v) = section.get("latency_window") {
            config.monitor.latency_window = parse_positive(
                "monitor",
                "latency_window",
                v,
                "must be a positive integer (samples)",
            )?;
        }
        if let Some(v) = section.get("report_interval_secs") {
            config.monitor.report_interval_secs = parse_positive(
                "monitor",
                "report_interval_secs",
                v,
                "must be a positive integer (seconds)",
            )?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    config.validate()?;
    Ok(config)
}

/// Parse the timing keys shared by `[timing]` and `[intersection.<id>]`.
fn parse_timing_section(
    section_name: &str,
    section: &Properties,
) -> Result<TimingOverrides, ConfigFileError> {
    let mut overrides = TimingOverrides::default();

    for (key, v) in section.iter() {
        match key {
            "cycle_length" => {
                overrides.cycle_length = Some(parse_positive(
                    section_name,
                    key,
                    v,
                    "must be a positive integer (seconds)",
                )?);
            }
            "yellow" => {
                overrides.yellow = Some(parse_value(
                    section_name,
                    key,
                    v,
                    "must be a non-negative integer (seconds)",
                )?);
            }
            "green_min" => {
                overrides.green_min = Some(parse_value(
                    section_name,
                    key,
                    v,
                    "must be a non-negative integer (seconds)",
                )?);
            }
            "green_max" => {
                overrides.green_max = Some(parse_value(
                    section_name,
                    key,
                    v,
                    "must be a non-negative integer (seconds)",
                )?);
            }
            "staleness_window_secs" => {
                let window: f64 = parse_value(
                    section_name,
                    key,
                    v,
                    "must be a non-negative number (seconds)",
                )?;
                if !window.is_finite() || window < 0.0 {
                    return Err(invalid(
                        section_name,
                        key,
                        v,
                        "must be a non-negative number (seconds)",
                    ));
                }
                overrides.staleness_window_secs = Some(window);
            }
            other => match other.strip_prefix("yellow_").map(Lane::from_str) {
                Some(Ok(lane)) => {
                    overrides.lane_yellow[lane] = Some(parse_value(
                        section_name,
                        key,
                        v,
                        "must be a non-negative integer (seconds)",
                    )?);
                }
                Some(Err(e)) => return Err(invalid(section_name, key, v, &e.to_string())),
                None => {
                    tracing::warn!(section = section_name, key, "Ignoring unknown timing key");
                }
            },
        }
    }

    Ok(overrides)
}

fn parse_intersection_list(value: &str) -> Result<Vec<String>, ConfigFileError> {
    let mut ids: Vec<String> = Vec::new();
    for id in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if ids.iter().any(|existing| existing == id) {
            return Err(invalid(
                "controller",
                "intersections",
                value,
                &format!("duplicate intersection '{id}'"),
            ));
        }
        if id.contains('/') || id.contains('+') || id.contains('#') {
            return Err(invalid(
                "controller",
                "intersections",
                value,
                &format!("intersection '{id}' contains a topic separator or wildcard"),
            ));
        }
        ids.push(id.to_string());
    }
    if ids.is_empty() {
        return Err(invalid(
            "controller",
            "intersections",
            value,
            "at least one intersection is required",
        ));
    }
    Ok(ids)
}

fn parse_peer_list(value: &str) -> Result<Vec<SocketAddr>, ConfigFileError> {
    let peers = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|peer| {
            peer.parse::<SocketAddr>().map_err(|_| {
                invalid(
                    "transport",
                    "command_peers",
                    value,
                    &format!("'{peer}' is not a host:port address"),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if peers.is_empty() {
        return Err(invalid(
            "transport",
            "command_peers",
            value,
            "at least one command peer is required",
        ));
    }
    Ok(peers)
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive<T>(section: &str, key: &str, value: &str, reason: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    let parsed: T = parse_value(section, key, value, reason)?;
    if parsed <= T::default() {
        return Err(invalid(section, key, value, reason));
    }
    Ok(parsed)
}

pub(super) fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_yields_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_full_sections() {
        let config = parse(
            r#"
[controller]
intersections = north_gate, harbour_rd

[timing]
cycle_length = 90
yellow = 4
yellow_east = 5
green_min = 8
green_max = 40
staleness_window_secs = 2.5

[intersection.harbour_rd]
cycle_length = 120

[publish]
max_attempts = 6
base_delay_ms = 50
max_delay_ms = 800
attempt_timeout_ms = 250

[transport]
listen_addr = 127.0.0.1:9000
command_peers = 127.0.0.1:9001, 127.0.0.1:9002
queue_capacity = 64
recv_timeout_ms = 100

[monitor]
latency_window = 10
report_interval_secs = 5

[logging]
file = /var/log/signal.log
"#,
        )
        .unwrap();

        assert_eq!(
            config.controller.intersections,
            vec!["north_gate".to_string(), "harbour_rd".to_string()]
        );
        assert_eq!(config.timing.cycle_length, 90);
        assert_eq!(config.timing.yellow_for(Lane::East), 5);
        assert_eq!(config.timing.yellow_for(Lane::West), 4);
        assert_eq!(config.timing.staleness_window_secs, 2.5);
        assert_eq!(config.overrides["harbour_rd"].cycle_length, Some(120));
        assert_eq!(config.publish.max_attempts, 6);
        assert_eq!(config.publish.attempt_timeout_ms, 250);
        assert_eq!(config.transport.command_peers.len(), 2);
        assert_eq!(config.transport.queue_capacity, 64);
        assert_eq!(config.monitor.latency_window, 10);
        assert_eq!(config.logging.file, PathBuf::from("/var/log/signal.log"));
    }

    #[test]
    fn test_rejects_non_numeric_cycle() {
        let err = parse("[timing]\ncycle_length = fast\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "timing");
                assert_eq!(key, "cycle_length");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_cycle_without_green_time() {
        let err = parse("[timing]\ncycle_length = 12\nyellow = 3\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "cycle_length"
        ));
    }

    #[test]
    fn test_rejects_inverted_green_bounds() {
        let err = parse("[timing]\ngreen_min = 20\ngreen_max = 10\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "green_min"
        ));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        assert!(parse("[publish]\nmax_attempts = 0\n").is_err());
    }

    #[test]
    fn test_rejects_empty_intersection_list() {
        assert!(parse("[controller]\nintersections = , \n").is_err());
    }

    #[test]
    fn test_rejects_unknown_lane_yellow() {
        let err = parse("[timing]\nyellow_up = 3\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "yellow_up"
        ));
    }

    #[test]
    fn test_rejects_override_for_unlisted_intersection() {
        assert!(parse("[intersection.ghost]\ncycle_length = 90\n").is_err());
    }

    #[test]
    fn test_override_validated_per_intersection() {
        let err = parse(
            "[controller]\nintersections = a, b\n[intersection.b]\ncycle_length = 10\n",
        )
        .unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, .. } => {
                assert_eq!(section, "intersection.b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_infeasible_bounds_are_accepted() {
        let config = parse("[timing]\ngreen_min = 15\n").unwrap();
        assert_eq!(config.timing.green_min, 15);
    }
}
