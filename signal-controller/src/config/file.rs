//! Configuration file handling for ~/.signal-controller/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::warn;

use super::controller::{ControllerConfig, IntersectionConfig, PublishConfig};
use super::parser::{invalid, INTERSECTION_SECTION_PREFIX};
use super::settings::{ConfigFile, TimingSettings};
use super::timing::{BoundsConflict, TimingError};
use crate::transport::UdpTransportConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.signal-controller/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// Effective timing for one intersection: `[timing]` plus its overrides.
    pub fn timing_for(&self, intersection_id: &str) -> TimingSettings {
        match self.overrides.get(intersection_id) {
            Some(overrides) => overrides.apply_to(&self.timing),
            None => self.timing,
        }
    }

    /// Check the cross-field rules that single-key parsing cannot.
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        if self.controller.intersections.is_empty() {
            return Err(invalid(
                "controller",
                "intersections",
                "",
                "at least one intersection is required",
            ));
        }
        if self.publish.max_attempts == 0 {
            return Err(invalid(
                "publish",
                "max_attempts",
                "0",
                "must be a positive integer",
            ));
        }

        for id in &self.controller.intersections {
            let section = if self.overrides.contains_key(id) {
                format!("{INTERSECTION_SECTION_PREFIX}{id}")
            } else {
                "timing".to_string()
            };
            let settings = self.timing_for(id);
            if let Err(e) = settings.to_timing_config().validate() {
                let (key, value) = match e {
                    TimingError::ZeroCycle | TimingError::NoGreenTime { .. } => {
                        ("cycle_length", settings.cycle_length.to_string())
                    }
                    TimingError::InvertedBounds { green_min, .. } => {
                        ("green_min", green_min.to_string())
                    }
                };
                return Err(invalid(&section, key, &value, &e.to_string()));
            }
        }
        Ok(())
    }

    /// Build the runtime configuration, warning about unsatisfiable bounds.
    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigFileError> {
        self.validate()?;

        let intersections = self
            .controller
            .intersections
            .iter()
            .map(|id| {
                let timing = self.timing_for(id).to_timing_config();
                match timing.bounds_conflict() {
                    Some(BoundsConflict::MinimumTooLarge {
                        required,
                        available,
                    }) => warn!(
                        intersection = %id,
                        required,
                        available,
                        "green_min cannot be honoured for every lane; schedules will favour north"
                    ),
                    Some(BoundsConflict::MaximumTooSmall { allowed, available }) => warn!(
                        intersection = %id,
                        allowed,
                        available,
                        "green_max cannot absorb the available green; surplus goes to north"
                    ),
                    None => {}
                }
                IntersectionConfig::new(id.clone(), timing)
            })
            .collect();

        Ok(ControllerConfig {
            intersections,
            publish: PublishConfig {
                max_attempts: self.publish.max_attempts,
                base_delay: Duration::from_millis(self.publish.base_delay_ms),
                max_delay: Duration::from_millis(self.publish.max_delay_ms),
                attempt_timeout: Duration::from_millis(self.publish.attempt_timeout_ms),
            },
            latency_window: self.monitor.latency_window,
            ..ControllerConfig::default()
        })
    }

    pub fn transport_config(&self) -> UdpTransportConfig {
        UdpTransportConfig {
            listen_addr: self.transport.listen_addr,
            command_peers: self.transport.command_peers.clone(),
            queue_capacity: self.transport.queue_capacity,
            recv_timeout: Duration::from_millis(self.transport.recv_timeout_ms),
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.report_interval_secs)
    }
}

/// Get the path to the config directory (~/.signal-controller).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".signal-controller")
}

/// Get the path to the config file (~/.signal-controller/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use crate::config::TimingOverrides;
    use crate::lane::Lane;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.controller.intersections, vec!["intersection_1"]);
        assert_eq!(config.timing.cycle_length, DEFAULT_CYCLE_LENGTH_SECS);
        assert_eq!(config.publish.max_attempts, DEFAULT_PUBLISH_MAX_ATTEMPTS);
        assert_eq!(config.monitor.latency_window, DEFAULT_LATENCY_WINDOW);
        assert!(config.overrides.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.controller.intersections = vec!["a".into(), "b".into()];
        config.timing.cycle_length = 80;
        config.timing.lane_yellow[Lane::South] = Some(4);
        config.publish.max_attempts = 2;
        config.transport.queue_capacity = 16;
        config.overrides.insert(
            "b".into(),
            TimingOverrides {
                green_max: Some(45),
                ..Default::default()
            },
        );

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_controller_config_applies_overrides() {
        let mut config = ConfigFile::default();
        config.controller.intersections = vec!["a".into(), "b".into()];
        config.overrides.insert(
            "b".into(),
            TimingOverrides {
                cycle_length: Some(100),
                ..Default::default()
            },
        );

        let controller = config.controller_config().unwrap();
        assert_eq!(controller.intersections.len(), 2);
        assert_eq!(controller.intersections[0].timing.cycle_length(), 60);
        assert_eq!(controller.intersections[1].timing.cycle_length(), 100);
        assert_eq!(
            controller.publish.base_delay,
            Duration::from_millis(DEFAULT_PUBLISH_BASE_DELAY_MS)
        );
    }

    #[test]
    fn test_controller_config_rejects_invalid_override() {
        let mut config = ConfigFile::default();
        config.overrides.insert(
            "intersection_1".into(),
            TimingOverrides {
                green_min: Some(40),
                green_max: Some(10),
                ..Default::default()
            },
        );

        match config.controller_config().unwrap_err() {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "intersection.intersection_1");
                assert_eq!(key, "green_min");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_transport_config() {
        let config = ConfigFile::default();
        let transport = config.transport_config();
        assert_eq!(transport.listen_addr, default_listen_addr());
        assert_eq!(transport.command_peers, default_command_peers());
        assert_eq!(
            transport.recv_timeout,
            Duration::from_millis(DEFAULT_TRANSPORT_RECV_TIMEOUT_MS)
        );
    }
}
