//! Runtime configuration for the controller and its publisher.

use std::time::Duration;

use super::defaults::{
    DEFAULT_INGEST_RECV_TIMEOUT_MS, DEFAULT_LATENCY_WINDOW, DEFAULT_PUBLISH_ATTEMPT_TIMEOUT_MS,
    DEFAULT_PUBLISH_BASE_DELAY_MS, DEFAULT_PUBLISH_MAX_ATTEMPTS, DEFAULT_PUBLISH_MAX_DELAY_MS,
};
use super::timing::{TimingConfig, TimingError};

/// One configured intersection.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionConfig {
    pub id: String,
    pub timing: TimingConfig,
}

impl IntersectionConfig {
    pub fn new(id: impl Into<String>, timing: TimingConfig) -> Self {
        Self {
            id: id.into(),
            timing,
        }
    }
}

/// Retry policy for command publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishConfig {
    /// Total publish attempts per cycle, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay.
    pub max_delay: Duration,
    /// Timeout for one publish call.
    pub attempt_timeout: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_PUBLISH_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_PUBLISH_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_PUBLISH_MAX_DELAY_MS),
            attempt_timeout: Duration::from_millis(DEFAULT_PUBLISH_ATTEMPT_TIMEOUT_MS),
        }
    }
}

/// Everything the controller runtime needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub intersections: Vec<IntersectionConfig>,
    pub publish: PublishConfig,
    /// Latency samples retained per lane.
    pub latency_window: usize,
    /// Receive timeout of the telemetry loop; bounds shutdown latency.
    pub recv_timeout: Duration,
}

impl ControllerConfig {
    /// Single-intersection configuration with defaults elsewhere.
    pub fn single(id: impl Into<String>, timing: TimingConfig) -> Self {
        Self {
            intersections: vec![IntersectionConfig::new(id, timing)],
            ..Self::default()
        }
    }

    /// Validate every intersection's timing, reporting the first failure.
    pub fn validate(&self) -> Result<(), (String, TimingError)> {
        for intersection in &self.intersections {
            intersection
                .timing
                .validate()
                .map_err(|e| (intersection.id.clone(), e))?;
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            intersections: Vec::new(),
            publish: PublishConfig::default(),
            latency_window: DEFAULT_LATENCY_WINDOW,
            recv_timeout: Duration::from_millis(DEFAULT_INGEST_RECV_TIMEOUT_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_intersection() {
        let config = ControllerConfig::single("i1", TimingConfig::default());
        assert_eq!(config.intersections.len(), 1);
        assert_eq!(config.intersections[0].id, "i1");
        assert_eq!(config.publish.max_attempts, DEFAULT_PUBLISH_MAX_ATTEMPTS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_names_offending_intersection() {
        let mut config = ControllerConfig::single("good", TimingConfig::default());
        config
            .intersections
            .push(IntersectionConfig::new("bad", TimingConfig::new(8, 2)));

        let (id, err) = config.validate().unwrap_err();
        assert_eq!(id, "bad");
        assert!(matches!(err, TimingError::NoGreenTime { .. }));
    }
}
