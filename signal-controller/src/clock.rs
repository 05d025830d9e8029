//! Controller-local time source.
//!
//! Telemetry timestamps and cycle boundaries are Unix seconds (fractional).
//! The [`Clock`] trait lets the runtime read "now" without caring whether it
//! comes from the wall clock or from the tokio timer.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of controller-local Unix time in seconds.
pub trait Clock: Send + Sync {
    /// Current Unix time in fractional seconds.
    fn now(&self) -> f64;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        unix_now()
    }
}

/// Clock anchored at a Unix time and advanced by the tokio timer.
///
/// Under `tokio::time::pause()` this clock only moves when the runtime
/// auto-advances or a test calls `tokio::time::advance`, which keeps cycle
/// timers and receipt timestamps in lock-step.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor_unix: f64,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    /// Anchor the clock so that `now()` returns `anchor_unix` at this instant.
    pub fn starting_at(anchor_unix: f64) -> Self {
        Self {
            anchor_unix,
            anchor: tokio::time::Instant::now(),
        }
    }

    /// Anchor the clock at the current wall-clock time.
    pub fn from_system() -> Self {
        Self::starting_at(unix_now())
    }
}

impl Clock for TokioClock {
    fn now(&self) -> f64 {
        self.anchor_unix + self.anchor.elapsed().as_secs_f64()
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
