//! Loss and latency monitor.
//!
//! A read-only projection of the state store and the metrics counters for
//! the external state-query interface. Nothing here mutates controller
//! state; every query works from a fresh snapshot.

mod report;

pub use report::{ControllerReport, IntersectionReport, LaneReport, LatencyStats};

use std::sync::Arc;

use crate::clock::Clock;
use crate::metrics::{ControllerMetrics, SharedMetricsState};
use crate::state::{StateStore, StoreError};

/// Pull interface for observers of a running controller.
pub trait StateQuery: Send + Sync {
    /// Managed intersection ids in configuration order.
    fn intersection_ids(&self) -> Vec<String>;

    /// Report for one intersection.
    fn intersection(&self, id: &str) -> Result<IntersectionReport, StoreError>;

    /// Process-wide counters.
    fn counters(&self) -> ControllerMetrics;

    /// Reports for every intersection plus the counters.
    fn report(&self) -> ControllerReport;
}

/// [`StateQuery`] over a [`StateStore`] and the metrics daemon's state.
#[derive(Clone)]
pub struct Monitor {
    store: Arc<StateStore>,
    metrics: Option<SharedMetricsState>,
    clock: Arc<dyn Clock>,
}

impl Monitor {
    pub fn new(store: Arc<StateStore>, metrics: Option<SharedMetricsState>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            metrics,
            clock,
        }
    }
}

impl StateQuery for Monitor {
    fn intersection_ids(&self) -> Vec<String> {
        self.store.ids()
    }

    fn intersection(&self, id: &str) -> Result<IntersectionReport, StoreError> {
        let snapshot = self.store.snapshot(id)?;
        Ok(IntersectionReport::from_snapshot(&snapshot, self.clock.now()))
    }

    fn counters(&self) -> ControllerMetrics {
        self.metrics
            .as_ref()
            .map(|state| state.read().clone())
            .unwrap_or_default()
    }

    fn report(&self) -> ControllerReport {
        let now = self.clock.now();
        let intersections = self
            .store
            .ids()
            .iter()
            .filter_map(|id| self.store.snapshot(id).ok())
            .map(|snapshot| IntersectionReport::from_snapshot(&snapshot, now))
            .collect();
        ControllerReport {
            generated_at: now,
            intersections,
            counters: self.counters(),
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("intersections", &self.store.len())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
