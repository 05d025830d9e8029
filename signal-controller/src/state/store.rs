//! Concurrent store of all managed intersections.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use super::intersection::{IntersectionSnapshot, IntersectionState};
use super::lane::ApplyOutcome;
use crate::config::IntersectionConfig;
use crate::scheduler::PhaseSchedule;
use crate::telemetry::TelemetryReading;

/// Store lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("intersection '{0}' is not managed by this controller")]
    UnknownIntersection(String),
}

/// All intersection state, one lock per intersection.
///
/// The set of intersections is fixed at construction, so the id → slot map
/// is read without locking. Every operation takes at most one
/// intersection's lock and never holds it across an await point.
#[derive(Debug)]
pub struct StateStore {
    intersections: Vec<RwLock<IntersectionState>>,
    index: HashMap<String, usize>,
}

impl StateStore {
    /// Create state for each configured intersection.
    ///
    /// Every intersection starts at cycle 0 whose boundary is one cycle
    /// before `first_cycle_start`, so the first computed schedule begins
    /// exactly at `first_cycle_start`.
    pub fn new(configs: &[IntersectionConfig], latency_window: usize, first_cycle_start: f64) -> Self {
        let mut intersections = Vec::with_capacity(configs.len());
        let mut index = HashMap::with_capacity(configs.len());

        for config in configs {
            if index.contains_key(&config.id) {
                tracing::warn!(intersection = %config.id, "Duplicate intersection ignored");
                continue;
            }
            index.insert(config.id.clone(), intersections.len());
            intersections.push(RwLock::new(IntersectionState::new(
                config.id.clone(),
                config.timing,
                latency_window,
                first_cycle_start - f64::from(config.timing.cycle_length()),
            )));
        }

        Self {
            intersections,
            index,
        }
    }

    fn slot(&self, id: &str) -> Result<&RwLock<IntersectionState>, StoreError> {
        self.index
            .get(id)
            .map(|&i| &self.intersections[i])
            .ok_or_else(|| StoreError::UnknownIntersection(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.intersections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intersections.is_empty()
    }

    /// Intersection ids in configuration order.
    pub fn ids(&self) -> Vec<String> {
        self.intersections
            .iter()
            .map(|slot| slot.read().intersection_id.clone())
            .collect()
    }

    /// Apply a validated reading to its lane.
    pub fn apply(
        &self,
        reading: &TelemetryReading,
        receipt_time: f64,
    ) -> Result<ApplyOutcome, StoreError> {
        let slot = self.slot(&reading.intersection_id)?;
        Ok(slot.write().apply(reading, receipt_time))
    }

    /// Consistent copy of one intersection.
    pub fn snapshot(&self, id: &str) -> Result<IntersectionSnapshot, StoreError> {
        Ok(self.slot(id)?.read().snapshot())
    }

    /// Record that `schedule` is now the active cycle.
    pub fn commit_cycle(&self, id: &str, schedule: &PhaseSchedule) -> Result<(), StoreError> {
        let mut state = self.slot(id)?.write();
        state.cycle_count = schedule.cycle_count;
        state.cycle_start_ts = schedule.cycle_start_ts;
        Ok(())
    }

    /// Remember `schedule` as the last one the transport accepted.
    pub fn record_published(&self, id: &str, schedule: PhaseSchedule) -> Result<(), StoreError> {
        self.slot(id)?.write().last_published_schedule = Some(schedule);
        Ok(())
    }

    pub fn last_published(&self, id: &str) -> Result<Option<PhaseSchedule>, StoreError> {
        Ok(self.slot(id)?.read().last_published_schedule.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingConfig;
    use crate::lane::{Lane, PerLane};
    use crate::state::Disposition;
    use std::sync::Arc;

    fn store(ids: &[&str]) -> StateStore {
        let configs: Vec<_> = ids
            .iter()
            .map(|id| IntersectionConfig::new(*id, TimingConfig::default()))
            .collect();
        StateStore::new(&configs, 30, 1_000.0)
    }

    fn reading(id: &str, lane: Lane, seq: u64, density: f64) -> TelemetryReading {
        TelemetryReading {
            intersection_id: id.into(),
            lane,
            density_pct: density,
            queue_len: 0,
            seq,
            ts: 1_000.0,
        }
    }

    #[test]
    fn test_unknown_intersection() {
        let store = store(&["a"]);
        assert!(!store.contains("b"));
        assert_eq!(
            store.apply(&reading("b", Lane::North, 0, 1.0), 1_000.0),
            Err(StoreError::UnknownIntersection("b".into()))
        );
        assert!(store.snapshot("b").is_err());
    }

    #[test]
    fn test_intersections_are_independent() {
        let store = store(&["a", "b"]);
        store
            .apply(&reading("a", Lane::East, 0, 70.0), 1_000.1)
            .unwrap();

        let a = store.snapshot("a").unwrap();
        let b = store.snapshot("b").unwrap();
        assert_eq!(a.lanes[Lane::East].density_pct, 70.0);
        assert_eq!(b.lanes[Lane::East].density_pct, 0.0);
        assert_eq!(b.lanes[Lane::East].messages_received, 0);
        assert_eq!(store.ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_cycle_zero_precedes_first_start() {
        let store = store(&["a"]);
        let snapshot = store.snapshot("a").unwrap();
        assert_eq!(snapshot.cycle_count, 0);
        assert_eq!(snapshot.cycle_start_ts, 940.0);
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let store = store(&["a", "a"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cycle_and_publish_bookkeeping() {
        let store = store(&["a"]);
        let schedule = PhaseSchedule::new(
            "a",
            1_060.0,
            60,
            1,
            PerLane::new([12, 12, 12, 12]),
            PerLane::uniform(3),
        );

        store.commit_cycle("a", &schedule).unwrap();
        let snapshot = store.snapshot("a").unwrap();
        assert_eq!(snapshot.cycle_count, 1);
        assert_eq!(snapshot.cycle_start_ts, 1_060.0);
        assert!(snapshot.last_published_schedule.is_none());

        store.record_published("a", schedule.clone()).unwrap();
        assert_eq!(store.last_published("a").unwrap(), Some(schedule));
    }

    #[test]
    fn test_concurrent_appliers() {
        let store = Arc::new(store(&["a"]));
        let handles: Vec<_> = Lane::ALL
            .into_iter()
            .map(|lane| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for seq in 0..100 {
                        let outcome = store
                            .apply(&reading("a", lane, seq, seq as f64 / 2.0), 1_000.0)
                            .unwrap();
                        assert_eq!(outcome.disposition, Disposition::InOrder);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = store.snapshot("a").unwrap();
        for (_, lane) in snapshot.lanes.iter() {
            assert_eq!(lane.messages_received, 100);
            assert_eq!(lane.messages_lost, 0);
            assert_eq!(lane.last_seq, Some(99));
        }
    }
}
