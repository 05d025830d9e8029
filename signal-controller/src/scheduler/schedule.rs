//! Phase schedule types and the command-channel wire format.

use serde::{Deserialize, Serialize};

use crate::lane::{Lane, PerLane};

/// Algorithm tag carried in every command payload.
pub const ALGORITHM: &str = "density_weighted_water_filling";

/// One lane's allotment within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseEntry {
    pub lane: Lane,
    pub green: u32,
    pub yellow: u32,
}

/// A complete cycle plan for one intersection.
///
/// Entries are always in canonical lane order and
/// `Σ(green + yellow) == cycle_length`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSchedule {
    pub intersection_id: String,
    pub cycle_start_ts: f64,
    pub cycle_length: u32,
    pub cycle_count: u64,
    #[serde(rename = "phase_schedule")]
    pub entries: [PhaseEntry; 4],
    pub algorithm: String,
}

impl PhaseSchedule {
    pub fn new(
        intersection_id: impl Into<String>,
        cycle_start_ts: f64,
        cycle_length: u32,
        cycle_count: u64,
        greens: PerLane<u32>,
        yellows: PerLane<u32>,
    ) -> Self {
        let entries = Lane::ALL.map(|lane| PhaseEntry {
            lane,
            green: greens[lane],
            yellow: yellows[lane],
        });
        Self {
            intersection_id: intersection_id.into(),
            cycle_start_ts,
            cycle_length,
            cycle_count,
            entries,
            algorithm: ALGORITHM.to_string(),
        }
    }

    /// Green seconds per lane.
    pub fn greens(&self) -> PerLane<u32> {
        PerLane::new(self.entries.map(|e| e.green))
    }

    pub fn green(&self, lane: Lane) -> u32 {
        self.entries[lane.index()].green
    }

    /// Σ(green + yellow) over all four entries.
    pub fn total_seconds(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| u64::from(e.green) + u64::from(e.yellow))
            .sum()
    }

    /// Whether the sum invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.total_seconds() == u64::from(self.cycle_length)
            && self
                .entries
                .iter()
                .zip(Lane::ALL)
                .all(|(entry, lane)| entry.lane == lane)
    }

    /// Serialize to the command-channel JSON payload.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a command-channel payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> PhaseSchedule {
        PhaseSchedule::new(
            "intersection_1",
            1_700_000_060.0,
            60,
            2,
            PerLane::new([27, 7, 7, 7]),
            PerLane::uniform(3),
        )
    }

    #[test]
    fn test_wire_shape() {
        let value: Value = serde_json::from_slice(&sample().to_payload().unwrap()).unwrap();

        assert_eq!(value["intersection_id"], "intersection_1");
        assert_eq!(value["cycle_length"], 60);
        assert_eq!(value["cycle_start_ts"], 1_700_000_060.0);
        assert_eq!(value["algorithm"], ALGORITHM);

        let phases = value["phase_schedule"].as_array().unwrap();
        assert_eq!(phases.len(), 4);
        assert_eq!(phases[0]["lane"], "north");
        assert_eq!(phases[0]["green"], 27);
        assert_eq!(phases[0]["yellow"], 3);
        assert_eq!(phases[3]["lane"], "west");
    }

    #[test]
    fn test_consistency_check() {
        let schedule = sample();
        assert_eq!(schedule.total_seconds(), 60);
        assert!(schedule.is_consistent());

        let mut broken = schedule.clone();
        broken.entries[1].green += 1;
        assert!(!broken.is_consistent());
    }

    #[test]
    fn test_payload_parses_back() {
        let schedule = sample();
        let parsed = PhaseSchedule::from_payload(&schedule.to_payload().unwrap()).unwrap();
        assert_eq!(parsed, schedule);
        assert_eq!(parsed.green(Lane::North), 27);
    }
}
