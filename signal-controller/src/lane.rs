//! Lane identifiers and the fixed four-slot lane container.
//!
//! Every intersection has exactly four approaches. Schedules, weights and
//! lane state are always laid out in the canonical order
//! north, south, east, west.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the four approaches of an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    North,
    South,
    East,
    West,
}

/// Error returned when a string is not one of the four lane names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown lane '{0}' (expected north, south, east or west)")]
pub struct UnknownLane(pub String);

impl Lane {
    /// All lanes in canonical order.
    pub const ALL: [Lane; 4] = [Lane::North, Lane::South, Lane::East, Lane::West];

    /// Position of this lane in canonical order.
    pub const fn index(self) -> usize {
        match self {
            Lane::North => 0,
            Lane::South => 1,
            Lane::East => 2,
            Lane::West => 3,
        }
    }

    /// Wire name of the lane.
    pub const fn as_str(self) -> &'static str {
        match self {
            Lane::North => "north",
            Lane::South => "south",
            Lane::East => "east",
            Lane::West => "west",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = UnknownLane;

    /// Parses the exact lower-case wire name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "north" => Ok(Lane::North),
            "south" => Ok(Lane::South),
            "east" => Ok(Lane::East),
            "west" => Ok(Lane::West),
            other => Err(UnknownLane(other.to_string())),
        }
    }
}

/// A value for each of the four lanes, indexed by [`Lane`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerLane<T>([T; 4]);

impl<T> PerLane<T> {
    /// Build from values given in canonical order.
    pub const fn new(values: [T; 4]) -> Self {
        Self(values)
    }

    /// Build by evaluating `f` for each lane in canonical order.
    pub fn from_fn(mut f: impl FnMut(Lane) -> T) -> Self {
        Self(Lane::ALL.map(&mut f))
    }

    /// Iterate `(lane, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Lane, &T)> {
        Lane::ALL.into_iter().zip(self.0.iter())
    }

    /// Apply `f` to every value, keeping lane positions.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PerLane<U> {
        PerLane(self.0.map(f))
    }

    /// Underlying values in canonical order.
    pub fn as_array(&self) -> &[T; 4] {
        &self.0
    }
}

impl<T: Copy> PerLane<T> {
    /// The same value for every lane.
    pub const fn uniform(value: T) -> Self {
        Self([value; 4])
    }
}

impl<T> Index<Lane> for PerLane<T> {
    type Output = T;

    fn index(&self, lane: Lane) -> &T {
        &self.0[lane.index()]
    }
}

impl<T> IndexMut<Lane> for PerLane<T> {
    fn index_mut(&mut self, lane: Lane) -> &mut T {
        &mut self.0[lane.index()]
    }
}
