//! Intersection state store.
//!
//! Holds the latest per-lane density, sequence accounting and latency
//! samples for every managed intersection, plus cycle bookkeeping and the
//! last successfully published schedule. Readers get owned snapshots.

mod intersection;
mod lane;
mod store;
mod window;

pub use intersection::{IntersectionSnapshot, IntersectionState, LaneSnapshot};
pub use lane::{ApplyOutcome, Disposition, LaneState};
pub use store::{StateStore, StoreError};
pub use window::{LatencyWindow, DEFAULT_LATENCY_WINDOW};
