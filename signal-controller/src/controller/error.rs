//! Controller runtime errors.

use thiserror::Error;

use crate::config::TimingError;
use crate::state::StoreError;

/// Errors starting or driving the controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no intersections configured")]
    NoIntersections,

    #[error("invalid timing for intersection '{id}': {source}")]
    InvalidTiming {
        id: String,
        #[source]
        source: TimingError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
