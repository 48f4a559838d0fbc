//! The error taxonomy at the core's operation boundary.
//!
//! Every public operation returns `Result<T, TrajectoryError>`. Nothing
//! retries inside the core; retry policy belongs to the serving layer.
//! Fatal programmer errors (unit-system mismatches, assertion violations)
//! are not part of this taxonomy and surface as panics instead.

use crate::kepler::StateVector;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrajectoryError {
    #[error("designation {0:?} not found in catalog")]
    NotFound(String),

    #[error("catalog entry {0:?} has no usable orbital elements")]
    MissingElements(String),

    #[error("unsupported orbit: {0}")]
    UnsupportedOrbit(String),

    #[error("Kepler solver did not converge after {iterations} iterations (residual {residual:e})")]
    ConvergenceFailure { iterations: u32, residual: f64 },

    #[error("integrator failed to meet tolerance at t={failing_time}: {reason}")]
    IntegrationFailure {
        last_good_state: StateVector,
        failing_time: f64,
        reason: String,
    },

    #[error("planet position requested outside ephemeris coverage at t={0}")]
    EphemerisUnavailable(f64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Shorthand for the core's fallible return type.
pub type CoreResult<T> = Result<T, TrajectoryError>;
