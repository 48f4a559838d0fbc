//! Shared trajectory data types produced by both propagators:
//! `TrajectorySample`, `TrajectoryResult`, and the method tag that
//! distinguishes which propagator produced a result.

use crate::kepler::StateVector;
use crate::vector::Vector3;

/// Which propagator produced a `TrajectoryResult`. A closed set — the
/// serving boundary rejects any other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Method {
    TwoBody,
    NBody,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::TwoBody => "twobody",
            Method::NBody => "nbody",
        }
    }
}

/// A single point in an emitted trajectory series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrajectorySample {
    pub time: f64,
    pub days_from_epoch: f64,
    pub position: Vector3,
    pub distance_from_sun: f64,
}

impl TrajectorySample {
    pub fn new(time: f64, epoch: f64, position: Vector3) -> Self {
        Self {
            time,
            days_from_epoch: time - epoch,
            distance_from_sun: position.norm(),
            position,
        }
    }
}

/// The full result of one propagation request.
///
/// Invariants: `samples[0].time == start_time`, `samples.last().time ==
/// end_time`, `samples.len() == num_points >= 2`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrajectoryResult {
    pub designation: String,
    pub method: Method,
    pub start_time: f64,
    pub end_time: f64,
    pub num_points: usize,
    pub samples: Vec<TrajectorySample>,
    pub final_state: StateVector,
    pub calculation_time_seconds: f64,
}

impl TrajectoryResult {
    /// Sample times for a uniform grid over `[start, end]` with
    /// `num_points` points: t_start + k*(t_end - t_start)/(num_points - 1).
    pub fn sample_times(start: f64, end: f64, num_points: usize) -> Vec<f64> {
        if num_points == 1 {
            return vec![start];
        }
        let step = (end - start) / (num_points - 1) as f64;
        (0..num_points).map(|k| start + step * k as f64).collect()
    }
}
