//! Wire-format DTOs for the serving boundary: plain, serde-derived
//! structs that mirror the domain types but commit to a stable external
//! shape independent of internal refactors.

use crate::kepler::StateVector;
use crate::trajectory::{Method, TrajectoryResult, TrajectorySample};
use crate::vector::Vector3;
use serde::{Deserialize, Serialize};

/// The one bit-level shape that must stay stable across process restarts:
/// a continuation picks a trajectory back up from exactly this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVectorWire {
    pub position: Vector3,
    pub velocity: Vector3,
    pub time: f64,
}

impl From<StateVector> for StateVectorWire {
    fn from(state: StateVector) -> Self {
        Self { position: state.position, velocity: state.velocity, time: state.time }
    }
}

impl From<StateVectorWire> for StateVector {
    fn from(wire: StateVectorWire) -> Self {
        StateVector::new(wire.position, wire.velocity, wire.time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectorySampleWire {
    pub time_jd: f64,
    pub days_from_epoch: f64,
    pub position_au: [f64; 3],
    pub distance_from_sun_au: f64,
}

impl From<TrajectorySample> for TrajectorySampleWire {
    fn from(sample: TrajectorySample) -> Self {
        Self {
            time_jd: sample.time,
            days_from_epoch: sample.days_from_epoch,
            position_au: [sample.position.x, sample.position.y, sample.position.z],
            distance_from_sun_au: sample.distance_from_sun,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryResultWire {
    pub designation: String,
    pub method: Method,
    pub start_time_jd: f64,
    pub end_time_jd: f64,
    pub samples: Vec<TrajectorySampleWire>,
    pub final_state: StateVectorWire,
    pub calculation_time_seconds: f64,
}

impl From<TrajectoryResult> for TrajectoryResultWire {
    fn from(result: TrajectoryResult) -> Self {
        Self {
            designation: result.designation,
            method: result.method,
            start_time_jd: result.start_time,
            end_time_jd: result.end_time,
            samples: result.samples.into_iter().map(Into::into).collect(),
            final_state: result.final_state.into(),
            calculation_time_seconds: result.calculation_time_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_vector_round_trip() {
        let original = StateVector::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.1, 0.2, 0.3), 2451545.0);
        let wire: StateVectorWire = original.into();
        let recovered: StateVector = wire.into();
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_trajectory_result_wire_preserves_designation() {
        let result = TrajectoryResult {
            designation: "Earth-analog".to_string(),
            method: Method::TwoBody,
            start_time: 2451545.0,
            end_time: 2451546.0,
            num_points: 2,
            samples: vec![TrajectorySample::new(2451545.0, 2451545.0, Vector3::new(1.0, 0.0, 0.0))],
            final_state: StateVector::new(Vector3::new(1.0, 0.0, 0.0), Vector3::ZERO, 2451546.0),
            calculation_time_seconds: 0.001,
        };
        let wire: TrajectoryResultWire = result.into();
        assert_eq!(wire.designation, "Earth-analog");
        assert_eq!(wire.samples.len(), 1);
    }
}
