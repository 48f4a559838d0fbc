//! State-vector continuation: picking up a trajectory from a previously
//! produced `StateVector` rather than a fresh set of elements.
//!
//! Two-body continuation round-trips through `cartesian_to_keplerian`,
//! which is ill-conditioned near e=1; N-body continuation never converts
//! to elements at all, so it has no such restriction.

use crate::ephemeris::EphemerisProvider;
use crate::error::{CoreResult, TrajectoryError};
use crate::kepler::{cartesian_to_keplerian, StateVector, ECCENTRICITY_NEAR_PARABOLIC_EPS};
use crate::nbody::{self, Tolerances};
use crate::planets::Planet;
use crate::trajectory::TrajectoryResult;
use crate::twobody;

/// Continue a two-body trajectory from `state` for `dt_days`, sampling
/// `num_points` points. Rejects with `UnsupportedOrbit` when the implied
/// eccentricity is within `ECCENTRICITY_NEAR_PARABOLIC_EPS` of 1.0 —
/// use `continue_nbody` for that regime instead, since it never needs
/// to reconstruct elements from the fragile near-parabolic state.
pub fn continue_twobody(
    state: &StateVector,
    dt_days: f64,
    num_points: usize,
    mu: f64,
    designation: &str,
) -> CoreResult<TrajectoryResult> {
    let elements = cartesian_to_keplerian(state, mu)?;
    if (elements.e - 1.0).abs() < ECCENTRICITY_NEAR_PARABOLIC_EPS {
        return Err(TrajectoryError::UnsupportedOrbit(format!(
            "continuation state has eccentricity {:.9}, within {} of parabolic; use N-body continuation instead",
            elements.e, ECCENTRICITY_NEAR_PARABOLIC_EPS
        )));
    }
    twobody::propagate_from_state(state, dt_days, num_points, mu, designation)
}

/// Continue an N-body trajectory from `state`. Always accepts, including
/// hyperbolic or momentarily near-parabolic states, since no element
/// conversion is involved.
pub fn continue_nbody(
    state: &StateVector,
    dt_days: f64,
    num_points: usize,
    mu_sun: f64,
    ephemeris: &dyn EphemerisProvider,
    planets: &[Planet],
    tol: Tolerances,
    designation: &str,
) -> CoreResult<TrajectoryResult> {
    nbody::propagate_from_state(state, dt_days, num_points, mu_sun, ephemeris, planets, tol, designation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GM_SUN;
    use crate::ephemeris::MeanElementEphemeris;
    use crate::vector::Vector3;

    #[test]
    fn test_continue_twobody_rejects_near_parabolic() {
        // Escape velocity at r=1 AU gives e very close to 1.
        let r = 1.0_f64;
        let v_escape = (2.0 * GM_SUN / r).sqrt();
        let state = StateVector::new(Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, v_escape, 0.0), 2451545.0);
        let result = continue_twobody(&state, 10.0, 2, GM_SUN, "test");
        assert!(matches!(result, Err(TrajectoryError::UnsupportedOrbit(_))));
    }

    #[test]
    fn test_continue_twobody_accepts_ordinary_ellipse() {
        let r = 1.0_f64;
        let v_circ = (GM_SUN / r).sqrt();
        let state = StateVector::new(Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, v_circ, 0.0), 2451545.0);
        let result = continue_twobody(&state, 10.0, 2, GM_SUN, "test");
        assert!(result.is_ok());
    }

    #[test]
    fn test_continue_nbody_accepts_near_parabolic() {
        let r = 1.0_f64;
        let v_escape = (2.0 * GM_SUN / r).sqrt();
        let state = StateVector::new(Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, v_escape, 0.0), 2451545.0);
        let ephemeris = MeanElementEphemeris::new();
        let result = continue_nbody(&state, 10.0, 2, GM_SUN, &ephemeris, &[], Tolerances::default(), "test");
        assert!(result.is_ok());
    }
}
