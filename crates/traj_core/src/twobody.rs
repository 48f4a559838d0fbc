//! Two-Body Propagator: analytic propagation by re-evaluating Kepler's
//! equation at each requested sample time.
//!
//! Roughly 100x cheaper than integrating the full N-body force model and
//! the right default for short horizons and bodies far from the planets.
//! No error accumulates between samples since each one is an independent
//! evaluation; energy is conserved to machine precision.

use crate::error::{CoreResult, TrajectoryError};
use crate::kepler::{cartesian_to_keplerian, keplerian_to_cartesian, KeplerianElements, StateVector};
use crate::trajectory::{Method, TrajectoryResult, TrajectorySample};
use std::time::Instant;

/// Propagate `elements` from `t_start` to `t_end`, sampling `num_points`
/// evenly spaced points.
pub fn propagate(
    elements: &KeplerianElements,
    t_start: f64,
    t_end: f64,
    num_points: usize,
    mu: f64,
    designation: &str,
) -> CoreResult<TrajectoryResult> {
    validate_request(t_start, t_end, num_points)?;
    let started = Instant::now();

    let times = TrajectoryResult::sample_times(t_start, t_end, num_points);
    let mut samples = Vec::with_capacity(times.len());
    for &t in &times {
        let state = keplerian_to_cartesian(elements, t, mu)?;
        samples.push(TrajectorySample::new(t, elements.epoch, state.position));
    }

    let final_state = keplerian_to_cartesian(elements, t_end, mu)?;

    Ok(TrajectoryResult {
        designation: designation.to_string(),
        method: Method::TwoBody,
        start_time: t_start,
        end_time: t_end,
        num_points,
        samples,
        final_state,
        calculation_time_seconds: started.elapsed().as_secs_f64(),
    })
}

/// Continuation variant: converts `state` to elements and delegates to
/// `propagate`. Numerically identical to the element-based path when
/// `state` was itself produced by this kernel.
pub fn propagate_from_state(
    state: &StateVector,
    dt_days: f64,
    num_points: usize,
    mu: f64,
    designation: &str,
) -> CoreResult<TrajectoryResult> {
    let elements = cartesian_to_keplerian(state, mu)?;
    propagate(&elements, state.time, state.time + dt_days, num_points, mu, designation)
}

fn validate_request(t_start: f64, t_end: f64, num_points: usize) -> CoreResult<()> {
    if !(2..=1000).contains(&num_points) {
        return Err(TrajectoryError::InvalidRequest(format!(
            "num_points must be in 2..=1000, got {num_points}"
        )));
    }
    let days = (t_end - t_start).abs();
    if !(1.0..=3650.0).contains(&days) {
        return Err(TrajectoryError::InvalidRequest(format!("days must be in 1..=3650, got {days}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GM_SUN;
    use approx::assert_abs_diff_eq;

    fn earth_analog() -> KeplerianElements {
        KeplerianElements::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2451545.0).unwrap()
    }

    fn halley() -> KeplerianElements {
        let q = 0.586_f64;
        let e = 0.96714;
        KeplerianElements::new(
            q / (1.0 - e),
            e,
            162.2627_f64.to_radians(),
            58.4201_f64.to_radians(),
            111.3325_f64.to_radians(),
            38.861_f64.to_radians(),
            2449400.5,
        )
        .unwrap()
    }

    #[test]
    fn test_earth_analog_closes_orbit() {
        let elements = earth_analog();
        let result = propagate(&elements, 2451545.0, 2451545.0 + 365.25636, 365, GM_SUN, "Earth").unwrap();

        let first = result.samples.first().unwrap();
        let last = result.samples.last().unwrap();
        assert_abs_diff_eq!(first.position.x, last.position.x, epsilon = 1e-9);
        assert_abs_diff_eq!(first.position.y, last.position.y, epsilon = 1e-9);
        assert_abs_diff_eq!(first.position.z, last.position.z, epsilon = 1e-9);

        for sample in &result.samples {
            assert_abs_diff_eq!(sample.distance_from_sun, 1.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn test_two_points_exactly_start_and_end() {
        let elements = earth_analog();
        let result = propagate(&elements, 2451545.0, 2451545.0 + 10.0, 2, GM_SUN, "Earth").unwrap();
        assert_eq!(result.num_points, 2);
        assert_eq!(result.samples.len(), 2);
        assert_eq!(result.samples[0].time, 2451545.0);
        assert_eq!(result.samples[1].time, 2451545.0 + 10.0);
    }

    #[test]
    fn test_num_points_below_two_rejected() {
        let elements = earth_analog();
        let result = propagate(&elements, 2451545.0, 2451545.0 + 10.0, 1, GM_SUN, "Earth");
        assert!(matches!(result, Err(TrajectoryError::InvalidRequest(_))));
    }

    #[test]
    fn test_num_points_above_thousand_rejected() {
        let elements = earth_analog();
        let result = propagate(&elements, 2451545.0, 2451545.0 + 10.0, 1001, GM_SUN, "Earth");
        assert!(matches!(result, Err(TrajectoryError::InvalidRequest(_))));
    }

    #[test]
    fn test_days_outside_bounds_rejected() {
        let elements = earth_analog();
        let too_short = propagate(&elements, 2451545.0, 2451545.0 + 0.5, 2, GM_SUN, "Earth");
        assert!(matches!(too_short, Err(TrajectoryError::InvalidRequest(_))));
        let too_long = propagate(&elements, 2451545.0, 2451545.0 + 4000.0, 2, GM_SUN, "Earth");
        assert!(matches!(too_long, Err(TrajectoryError::InvalidRequest(_))));
    }

    #[test]
    fn test_energy_conserved_across_samples() {
        let elements = halley();
        let result = propagate(&elements, elements.epoch, elements.epoch + 365.25, 13, GM_SUN, "Halley").unwrap();

        let mu = GM_SUN;
        let energies: Vec<f64> = result
            .samples
            .iter()
            .map(|s| {
                let state = keplerian_to_cartesian(&elements, s.time, mu).unwrap();
                state.specific_energy(mu)
            })
            .collect();
        let e0 = energies[0];
        for e in &energies {
            assert_abs_diff_eq!(e / e0, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_continuation_continuity() {
        let elements = earth_analog();
        let first_leg = propagate(&elements, 2451545.0, 2451545.0 + 365.0, 100, GM_SUN, "Earth").unwrap();
        let continued = propagate_from_state(
            &first_leg.final_state,
            1.0,
            2,
            GM_SUN,
            "Earth",
        )
        .unwrap();

        let continued_first = &continued.samples[0];
        assert_abs_diff_eq!(continued_first.position.x, first_leg.final_state.position.x, epsilon = 1e-12);
        assert_abs_diff_eq!(continued_first.position.y, first_leg.final_state.position.y, epsilon = 1e-12);
        assert_abs_diff_eq!(continued_first.position.z, first_leg.final_state.position.z, epsilon = 1e-12);
    }
}
