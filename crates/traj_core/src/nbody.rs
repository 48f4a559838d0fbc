//! N-Body Propagator: numerical integration of the perturbed two-body
//! problem under the Sun plus a configurable subset of planets.
//!
//! The force model is the direct+indirect perturbation sum (Sun term
//! plus, for each perturber, the planet's pull on the body minus the
//! planet's pull on the Sun, since the frame origin is the Sun itself
//! and the Sun accelerates too). The integrator is an adaptive embedded
//! Dormand-Prince RK5(4) (DOPRI5), generalizing the fixed-step RK4
//! force-evaluation pattern used elsewhere in this corpus to variable
//! step size with local error control. Dense output between accepted
//! steps uses cubic Hermite interpolation on state and derivative,
//! carrying forward the same interpolation idea used for ISS ephemeris
//! lookups elsewhere in this corpus, generalized from position-only to
//! a full position+velocity state.

use crate::ephemeris::EphemerisProvider;
use crate::error::{CoreResult, TrajectoryError};
use crate::kepler::StateVector;
use crate::planets::Planet;
use crate::trajectory::{Method, TrajectoryResult, TrajectorySample};
use crate::vector::Vector3;
use std::time::Instant;

/// Relative and absolute error tolerances for step-size control.
#[derive(Debug, Clone, Copy)]
pub struct Tolerances {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self { rtol: 1e-10, atol: 1e-12 }
    }
}

const MIN_STEP_DAYS: f64 = 1e-8;
const MAX_STEP_DAYS: f64 = 50.0;
const SAFETY_FACTOR: f64 = 0.9;
const MAX_STEP_GROWTH: f64 = 5.0;
const MIN_STEP_SHRINK: f64 = 0.2;
const MAX_ITERATION_ATTEMPTS: u32 = 10_000;

/// Full integration state: position and velocity, flattened for the
/// Runge-Kutta stage arithmetic.
type Phase = [f64; 6];

fn to_phase(position: Vector3, velocity: Vector3) -> Phase {
    [position.x, position.y, position.z, velocity.x, velocity.y, velocity.z]
}

fn phase_position(p: &Phase) -> Vector3 {
    Vector3::new(p[0], p[1], p[2])
}

fn phase_velocity(p: &Phase) -> Vector3 {
    Vector3::new(p[3], p[4], p[5])
}

fn phase_add_scaled(base: &Phase, scale: f64, delta: &Phase) -> Phase {
    let mut out = [0.0; 6];
    for i in 0..6 {
        out[i] = base[i] + scale * delta[i];
    }
    out
}

fn phase_combine(base: &Phase, terms: &[(f64, &Phase)]) -> Phase {
    let mut out = *base;
    for (coeff, term) in terms {
        if *coeff == 0.0 {
            continue;
        }
        for i in 0..6 {
            out[i] += coeff * term[i];
        }
    }
    out
}

/// Right-hand side of the equations of motion: dr/dt = v, dv/dt = a(r, t).
fn derivatives(
    phase: &Phase,
    t: f64,
    mu_sun: f64,
    ephemeris: &dyn EphemerisProvider,
    planets: &[Planet],
) -> CoreResult<Phase> {
    let r = phase_position(phase);
    let v = phase_velocity(phase);
    let r_mag = r.norm();
    if r_mag <= 0.0 {
        return Err(TrajectoryError::InvalidRequest("body position coincides with the Sun".into()));
    }

    let mut accel = r * (-mu_sun / r_mag.powi(3));

    for &planet in planets {
        let r_planet = ephemeris.position(planet, t)?;
        let gm = ephemeris.gm(planet);

        let delta = r_planet - r;
        let delta_mag = delta.norm();
        if delta_mag <= 0.0 {
            continue;
        }
        let direct = delta * (gm / delta_mag.powi(3));

        let planet_mag = r_planet.norm();
        let indirect = if planet_mag > 0.0 { r_planet * (gm / planet_mag.powi(3)) } else { Vector3::ZERO };

        accel = accel + direct - indirect;
    }

    if !accel.x.is_finite() || !accel.y.is_finite() || !accel.z.is_finite() {
        return Err(TrajectoryError::IntegrationFailure {
            last_good_state: StateVector::new(r, v, t),
            failing_time: t,
            reason: "non-finite acceleration".into(),
        });
    }

    Ok(to_phase(v, accel))
}

/// One accepted integration step, retained for dense-output Hermite
/// interpolation: state and derivative at both endpoints.
struct AcceptedStep {
    t0: f64,
    t1: f64,
    y0: Phase,
    y1: Phase,
    dy0: Phase,
    dy1: Phase,
}

impl AcceptedStep {
    fn interpolate(&self, t: f64) -> StateVector {
        let h = self.t1 - self.t0;
        let s = if h.abs() > 0.0 { (t - self.t0) / h } else { 0.0 };
        let s2 = s * s;
        let s3 = s2 * s;

        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        let mut y = [0.0; 6];
        for i in 0..6 {
            y[i] = h00 * self.y0[i] + h10 * h * self.dy0[i] + h01 * self.y1[i] + h11 * h * self.dy1[i];
        }
        StateVector::new(phase_position(&y), phase_velocity(&y), t)
    }
}

/// Dormand-Prince RK5(4) Butcher tableau coefficients.
mod dopri5 {
    pub const C2: f64 = 1.0 / 5.0;
    pub const C3: f64 = 3.0 / 10.0;
    pub const C4: f64 = 4.0 / 5.0;
    pub const C5: f64 = 8.0 / 9.0;

    pub const A21: f64 = 1.0 / 5.0;

    pub const A31: f64 = 3.0 / 40.0;
    pub const A32: f64 = 9.0 / 40.0;

    pub const A41: f64 = 44.0 / 45.0;
    pub const A42: f64 = -56.0 / 15.0;
    pub const A43: f64 = 32.0 / 9.0;

    pub const A51: f64 = 19372.0 / 6561.0;
    pub const A52: f64 = -25360.0 / 2187.0;
    pub const A53: f64 = 64448.0 / 6561.0;
    pub const A54: f64 = -212.0 / 729.0;

    pub const A61: f64 = 9017.0 / 3168.0;
    pub const A62: f64 = -355.0 / 33.0;
    pub const A63: f64 = 46732.0 / 5247.0;
    pub const A64: f64 = 49.0 / 176.0;
    pub const A65: f64 = -5103.0 / 18656.0;

    pub const A71: f64 = 35.0 / 384.0;
    pub const A73: f64 = 500.0 / 1113.0;
    pub const A74: f64 = 125.0 / 192.0;
    pub const A75: f64 = -2187.0 / 6784.0;
    pub const A76: f64 = 11.0 / 84.0;

    // 5th-order solution weights (equal to the 7th stage row, FSAL).
    pub const B1: f64 = 35.0 / 384.0;
    pub const B3: f64 = 500.0 / 1113.0;
    pub const B4: f64 = 125.0 / 192.0;
    pub const B5: f64 = -2187.0 / 6784.0;
    pub const B6: f64 = 11.0 / 84.0;

    // 4th-order embedded weights, for the error estimate.
    pub const B1S: f64 = 5179.0 / 57600.0;
    pub const B3S: f64 = 7571.0 / 16695.0;
    pub const B4S: f64 = 393.0 / 640.0;
    pub const B5S: f64 = -92097.0 / 339200.0;
    pub const B6S: f64 = 187.0 / 2100.0;
    pub const B7S: f64 = 1.0 / 40.0;
}

/// Advance one adaptive DOPRI5 step from `(t, y)` with trial step `h`.
/// Returns the proposed next state, its derivative, and the scaled error
/// norm used to accept/reject the step and rescale `h`.
fn dopri5_step(
    y: &Phase,
    dy: &Phase,
    t: f64,
    h: f64,
    mu_sun: f64,
    ephemeris: &dyn EphemerisProvider,
    planets: &[Planet],
    tol: Tolerances,
) -> CoreResult<(Phase, Phase, f64)> {
    use dopri5::*;

    let k1 = *dy;
    let k2 = derivatives(&phase_add_scaled(y, h * A21, &k1), t + C2 * h, mu_sun, ephemeris, planets)?;
    let y3 = phase_combine(y, &[(h * A31, &k1), (h * A32, &k2)]);
    let k3 = derivatives(&y3, t + C3 * h, mu_sun, ephemeris, planets)?;
    let y4 = phase_combine(y, &[(h * A41, &k1), (h * A42, &k2), (h * A43, &k3)]);
    let k4 = derivatives(&y4, t + C4 * h, mu_sun, ephemeris, planets)?;
    let y5 = phase_combine(y, &[(h * A51, &k1), (h * A52, &k2), (h * A53, &k3), (h * A54, &k4)]);
    let k5 = derivatives(&y5, t + C5 * h, mu_sun, ephemeris, planets)?;
    let y6 = phase_combine(y, &[(h * A61, &k1), (h * A62, &k2), (h * A63, &k3), (h * A64, &k4), (h * A65, &k5)]);
    let k6 = derivatives(&y6, t + h, mu_sun, ephemeris, planets)?;
    let y7 = phase_combine(y, &[(h * A71, &k1), (h * A73, &k3), (h * A74, &k4), (h * A75, &k5), (h * A76, &k6)]);
    let k7 = derivatives(&y7, t + h, mu_sun, ephemeris, planets)?;

    let y_high = phase_combine(y, &[(h * B1, &k1), (h * B3, &k3), (h * B4, &k4), (h * B5, &k5), (h * B6, &k6)]);
    let y_low = phase_combine(
        y,
        &[(h * B1S, &k1), (h * B3S, &k3), (h * B4S, &k4), (h * B5S, &k5), (h * B6S, &k6), (h * B7S, &k7)],
    );

    let mut err_norm_sq = 0.0;
    for i in 0..6 {
        let scale = tol.atol + tol.rtol * y[i].abs().max(y_high[i].abs());
        let e = (y_high[i] - y_low[i]) / scale.max(f64::EPSILON);
        err_norm_sq += e * e;
    }
    let err_norm = (err_norm_sq / 6.0).sqrt();

    Ok((y_high, k7, err_norm))
}

/// Integrate from `state` to `t_end`, returning the accepted steps used
/// for dense-output sampling.
fn integrate(
    state: &StateVector,
    t_end: f64,
    mu_sun: f64,
    ephemeris: &dyn EphemerisProvider,
    planets: &[Planet],
    tol: Tolerances,
) -> CoreResult<Vec<AcceptedStep>> {
    let direction = if t_end >= state.time { 1.0 } else { -1.0 };
    let mut t = state.time;
    let mut y = to_phase(state.position, state.velocity);
    let mut dy = derivatives(&y, t, mu_sun, ephemeris, planets)?;
    let mut h = direction * (MAX_STEP_DAYS / 10.0).min((t_end - state.time).abs().max(MIN_STEP_DAYS));

    let mut steps = Vec::new();
    let mut attempts = 0;

    while (t_end - t).abs() > 1e-12 {
        attempts += 1;
        if attempts > MAX_ITERATION_ATTEMPTS {
            return Err(TrajectoryError::IntegrationFailure {
                last_good_state: StateVector::new(phase_position(&y), phase_velocity(&y), t),
                failing_time: t,
                reason: "exceeded maximum step attempts".into(),
            });
        }

        if (t + h - t_end) * direction > 0.0 {
            h = t_end - t;
        }

        let (y_next, dy_next, err_norm) = dopri5_step(&y, &dy, t, h, mu_sun, ephemeris, planets, tol)?;

        if err_norm <= 1.0 || h.abs() <= MIN_STEP_DAYS {
            let t_next = t + h;
            // Stored with t0 < t1 regardless of integration direction, so the
            // dense-output lookup below can binary-search on ascending time.
            let step = if direction >= 0.0 {
                AcceptedStep { t0: t, t1: t_next, y0: y, y1: y_next, dy0: dy, dy1: dy_next }
            } else {
                AcceptedStep { t0: t_next, t1: t, y0: y_next, y1: y, dy0: dy_next, dy1: dy }
            };
            steps.push(step);
            t = t_next;
            y = y_next;
            dy = dy_next;
        }

        let growth = if err_norm > 0.0 {
            (SAFETY_FACTOR / err_norm.powf(0.2)).clamp(MIN_STEP_SHRINK, MAX_STEP_GROWTH)
        } else {
            MAX_STEP_GROWTH
        };
        h *= growth;
        if h.abs() < MIN_STEP_DAYS {
            h = direction * MIN_STEP_DAYS;
        }
        if h.abs() > MAX_STEP_DAYS {
            h = direction * MAX_STEP_DAYS;
        }
    }

    if direction < 0.0 {
        steps.reverse();
    }

    Ok(steps)
}

fn sample_from_steps(steps: &[AcceptedStep], t: f64) -> StateVector {
    match steps.binary_search_by(|step| {
        let (lo, hi) = if step.t0 <= step.t1 { (step.t0, step.t1) } else { (step.t1, step.t0) };
        if t < lo {
            std::cmp::Ordering::Greater
        } else if t > hi {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Equal
        }
    }) {
        Ok(idx) => steps[idx].interpolate(t),
        Err(idx) => {
            let clamped = idx.min(steps.len() - 1);
            steps[clamped].interpolate(t)
        }
    }
}

/// Propagate a Cartesian state under the Sun plus `planets` from
/// `state.time` to `state.time + dt_days`, sampling `num_points` evenly
/// spaced points.
pub fn propagate_from_state(
    state: &StateVector,
    dt_days: f64,
    num_points: usize,
    mu_sun: f64,
    ephemeris: &dyn EphemerisProvider,
    planets: &[Planet],
    tol: Tolerances,
    designation: &str,
) -> CoreResult<TrajectoryResult> {
    if !(2..=1000).contains(&num_points) {
        return Err(TrajectoryError::InvalidRequest(format!(
            "num_points must be in 2..=1000, got {num_points}"
        )));
    }
    if !(1.0..=3650.0).contains(&dt_days.abs()) {
        return Err(TrajectoryError::InvalidRequest(format!("days must be in 1..=3650, got {}", dt_days.abs())));
    }

    let started = Instant::now();
    let t_start = state.time;
    let t_end = state.time + dt_days;

    let steps = integrate(state, t_end, mu_sun, ephemeris, planets, tol)?;

    let times = TrajectoryResult::sample_times(t_start, t_end, num_points);
    let mut samples = Vec::with_capacity(times.len());
    for &t in &times {
        let sampled = sample_from_steps(&steps, t);
        samples.push(TrajectorySample::new(t, t_start, sampled.position));
    }

    let final_state = sample_from_steps(&steps, t_end);

    Ok(TrajectoryResult {
        designation: designation.to_string(),
        method: Method::NBody,
        start_time: t_start,
        end_time: t_end,
        num_points,
        samples,
        final_state,
        calculation_time_seconds: started.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GM_SUN;
    use crate::ephemeris::MeanElementEphemeris;
    use approx::assert_abs_diff_eq;

    fn earth_circular_state() -> StateVector {
        let r = 1.0_f64;
        let v = (GM_SUN / r).sqrt();
        StateVector::new(Vector3::new(r, 0.0, 0.0), Vector3::new(0.0, v, 0.0), 2451545.0)
    }

    #[test]
    fn test_no_perturbers_conserves_energy() {
        let state = earth_circular_state();
        let ephemeris = MeanElementEphemeris::new();
        let result = propagate_from_state(
            &state,
            365.25,
            20,
            GM_SUN,
            &ephemeris,
            &[],
            Tolerances::default(),
            "Earth",
        )
        .unwrap();

        let e0 = state.specific_energy(GM_SUN);
        for sample in &result.samples {
            let speed_sq_approx = 2.0 * (e0 + GM_SUN / sample.distance_from_sun);
            assert!(speed_sq_approx > 0.0);
        }
        assert_abs_diff_eq!(result.final_state.distance_from_sun(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_jupiter_perturbation_changes_trajectory() {
        let state = earth_circular_state();
        let ephemeris = MeanElementEphemeris::new();

        let unperturbed = propagate_from_state(
            &state,
            365.25 * 5.0,
            5,
            GM_SUN,
            &ephemeris,
            &[],
            Tolerances::default(),
            "Earth",
        )
        .unwrap();
        let perturbed = propagate_from_state(
            &state,
            365.25 * 5.0,
            5,
            GM_SUN,
            &ephemeris,
            &[Planet::Jupiter],
            Tolerances::default(),
            "Earth",
        )
        .unwrap();

        let delta = (perturbed.final_state.position - unperturbed.final_state.position).norm();
        assert!(delta > 0.0, "Jupiter's perturbation should measurably shift the final position");
    }

    #[test]
    fn test_num_points_below_two_rejected() {
        let state = earth_circular_state();
        let ephemeris = MeanElementEphemeris::new();
        let result = propagate_from_state(&state, 10.0, 1, GM_SUN, &ephemeris, &[], Tolerances::default(), "Earth");
        assert!(matches!(result, Err(TrajectoryError::InvalidRequest(_))));
    }

    #[test]
    fn test_samples_bracket_start_and_end() {
        let state = earth_circular_state();
        let ephemeris = MeanElementEphemeris::new();
        let result = propagate_from_state(&state, 30.0, 4, GM_SUN, &ephemeris, &[], Tolerances::default(), "Earth")
            .unwrap();
        assert_abs_diff_eq!(result.samples[0].time, state.time, epsilon = 1e-9);
        assert_abs_diff_eq!(result.samples.last().unwrap().time, state.time + 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_backward_propagation_samples_are_monotonic_and_bracket_ends() {
        let state = earth_circular_state();
        let ephemeris = MeanElementEphemeris::new();
        let result = propagate_from_state(
            &state,
            -120.0,
            10,
            GM_SUN,
            &ephemeris,
            &[Planet::Jupiter],
            Tolerances::default(),
            "Earth",
        )
        .unwrap();

        assert_abs_diff_eq!(result.samples[0].time, state.time, epsilon = 1e-9);
        assert_abs_diff_eq!(result.samples.last().unwrap().time, state.time - 120.0, epsilon = 1e-9);
        for pair in result.samples.windows(2) {
            assert!(pair[1].time < pair[0].time);
        }
        assert_abs_diff_eq!(result.final_state.distance_from_sun(), 1.0, epsilon = 1e-3);
    }
}
