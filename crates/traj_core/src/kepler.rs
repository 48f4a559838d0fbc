//! Kepler Kernel: the single source of truth for Keplerian <-> Cartesian
//! conversion.
//!
//! No other module in this crate reimplements Kepler's equation or the
//! element/state round-trip; the N-body and continuation paths both call
//! back into this module when they need it.

use crate::error::{CoreResult, TrajectoryError};
use crate::vector::Vector3;
use std::f64::consts::PI;

/// Newton-Raphson convergence tolerance for the Kepler solver, radians.
const KEPLER_TOLERANCE: f64 = 1e-10;
/// Maximum Newton-Raphson iterations before declaring non-convergence.
const KEPLER_MAX_ITERATIONS: u32 = 100;

/// Eccentricity band treated as "near-parabolic": element/state
/// conversions in this band are numerically fragile, and calling code
/// should prefer the state-based (N-body) path over re-deriving elements.
pub const ECCENTRICITY_NEAR_PARABOLIC_EPS: f64 = 1e-6;

/// Below this inclination/eccentricity, cartesian_to_keplerian falls back
/// to conventional reference directions.
const SINGULARITY_EPS: f64 = 1e-8;

/// Heliocentric Keplerian orbital elements.
///
/// Immutable once constructed: the invariants below are checked in
/// `new` and never need to be rechecked downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeplerianElements {
    /// Semi-major axis, AU. Negative for hyperbolic orbits.
    pub a: f64,
    /// Eccentricity, e >= 0.
    pub e: f64,
    /// Inclination, radians, 0..=pi.
    pub i: f64,
    /// Longitude of ascending node, radians.
    pub ascending_node: f64,
    /// Argument of perihelion, radians.
    pub arg_perihelion: f64,
    /// Mean anomaly at epoch, radians.
    pub mean_anomaly_at_epoch: f64,
    /// Epoch, Julian Date.
    pub epoch: f64,
}

impl KeplerianElements {
    /// Construct a new element set, enforcing: e >= 0; e<1 implies a>0;
    /// e>1 implies a<0; e==1 is rejected outright since the analytic
    /// path is undefined for it.
    pub fn new(
        a: f64,
        e: f64,
        i: f64,
        ascending_node: f64,
        arg_perihelion: f64,
        mean_anomaly_at_epoch: f64,
        epoch: f64,
    ) -> CoreResult<Self> {
        if e < 0.0 {
            return Err(TrajectoryError::InvalidRequest(format!(
                "eccentricity must be >= 0, got {e}"
            )));
        }
        if (e - 1.0).abs() < f64::EPSILON {
            return Err(TrajectoryError::UnsupportedOrbit(
                "e == 1 (exactly parabolic) is undefined on the analytic path".into(),
            ));
        }
        if e < 1.0 && a <= 0.0 {
            return Err(TrajectoryError::InvalidRequest(format!(
                "elliptical orbit (e={e}) requires a > 0, got a={a}"
            )));
        }
        if e > 1.0 && a >= 0.0 {
            return Err(TrajectoryError::InvalidRequest(format!(
                "hyperbolic orbit (e={e}) requires a < 0, got a={a}"
            )));
        }
        Ok(Self {
            a,
            e,
            i,
            ascending_node,
            arg_perihelion,
            mean_anomaly_at_epoch,
            epoch,
        })
    }

    /// Perihelion distance, q = a(1-e). Sign convention holds for both
    /// elliptical and hyperbolic orbits.
    pub fn perihelion_distance(&self) -> f64 {
        self.a * (1.0 - self.e)
    }

    /// Orbital period in days, 2*pi*sqrt(a^3/mu). Only defined for e < 1.
    pub fn period_days(&self, mu: f64) -> Option<f64> {
        if self.e < 1.0 {
            Some(2.0 * PI * (self.a.powi(3) / mu).sqrt())
        } else {
            None
        }
    }

    /// Mean motion, n = sqrt(mu/a^3), radians/day. `a.abs()` so the
    /// formula is well-defined for the negative semi-major axis used by
    /// hyperbolic orbits.
    pub fn mean_motion(&self, mu: f64) -> f64 {
        (mu / self.a.abs().powi(3)).sqrt()
    }

    pub fn classify(&self) -> OrbitFamily {
        if self.e < 1.0 {
            OrbitFamily::Elliptical
        } else {
            OrbitFamily::Hyperbolic
        }
    }
}

/// Orbit family, used by callers deciding whether the analytic
/// (two-body) path applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitFamily {
    Elliptical,
    Hyperbolic,
}

/// A Cartesian state: position, velocity, and the time they were
/// evaluated at. Freely copyable by value; never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateVector {
    pub position: Vector3,
    pub velocity: Vector3,
    pub time: f64,
}

impl StateVector {
    pub fn new(position: Vector3, velocity: Vector3, time: f64) -> Self {
        Self { position, velocity, time }
    }

    pub fn distance_from_sun(&self) -> f64 {
        self.position.norm()
    }

    /// Specific orbital energy, v^2/2 - mu/r.
    pub fn specific_energy(&self, mu: f64) -> f64 {
        0.5 * self.velocity.norm_squared() - mu / self.position.norm()
    }
}

/// Solve Kepler's equation M = E - e*sin(E) for the eccentric anomaly E,
/// given mean anomaly M (any real) and eccentricity e in [0, 1).
///
/// Newton-Raphson from E0 = M (or M + e*sign(sin M) when e is close to 1,
/// which keeps the iteration from stalling near aphelion for very
/// eccentric orbits).
pub fn solve_kepler(mean_anomaly: f64, eccentricity: f64) -> CoreResult<f64> {
    let m = mean_anomaly;
    let mut e_anomaly = if eccentricity > 0.8 {
        m + eccentricity * m.sin().signum()
    } else {
        m
    };

    for iteration in 0..KEPLER_MAX_ITERATIONS {
        let f = e_anomaly - eccentricity * e_anomaly.sin() - m;
        if f.abs() < KEPLER_TOLERANCE {
            return Ok(e_anomaly);
        }
        let f_prime = 1.0 - eccentricity * e_anomaly.cos();
        e_anomaly -= f / f_prime;
        let _ = iteration;
    }

    let residual = (e_anomaly - eccentricity * e_anomaly.sin() - m).abs();
    if residual < KEPLER_TOLERANCE {
        Ok(e_anomaly)
    } else {
        Err(TrajectoryError::ConvergenceFailure {
            iterations: KEPLER_MAX_ITERATIONS,
            residual,
        })
    }
}

/// Solve the hyperbolic Kepler equation M = e*sinh(H) - H for H.
fn solve_kepler_hyperbolic(mean_anomaly: f64, eccentricity: f64) -> CoreResult<f64> {
    let m = mean_anomaly;
    let mut h = if m.abs() < 1.0 {
        m
    } else {
        m.signum() * (2.0 * m.abs() / eccentricity).ln()
    };

    for _ in 0..KEPLER_MAX_ITERATIONS {
        let sinh_h = h.sinh();
        let cosh_h = h.cosh();
        let f = eccentricity * sinh_h - h - m;
        if f.abs() < KEPLER_TOLERANCE {
            return Ok(h);
        }
        h -= f / (eccentricity * cosh_h - 1.0);
    }

    let residual = (eccentricity * h.sinh() - h - m).abs();
    if residual < KEPLER_TOLERANCE {
        Ok(h)
    } else {
        Err(TrajectoryError::ConvergenceFailure {
            iterations: KEPLER_MAX_ITERATIONS,
            residual,
        })
    }
}

/// Convert Keplerian elements to a Cartesian state at time `t`. `mu` is
/// the gravitational parameter of the central body (GM_SUN for
/// heliocentric orbits).
pub fn keplerian_to_cartesian(
    elements: &KeplerianElements,
    t: f64,
    mu: f64,
) -> CoreResult<StateVector> {
    match elements.classify() {
        OrbitFamily::Elliptical => keplerian_to_cartesian_elliptical(elements, t, mu),
        OrbitFamily::Hyperbolic => keplerian_to_cartesian_hyperbolic(elements, t, mu),
    }
}

fn keplerian_to_cartesian_elliptical(
    elements: &KeplerianElements,
    t: f64,
    mu: f64,
) -> CoreResult<StateVector> {
    let a = elements.a;
    let e = elements.e;
    let n = elements.mean_motion(mu);
    let mean_anomaly = elements.mean_anomaly_at_epoch + n * (t - elements.epoch);

    let eccentric_anomaly = solve_kepler(mean_anomaly, e)?;
    let cos_e = eccentric_anomaly.cos();
    let sin_e = eccentric_anomaly.sin();
    let one_minus_e_cos_e = 1.0 - e * cos_e;

    // True anomaly, via the numerically stable two-argument form.
    let cos_nu = (cos_e - e) / one_minus_e_cos_e;
    let sin_nu = (1.0 - e * e).sqrt() * sin_e / one_minus_e_cos_e;
    let _true_anomaly = sin_nu.atan2(cos_nu);

    let r = a * one_minus_e_cos_e;

    // Position in the orbital plane.
    let x_orbit = r * cos_nu;
    let y_orbit = r * sin_nu;

    // Velocity in the orbital plane, derived from the time derivative of
    // the position rather than the naive v = -v*sin(E)*sqrt(mu/a) form
    // (that shortcut drops the radial component and is wrong off periapsis).
    let vx_orbit = -(a * n * sin_e) / one_minus_e_cos_e;
    let vy_orbit = (a * n * (1.0 - e * e).sqrt() * cos_e) / one_minus_e_cos_e;

    let position = rotate_orbital_plane(
        Vector3::new(x_orbit, y_orbit, 0.0),
        elements.ascending_node,
        elements.i,
        elements.arg_perihelion,
    );
    let velocity = rotate_orbital_plane(
        Vector3::new(vx_orbit, vy_orbit, 0.0),
        elements.ascending_node,
        elements.i,
        elements.arg_perihelion,
    );

    Ok(StateVector::new(position, velocity, t))
}

fn keplerian_to_cartesian_hyperbolic(
    elements: &KeplerianElements,
    t: f64,
    mu: f64,
) -> CoreResult<StateVector> {
    let a = elements.a; // negative
    let e = elements.e;
    let n = elements.mean_motion(mu);
    let mean_anomaly = elements.mean_anomaly_at_epoch + n * (t - elements.epoch);

    let h = solve_kepler_hyperbolic(mean_anomaly, e)?;
    let cosh_h = h.cosh();
    let sinh_h = h.sinh();
    let one_minus_e_cosh_h = 1.0 - e * cosh_h;

    let cos_nu = (e - cosh_h) / one_minus_e_cosh_h;
    let sin_nu = -(e * e - 1.0).sqrt() * sinh_h / one_minus_e_cosh_h;

    let r = a * one_minus_e_cosh_h;

    let x_orbit = r * cos_nu;
    let y_orbit = r * sin_nu;

    let vx_orbit = -(a * n * sinh_h) / one_minus_e_cosh_h;
    let vy_orbit = (a * n * (e * e - 1.0).sqrt() * cosh_h) / one_minus_e_cosh_h;

    let position = rotate_orbital_plane(
        Vector3::new(x_orbit, y_orbit, 0.0),
        elements.ascending_node,
        elements.i,
        elements.arg_perihelion,
    );
    let velocity = rotate_orbital_plane(
        Vector3::new(vx_orbit, vy_orbit, 0.0),
        elements.ascending_node,
        elements.i,
        elements.arg_perihelion,
    );

    Ok(StateVector::new(position, velocity, t))
}

/// Rotate a vector from the orbital plane into the heliocentric ecliptic
/// frame by R3(-Omega) * R1(-i) * R3(-omega). Expressed directly as the
/// combined rotation matrix elements rather
/// than composed `Vector3::rotate_*` calls, to avoid a sign slip in the
/// passive/active rotation convention.
fn rotate_orbital_plane(v: Vector3, ascending_node: f64, inclination: f64, arg_perihelion: f64) -> Vector3 {
    let (sin_omega, cos_omega) = ascending_node.sin_cos();
    let (sin_i, cos_i) = inclination.sin_cos();
    let (sin_w, cos_w) = arg_perihelion.sin_cos();

    let p1 = cos_omega * cos_w - sin_omega * sin_w * cos_i;
    let p2 = -cos_omega * sin_w - sin_omega * cos_w * cos_i;
    let q1 = sin_omega * cos_w + cos_omega * sin_w * cos_i;
    let q2 = -sin_omega * sin_w + cos_omega * cos_w * cos_i;
    let r1 = sin_w * sin_i;
    let r2 = cos_w * sin_i;

    Vector3::new(
        p1 * v.x + p2 * v.y,
        q1 * v.x + q2 * v.y,
        r1 * v.x + r2 * v.y,
    )
}

/// Reconstruct Keplerian elements from a Cartesian state. Handles the
/// e~0, i~0, and circular-equatorial edge cases by falling back to
/// conventional reference directions.
pub fn cartesian_to_keplerian(state: &StateVector, mu: f64) -> CoreResult<KeplerianElements> {
    let r = state.position;
    let v = state.velocity;
    let r_mag = r.norm();

    if r_mag <= 0.0 {
        return Err(TrajectoryError::InvalidRequest(
            "state vector has zero position magnitude".into(),
        ));
    }

    let h = r.cross(&v); // specific angular momentum
    let h_mag = h.norm();
    let node_vector = Vector3::new(0.0, 0.0, 1.0).cross(&h);

    let energy = 0.5 * v.norm_squared() - mu / r_mag;
    let e_vector = (1.0 / mu) * v.cross(&h) - r / r_mag;
    let e = e_vector.norm();

    let a = if (1.0 - e).abs() < SINGULARITY_EPS {
        // Parabolic-adjacent: energy is ~0 so -mu/(2*energy) blows up.
        // Signed so `KeplerianElements::new`'s e/a sign check still
        // holds on either side of e=1 — the near-parabolic rejection
        // itself is `continue_twobody`'s job, not construction's.
        if e > 1.0 { f64::NEG_INFINITY } else { f64::INFINITY }
    } else {
        -mu / (2.0 * energy)
    };

    let i = (h.z / h_mag).clamp(-1.0, 1.0).acos();

    let ascending_node = if i < SINGULARITY_EPS || (PI - i).abs() < SINGULARITY_EPS {
        0.0 // equatorial orbit: node undefined, conventionally zero
    } else {
        let n_mag = node_vector.norm();
        let raan = (node_vector.x / n_mag).clamp(-1.0, 1.0).acos();
        if node_vector.y < 0.0 { 2.0 * PI - raan } else { raan }
    };

    let arg_perihelion = if e < SINGULARITY_EPS {
        0.0 // circular orbit: perihelion undefined, conventionally zero
    } else if i < SINGULARITY_EPS || (PI - i).abs() < SINGULARITY_EPS {
        // equatorial, eccentric: measure from x-axis instead of the node
        let w = (e_vector.x / e).clamp(-1.0, 1.0).acos();
        if e_vector.y < 0.0 { 2.0 * PI - w } else { w }
    } else {
        let n_mag = node_vector.norm();
        let w = (node_vector.dot(&e_vector) / (n_mag * e)).clamp(-1.0, 1.0).acos();
        if e_vector.z < 0.0 { 2.0 * PI - w } else { w }
    };

    let true_anomaly = if e < SINGULARITY_EPS {
        // circular: measure true anomaly directly from the node (or x-axis)
        let reference = if i < SINGULARITY_EPS { Vector3::new(1.0, 0.0, 0.0) } else { node_vector };
        let ref_mag = reference.norm();
        let nu = (reference.dot(&r) / (ref_mag * r_mag)).clamp(-1.0, 1.0).acos();
        if r.dot(&v) < 0.0 { 2.0 * PI - nu } else { nu }
    } else {
        let nu = (e_vector.dot(&r) / (e * r_mag)).clamp(-1.0, 1.0).acos();
        if r.dot(&v) < 0.0 { 2.0 * PI - nu } else { nu }
    };

    let mean_anomaly = if e < 1.0 {
        let eccentric_anomaly = 2.0
            * ((1.0 - e).sqrt() * (true_anomaly / 2.0).tan())
                .atan2((1.0 + e).sqrt());
        eccentric_anomaly - e * eccentric_anomaly.sin()
    } else {
        let eccentric_anomaly_h = 2.0
            * (((e - 1.0) / (e + 1.0)).sqrt() * (true_anomaly / 2.0).tan())
                .atanh();
        e * eccentric_anomaly_h.sinh() - eccentric_anomaly_h
    };

    KeplerianElements::new(a, e, i, ascending_node, arg_perihelion, mean_anomaly, state.time)
}
