//! Serving-boundary operations: the small set of entry points an
//! external layer (HTTP, CLI, test harness) calls into. Everything here
//! is thin orchestration over `catalog`, `twobody`, `nbody`,
//! `continuation`, and `batch` — no new domain logic lives in this module.

use crate::batch::{run_batch, BatchOutcome, BatchRequest, TrajectoryCache};
use crate::catalog::{Catalog, CatalogStats};
use crate::constants::GM_SUN;
use crate::continuation;
use crate::ephemeris::EphemerisProvider;
use crate::error::{CoreResult, TrajectoryError};
use crate::kepler::StateVector;
use crate::nbody::Tolerances;
use crate::planets::Planet;
use crate::trajectory::{Method, TrajectoryResult};
use crate::twobody;

/// Look up `designation` in `catalog` and propagate from `start_time`
/// to `end_time`, sampling `num_points` points, via the requested
/// method. `tol` governs N-body step-size control and is ignored for
/// `Method::TwoBody`. When `planets` is empty, `default_planets` is used
/// in its place (the configured perturber set, applied "when none
/// specified").
pub fn propagate_elements(
    catalog: &dyn Catalog,
    ephemeris: &dyn EphemerisProvider,
    designation: &str,
    start_time: f64,
    end_time: f64,
    num_points: usize,
    method: Method,
    planets: &[Planet],
    default_planets: &[Planet],
    tol: Tolerances,
) -> CoreResult<TrajectoryResult> {
    let elements = catalog
        .find(designation)
        .ok_or_else(|| TrajectoryError::NotFound(designation.to_string()))?;

    match method {
        Method::TwoBody => twobody::propagate(&elements, start_time, end_time, num_points, GM_SUN, designation),
        Method::NBody => {
            let planets = if planets.is_empty() { default_planets } else { planets };
            let state = crate::kepler::keplerian_to_cartesian(&elements, start_time, GM_SUN)?;
            crate::nbody::propagate_from_state(
                &state,
                end_time - start_time,
                num_points,
                GM_SUN,
                ephemeris,
                planets,
                tol,
                designation,
            )
        }
    }
}

/// Continue a previously produced `StateVector` for `dt_days`, sampling
/// `num_points` points, via the requested method. When `planets` is
/// empty, `default_planets` is used in its place.
pub fn propagate_from_state(
    ephemeris: &dyn EphemerisProvider,
    state: &StateVector,
    dt_days: f64,
    num_points: usize,
    method: Method,
    planets: &[Planet],
    default_planets: &[Planet],
    tol: Tolerances,
    designation: &str,
) -> CoreResult<TrajectoryResult> {
    match method {
        Method::TwoBody => continuation::continue_twobody(state, dt_days, num_points, GM_SUN, designation),
        Method::NBody => {
            let planets = if planets.is_empty() { default_planets } else { planets };
            continuation::continue_nbody(state, dt_days, num_points, GM_SUN, ephemeris, planets, tol, designation)
        }
    }
}

/// Run a batch of propagation jobs, consulting/populating `cache`. `tol`
/// applies to every N-body job in the batch; `default_planets` is applied
/// to any job that specifies no perturbers of its own.
pub fn batch(
    catalog: &dyn Catalog,
    cache: &TrajectoryCache,
    ephemeris: &dyn EphemerisProvider,
    request: BatchRequest,
    max_batch_size: usize,
    default_planets: &[Planet],
    tol: Tolerances,
) -> Result<BatchOutcome, TrajectoryError> {
    run_batch(catalog, cache, ephemeris, request, max_batch_size, default_planets, tol)
}

/// Summary statistics over everything a catalog knows about.
pub fn catalog_stats(catalog: &dyn Catalog) -> CatalogStats {
    catalog.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::ephemeris::MeanElementEphemeris;

    #[test]
    fn test_propagate_elements_unknown_designation() {
        let catalog = StaticCatalog::new();
        let ephemeris = MeanElementEphemeris::new();
        let result = propagate_elements(
            &catalog,
            &ephemeris,
            "does-not-exist",
            2451545.0,
            2451546.0,
            2,
            Method::TwoBody,
            &[],
            &[],
            Tolerances::default(),
        );
        assert!(matches!(result, Err(TrajectoryError::NotFound(_))));
    }

    #[test]
    fn test_propagate_elements_earth_analog_two_body() {
        let catalog = StaticCatalog::new();
        let ephemeris = MeanElementEphemeris::new();
        let result = propagate_elements(
            &catalog,
            &ephemeris,
            "Earth-analog",
            2451545.0,
            2451545.0 + 365.25636,
            10,
            Method::TwoBody,
            &[],
            &[],
            Tolerances::default(),
        )
        .unwrap();
        assert_eq!(result.method, Method::TwoBody);
        assert_eq!(result.samples.len(), 10);
    }

    #[test]
    fn test_propagate_elements_nbody_falls_back_to_default_planets() {
        use crate::planets::Planet;

        let catalog = StaticCatalog::new();
        let ephemeris = MeanElementEphemeris::new();
        let with_default = propagate_elements(
            &catalog,
            &ephemeris,
            "Earth-analog",
            2451545.0,
            2451545.0 + 365.25,
            5,
            Method::NBody,
            &[],
            &[Planet::Jupiter],
            Tolerances::default(),
        )
        .unwrap();
        let with_explicit = propagate_elements(
            &catalog,
            &ephemeris,
            "Earth-analog",
            2451545.0,
            2451545.0 + 365.25,
            5,
            Method::NBody,
            &[Planet::Jupiter],
            &[],
            Tolerances::default(),
        )
        .unwrap();
        assert_eq!(with_default.final_state.position, with_explicit.final_state.position);
    }

    #[test]
    fn test_catalog_stats_nonzero() {
        let catalog = StaticCatalog::new();
        let stats = catalog_stats(&catalog);
        assert!(stats.total > 0);
    }
}
