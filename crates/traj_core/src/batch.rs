//! Batch driver: run many propagation jobs concurrently, with a bounded
//! result cache shared across the run.
//!
//! Two-body and N-body jobs are dispatched across the same `rayon`
//! thread pool. The upstream design this crate is modeled on runs
//! N-body jobs in a process pool instead of a thread pool, to work
//! around CPU-bound code sharing one interpreter lock; a natively
//! threaded implementation has no such lock, so both job kinds share
//! one pool here.

use crate::catalog::Catalog;
use crate::constants::GM_SUN;
use crate::continuation;
use crate::ephemeris::EphemerisProvider;
use crate::error::TrajectoryError;
use crate::nbody::Tolerances;
use crate::planets::Planet;
use crate::trajectory::{Method, TrajectoryResult};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub designation: String,
    pub start_time: f64,
    pub end_time: f64,
    pub num_points: usize,
    pub method: Method,
    pub planets: Vec<Planet>,
}

#[derive(Debug, Clone)]
pub struct BatchRequest(pub Vec<BatchJob>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    designation: String,
    start_time_bits: u64,
    end_time_bits: u64,
    num_points: usize,
    method: &'static str,
    /// Resolved perturber set (after the job's own `planets` falls back to
    /// `default_planets`), sorted so two requests naming the same planets
    /// in a different order still hit the same entry. Two N-body jobs
    /// differing only in perturbers must never collide in the cache.
    planets: Vec<Planet>,
    /// N-body step-size tolerances; ignored (always empty) for two-body
    /// jobs, which have no tolerance-dependent numerics to distinguish.
    tol_bits: Option<(u64, u64)>,
}

impl CacheKey {
    fn from_job(job: &BatchJob, resolved_planets: &[Planet], tol: Tolerances) -> Self {
        let mut planets = if job.method == Method::NBody { resolved_planets.to_vec() } else { Vec::new() };
        planets.sort_by_key(|p| *p as u8);
        Self {
            designation: job.designation.clone(),
            start_time_bits: job.start_time.to_bits(),
            end_time_bits: job.end_time.to_bits(),
            num_points: job.num_points,
            method: job.method.as_str(),
            planets,
            tol_bits: (job.method == Method::NBody).then_some((tol.rtol.to_bits(), tol.atol.to_bits())),
        }
    }
}

struct LruEntry {
    value: TrajectoryResult,
    recency: u64,
}

/// Bounded least-recently-used cache, hand-rolled: a `HashMap` keyed by
/// job parameters plus a monotonically increasing recency counter per
/// entry. Eviction scans for the minimum recency, which is O(n) but
/// capacities here are small (hundreds of entries) and this avoids
/// pulling in an external LRU crate for one data structure.
pub struct TrajectoryCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<CacheKey, LruEntry>,
    clock: u64,
}

impl TrajectoryCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, inner: Mutex::new(CacheInner { entries: HashMap::new(), clock: 0 }) }
    }

    fn get(&self, key: &CacheKey) -> Option<TrajectoryResult> {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.recency = clock;
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn put(&self, key: CacheKey, value: TrajectoryResult) {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;

        if inner.entries.len() >= self.capacity && !inner.entries.contains_key(&key) {
            if let Some(evict_key) = inner.entries.iter().min_by_key(|(_, e)| e.recency).map(|(k, _)| k.clone()) {
                inner.entries.remove(&evict_key);
            }
        }
        inner.entries.insert(key, LruEntry { value, recency: clock });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: HashMap<String, TrajectoryResult>,
    pub errors: HashMap<String, TrajectoryError>,
    pub not_found: Vec<String>,
}

/// Run every job in `request` against `catalog`, consulting and
/// populating `cache`, across a `rayon` thread pool. Jobs whose
/// designation is unknown land in `not_found`; jobs that fail
/// propagation land in `errors`; everything else lands in `results`.
/// One job's failure never aborts the others.
pub fn run_batch(
    catalog: &dyn Catalog,
    cache: &TrajectoryCache,
    ephemeris: &dyn EphemerisProvider,
    request: BatchRequest,
    max_batch_size: usize,
    default_planets: &[Planet],
    tol: Tolerances,
) -> Result<BatchOutcome, TrajectoryError> {
    if request.0.len() > max_batch_size {
        return Err(TrajectoryError::InvalidRequest(format!(
            "batch of {} jobs exceeds max_batch_size {}",
            request.0.len(),
            max_batch_size
        )));
    }

    enum JobOutcome {
        Result(String, TrajectoryResult),
        Error(String, TrajectoryError),
        NotFound(String),
    }

    let outcomes: Vec<JobOutcome> = request
        .0
        .par_iter()
        .map(|job| {
            let Some(elements) = catalog.find(&job.designation) else {
                return JobOutcome::NotFound(job.designation.clone());
            };

            let resolved_planets = if job.planets.is_empty() { default_planets } else { &job.planets };
            let key = CacheKey::from_job(job, resolved_planets, tol);
            if let Some(cached) = cache.get(&key) {
                return JobOutcome::Result(job.designation.clone(), cached);
            }

            let propagated = match job.method {
                Method::TwoBody => crate::twobody::propagate(
                    &elements,
                    job.start_time,
                    job.end_time,
                    job.num_points,
                    GM_SUN,
                    &job.designation,
                ),
                Method::NBody => {
                    let state = match crate::kepler::keplerian_to_cartesian(&elements, job.start_time, GM_SUN) {
                        Ok(s) => s,
                        Err(e) => return JobOutcome::Error(job.designation.clone(), e),
                    };
                    let planets = resolved_planets;
                    continuation::continue_nbody(
                        &state,
                        job.end_time - job.start_time,
                        job.num_points,
                        GM_SUN,
                        ephemeris,
                        planets,
                        tol,
                        &job.designation,
                    )
                }
            };

            match propagated {
                Ok(result) => {
                    cache.put(key, result.clone());
                    JobOutcome::Result(job.designation.clone(), result)
                }
                Err(e) => JobOutcome::Error(job.designation.clone(), e),
            }
        })
        .collect();

    let mut outcome = BatchOutcome::default();
    for item in outcomes {
        match item {
            JobOutcome::Result(designation, result) => {
                outcome.results.insert(designation, result);
            }
            JobOutcome::Error(designation, error) => {
                outcome.errors.insert(designation, error);
            }
            JobOutcome::NotFound(designation) => {
                outcome.not_found.push(designation);
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::ephemeris::MeanElementEphemeris;

    fn two_body_job(designation: &str) -> BatchJob {
        BatchJob {
            designation: designation.to_string(),
            start_time: 2451545.0,
            end_time: 2451545.0 + 100.0,
            num_points: 5,
            method: Method::TwoBody,
            planets: Vec::new(),
        }
    }

    #[test]
    fn test_unknown_designation_reported_not_found() {
        let catalog = StaticCatalog::new();
        let cache = TrajectoryCache::new(16);
        let ephemeris = MeanElementEphemeris::new();
        let request = BatchRequest(vec![two_body_job("does-not-exist")]);
        let outcome = run_batch(&catalog, &cache, &ephemeris, request, 500, &[], Tolerances::default()).unwrap();
        assert_eq!(outcome.not_found, vec!["does-not-exist".to_string()]);
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_known_designation_produces_result() {
        let catalog = StaticCatalog::new();
        let cache = TrajectoryCache::new(16);
        let ephemeris = MeanElementEphemeris::new();
        let request = BatchRequest(vec![two_body_job("Earth-analog")]);
        let outcome = run_batch(&catalog, &cache, &ephemeris, request, 500, &[], Tolerances::default()).unwrap();
        assert!(outcome.results.contains_key("Earth-analog"));
    }

    #[test]
    fn test_cache_populated_after_run() {
        let catalog = StaticCatalog::new();
        let cache = TrajectoryCache::new(16);
        let ephemeris = MeanElementEphemeris::new();
        let request = BatchRequest(vec![two_body_job("Earth-analog")]);
        assert!(cache.is_empty());
        run_batch(&catalog, &cache, &ephemeris, request, 500, &[], Tolerances::default()).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_batch_over_cap_rejected() {
        let catalog = StaticCatalog::new();
        let cache = TrajectoryCache::new(16);
        let ephemeris = MeanElementEphemeris::new();
        let request = BatchRequest(vec![two_body_job("Earth-analog"); 3]);
        let result = run_batch(&catalog, &cache, &ephemeris, request, 2, &[], Tolerances::default());
        assert!(matches!(result, Err(TrajectoryError::InvalidRequest(_))));
    }

    #[test]
    fn test_cache_distinguishes_jobs_by_perturber_set() {
        let catalog = StaticCatalog::new();
        let cache = TrajectoryCache::new(16);
        let ephemeris = MeanElementEphemeris::new();

        let unperturbed_job = BatchJob {
            designation: "Earth-analog".to_string(),
            start_time: 2451545.0,
            end_time: 2451545.0 + 365.25 * 5.0,
            num_points: 5,
            method: Method::NBody,
            planets: Vec::new(),
        };
        let mut perturbed_job = unperturbed_job.clone();
        perturbed_job.planets = vec![Planet::Jupiter];

        let unperturbed = run_batch(
            &catalog,
            &cache,
            &ephemeris,
            BatchRequest(vec![unperturbed_job]),
            500,
            &[],
            Tolerances::default(),
        )
        .unwrap();
        let perturbed = run_batch(
            &catalog,
            &cache,
            &ephemeris,
            BatchRequest(vec![perturbed_job]),
            500,
            &[],
            Tolerances::default(),
        )
        .unwrap();

        assert_eq!(cache.len(), 2);
        let unperturbed_result = &unperturbed.results["Earth-analog"];
        let perturbed_result = &perturbed.results["Earth-analog"];
        assert_ne!(unperturbed_result.final_state.position, perturbed_result.final_state.position);
    }

    #[test]
    fn test_cache_eviction_respects_capacity() {
        let cache = TrajectoryCache::new(2);
        let catalog = StaticCatalog::new();
        let ephemeris = MeanElementEphemeris::new();
        for designation in ["Earth-analog", "1P/Halley", "Pluto"] {
            let request = BatchRequest(vec![two_body_job(designation)]);
            run_batch(&catalog, &cache, &ephemeris, request, 500, &[], Tolerances::default()).unwrap();
        }
        assert_eq!(cache.len(), 2);
    }
}
