//! Ephemeris Provider: planet positions for the N-body force model.
//!
//! Two backends share one trait: a VSOP87-based high-precision mode, and
//! a tabulated-mean-elements fallback that lets the N-body propagator run
//! with no external data file. A process-wide `select_ephemeris` factory
//! picks between them with a "degrade by default" policy: expose
//! `availability()` for callers who want to reject the low-accuracy mode
//! explicitly.

use crate::config::Config;
use crate::constants::{planet_gm, GM_SUN};
use crate::error::{CoreResult, TrajectoryError};
use crate::kepler::{keplerian_to_cartesian, KeplerianElements};
use crate::planets::Planet;
use crate::vector::Vector3;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use vsop87::vsop87a;

/// Which backend(s) are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub kernel: bool,
    pub mean_elements: bool,
}

/// Supplies planet position and GM to the N-body force model. Shared,
/// read-only, thread-safe: a single provider instance is wrapped in an
/// `Arc` and handed to every concurrent propagation.
pub trait EphemerisProvider: Send + Sync {
    fn position(&self, planet: Planet, t: f64) -> CoreResult<Vector3>;
    fn gm(&self, planet: Planet) -> f64;
    fn availability(&self) -> Availability;
}

/// High-precision mode: VSOP87A heliocentric rectangular ecliptic J2000
/// coordinates. Pure function of (planet, t); no interior mutability is
/// needed to satisfy a lock-free, read-only sharing contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vsop87Ephemeris;

impl Vsop87Ephemeris {
    pub fn new() -> Self {
        Self
    }
}

impl EphemerisProvider for Vsop87Ephemeris {
    fn position(&self, planet: Planet, t: f64) -> CoreResult<Vector3> {
        let coords = match planet {
            Planet::Mercury => vsop87a::mercury(t),
            Planet::Venus => vsop87a::venus(t),
            Planet::Earth => vsop87a::earth(t),
            Planet::Mars => vsop87a::mars(t),
            Planet::Jupiter => vsop87a::jupiter(t),
            Planet::Saturn => vsop87a::saturn(t),
            Planet::Uranus => vsop87a::uranus(t),
            Planet::Neptune => vsop87a::neptune(t),
        };
        Ok(Vector3::new(coords.x, coords.y, coords.z))
    }

    fn gm(&self, planet: Planet) -> f64 {
        planet_gm(planet)
    }

    fn availability(&self) -> Availability {
        Availability { kernel: true, mean_elements: false }
    }
}

/// Fallback mode: tabulated mean Keplerian elements, referenced to
/// J2000.0, propagated analytically via the Kepler Kernel. Less accurate
/// than VSOP87A but requires no external data.
#[derive(Debug, Clone, Copy)]
struct MeanElementSet {
    planet: Planet,
    elements: KeplerianElementsJ2000,
}

/// Mean elements at J2000.0 (a in AU, angles in degrees as published;
/// converted to radians at construction time). Source: standard
/// low-precision planetary element tables (JPL "Keplerian Elements for
/// Approximate Positions of the Major Planets").
#[derive(Debug, Clone, Copy)]
struct KeplerianElementsJ2000 {
    a: f64,
    e: f64,
    i_deg: f64,
    mean_longitude_deg: f64,
    longitude_perihelion_deg: f64,
    longitude_node_deg: f64,
}

const J2000: f64 = 2451545.0;

fn mean_element_table() -> [MeanElementSet; 8] {
    [
        MeanElementSet {
            planet: Planet::Mercury,
            elements: KeplerianElementsJ2000 { a: 0.38709927, e: 0.20563593, i_deg: 7.00497902, mean_longitude_deg: 252.25032350, longitude_perihelion_deg: 77.45779628, longitude_node_deg: 48.33076593 },
        },
        MeanElementSet {
            planet: Planet::Venus,
            elements: KeplerianElementsJ2000 { a: 0.72333566, e: 0.00677672, i_deg: 3.39467605, mean_longitude_deg: 181.97909950, longitude_perihelion_deg: 131.60246718, longitude_node_deg: 76.67984255 },
        },
        MeanElementSet {
            planet: Planet::Earth,
            elements: KeplerianElementsJ2000 { a: 1.00000261, e: 0.01671123, i_deg: -0.00001531, mean_longitude_deg: 100.46457166, longitude_perihelion_deg: 102.93768193, longitude_node_deg: 0.0 },
        },
        MeanElementSet {
            planet: Planet::Mars,
            elements: KeplerianElementsJ2000 { a: 1.52371034, e: 0.09339410, i_deg: 1.84969142, mean_longitude_deg: -4.55343205, longitude_perihelion_deg: -23.94362959, longitude_node_deg: 49.55953891 },
        },
        MeanElementSet {
            planet: Planet::Jupiter,
            elements: KeplerianElementsJ2000 { a: 5.20288700, e: 0.04838624, i_deg: 1.30439695, mean_longitude_deg: 34.39644051, longitude_perihelion_deg: 14.72847983, longitude_node_deg: 100.47390909 },
        },
        MeanElementSet {
            planet: Planet::Saturn,
            elements: KeplerianElementsJ2000 { a: 9.53667594, e: 0.05386179, i_deg: 2.48599187, mean_longitude_deg: 49.95424423, longitude_perihelion_deg: 92.59887831, longitude_node_deg: 113.66242448 },
        },
        MeanElementSet {
            planet: Planet::Uranus,
            elements: KeplerianElementsJ2000 { a: 19.18916464, e: 0.04725744, i_deg: 0.77263783, mean_longitude_deg: 313.23810451, longitude_perihelion_deg: 170.95427630, longitude_node_deg: 74.01692503 },
        },
        MeanElementSet {
            planet: Planet::Neptune,
            elements: KeplerianElementsJ2000 { a: 30.06992276, e: 0.00859048, i_deg: 1.77004347, mean_longitude_deg: -55.12002969, longitude_perihelion_deg: 44.96476227, longitude_node_deg: 131.78422574 },
        },
    ]
}

impl MeanElementSet {
    fn to_keplerian(&self) -> KeplerianElements {
        let e = self.elements;
        let ascending_node = e.longitude_node_deg.to_radians();
        let arg_perihelion = (e.longitude_perihelion_deg - e.longitude_node_deg).to_radians();
        let mean_anomaly = (e.mean_longitude_deg - e.longitude_perihelion_deg).to_radians();
        KeplerianElements::new(
            e.a,
            e.e,
            e.i_deg.to_radians().abs(),
            ascending_node,
            arg_perihelion,
            mean_anomaly,
            J2000,
        )
        .expect("tabulated mean elements are always valid")
    }
}

/// Fallback ephemeris mode. Holds no external state;
/// `position` re-derives a position from the tabulated mean elements each
/// call, same as any other pure Kepler Kernel evaluation.
#[derive(Debug, Clone, Default)]
pub struct MeanElementEphemeris;

impl MeanElementEphemeris {
    pub fn new() -> Self {
        Self
    }
}

impl EphemerisProvider for MeanElementEphemeris {
    fn position(&self, planet: Planet, t: f64) -> CoreResult<Vector3> {
        let set = mean_element_table()
            .into_iter()
            .find(|s| s.planet == planet)
            .expect("mean_element_table covers all Planet variants");
        let elements = set.to_keplerian();
        let state = keplerian_to_cartesian(&elements, t, GM_SUN)?;
        Ok(state.position)
    }

    fn gm(&self, planet: Planet) -> f64 {
        planet_gm(planet)
    }

    fn availability(&self) -> Availability {
        Availability { kernel: false, mean_elements: true }
    }
}

/// A single planet's tabulated (time, position) samples loaded from a
/// binary kernel file. Positions in
/// between samples are linearly interpolated; requests outside the
/// covered span return `EphemerisUnavailable`.
#[derive(Debug, Clone)]
struct KernelTable {
    times: Vec<f64>,
    positions: Vec<Vector3>,
}

impl KernelTable {
    /// Binary layout: `[count: u32 LE]` followed by `count` records of
    /// `[jd: f64, x: f64, y: f64, z: f64]` (little-endian), sorted by jd.
    /// Mirrors the binary ephemeris format already used for ISS tracking
    /// in this corpus.
    fn from_bytes(data: &[u8]) -> CoreResult<Self> {
        if data.len() < 4 {
            return Err(TrajectoryError::InvalidRequest("kernel file too short for header".into()));
        }
        let count = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        let record_len = 32;
        let expected = 4 + count * record_len;
        if data.len() < expected {
            return Err(TrajectoryError::InvalidRequest("kernel file truncated".into()));
        }

        let mut times = Vec::with_capacity(count);
        let mut positions = Vec::with_capacity(count);
        let mut offset = 4;
        for _ in 0..count {
            let read_f64 = |o: usize| f64::from_le_bytes(data[o..o + 8].try_into().unwrap());
            times.push(read_f64(offset));
            positions.push(Vector3::new(
                read_f64(offset + 8),
                read_f64(offset + 16),
                read_f64(offset + 24),
            ));
            offset += record_len;
        }

        Ok(Self { times, positions })
    }

    fn position_at(&self, t: f64) -> CoreResult<Vector3> {
        if self.times.is_empty() || t < self.times[0] || t > *self.times.last().unwrap() {
            return Err(TrajectoryError::EphemerisUnavailable(t));
        }
        match self.times.binary_search_by(|probe| probe.partial_cmp(&t).unwrap()) {
            Ok(idx) => Ok(self.positions[idx]),
            Err(idx) => {
                let (p0, t0) = (self.positions[idx - 1], self.times[idx - 1]);
                let (p1, t1) = (self.positions[idx], self.times[idx]);
                let frac = (t - t0) / (t1 - t0);
                Ok(p0 + (p1 - p0) * frac)
            }
        }
    }
}

/// Primary mode: per-planet kernel tables loaded once from disk, behind
/// a one-time initialization barrier (`OnceLock`), then read lock-free
/// behind a one-time load. Planets with no table loaded fall through to the
/// mean-element model for that single planet, so a partial kernel
/// directory still degrades gracefully rather than failing outright.
pub struct KernelEphemeris {
    tables: [OnceLock<Option<KernelTable>>; 8],
    mean_fallback: MeanElementEphemeris,
}

impl KernelEphemeris {
    /// Load kernel files named `<planet-lowercase>.bin` from `dir`. Any
    /// planet whose file is missing or unreadable silently falls back to
    /// mean elements for that planet alone.
    pub fn load(dir: &Path) -> Self {
        let tables: [OnceLock<Option<KernelTable>>; 8] = Default::default();
        for (slot, planet) in tables.iter().zip(Planet::ALL) {
            let path = dir.join(format!("{}.bin", planet.name().to_lowercase()));
            let table = fs::read(&path).ok().and_then(|bytes| KernelTable::from_bytes(&bytes).ok());
            if table.is_none() {
                log::warn!("no ephemeris kernel for {planet} at {}; falling back to mean elements", path.display());
            }
            let _ = slot.set(table);
        }
        Self { tables, mean_fallback: MeanElementEphemeris::new() }
    }

    fn table_for(&self, planet: Planet) -> Option<&KernelTable> {
        let idx = planet as usize;
        self.tables[idx].get().and_then(|t| t.as_ref())
    }
}

impl EphemerisProvider for KernelEphemeris {
    fn position(&self, planet: Planet, t: f64) -> CoreResult<Vector3> {
        match self.table_for(planet) {
            Some(table) => table.position_at(t),
            None => self.mean_fallback.position(planet, t),
        }
    }

    fn gm(&self, planet: Planet) -> f64 {
        planet_gm(planet)
    }

    fn availability(&self) -> Availability {
        let any_kernel = Planet::ALL.iter().any(|&p| self.table_for(p).is_some());
        Availability { kernel: any_kernel, mean_elements: true }
    }
}

/// Select the ephemeris backend per `config.ephemeris_kernel_path`:
/// degrade to mean elements rather than fail closed when no kernel is
/// configured.
pub fn select_ephemeris(config: &Config) -> Arc<dyn EphemerisProvider> {
    match &config.ephemeris_kernel_path {
        Some(path) if path.is_dir() => {
            log::info!("loading ephemeris kernels from {}", path.display());
            Arc::new(KernelEphemeris::load(path))
        }
        Some(path) => {
            log::warn!("ephemeris_kernel_path {} is not a directory; using mean elements", path.display());
            Arc::new(MeanElementEphemeris::new())
        }
        None => {
            log::info!("no ephemeris_kernel_path configured; using tabulated mean elements");
            Arc::new(MeanElementEphemeris::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vsop87_jupiter_distance_reasonable() {
        let eph = Vsop87Ephemeris::new();
        let pos = eph.position(Planet::Jupiter, J2000).unwrap();
        let r = pos.norm();
        assert!(r > 4.5 && r < 6.5, "Jupiter heliocentric distance should be ~5.2 AU, got {r}");
    }

    #[test]
    fn test_mean_element_jupiter_distance_reasonable() {
        let eph = MeanElementEphemeris::new();
        let pos = eph.position(Planet::Jupiter, J2000).unwrap();
        let r = pos.norm();
        assert!(r > 4.5 && r < 6.5, "Jupiter mean-element distance should be ~5.2 AU, got {r}");
    }

    #[test]
    fn test_mean_element_agrees_with_vsop87_loosely() {
        let mean = MeanElementEphemeris::new().position(Planet::Saturn, J2000).unwrap();
        let precise = Vsop87Ephemeris::new().position(Planet::Saturn, J2000).unwrap();
        let delta = (mean - precise).norm();
        // Mean elements are explicitly lower fidelity;
        // this just bounds the fallback to the same ballpark.
        assert!(delta < 1.0, "mean-element Saturn position should be within 1 AU of VSOP87A, got {delta}");
    }

    #[test]
    fn test_availability_reports_mode() {
        assert_eq!(
            Vsop87Ephemeris::new().availability(),
            Availability { kernel: true, mean_elements: false }
        );
        assert_eq!(
            MeanElementEphemeris::new().availability(),
            Availability { kernel: false, mean_elements: true }
        );
    }

    #[test]
    fn test_kernel_table_out_of_coverage() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_le_bytes());
        for (jd, x) in [(2451545.0, 5.0), (2451546.0, 5.1)] {
            data.extend_from_slice(&jd.to_f64_bytes());
            data.extend_from_slice(&x.to_f64_bytes());
            data.extend_from_slice(&0.0f64.to_le_bytes());
            data.extend_from_slice(&0.0f64.to_le_bytes());
        }
        let table = KernelTable::from_bytes(&data).unwrap();
        assert!(table.position_at(2451545.5).is_ok());
        assert!(matches!(table.position_at(2451999.0), Err(TrajectoryError::EphemerisUnavailable(_))));
    }

    trait ToF64Bytes {
        fn to_f64_bytes(self) -> [u8; 8];
    }
    impl ToF64Bytes for f64 {
        fn to_f64_bytes(self) -> [u8; 8] {
            self.to_le_bytes()
        }
    }
}
