//! Catalog boundary: looking up orbital elements by designation.
//!
//! `Catalog` is a trait rather than a concrete store so that a real
//! deployment can back it with a database or a minor-planet-center feed
//! without touching the propagators. This crate ships one in-memory
//! implementation, `StaticCatalog`, seeded with a handful of worked
//! examples and the well-known comets and dwarf planet already used
//! elsewhere in this corpus.

use crate::kepler::{KeplerianElements, OrbitFamily, ECCENTRICITY_NEAR_PARABOLIC_EPS};
use std::collections::HashMap;

pub trait Catalog: Send + Sync {
    fn find(&self, designation: &str) -> Option<KeplerianElements>;
    fn stats(&self) -> CatalogStats;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogStats {
    pub total: usize,
    pub periodic: usize,
    pub hyperbolic: usize,
    pub parabolic: usize,
}

/// An in-memory catalog seeded at construction time. Designation lookup
/// is case-sensitive and exact, matching how the worked examples and
/// small-body designations are conventionally written.
pub struct StaticCatalog {
    entries: HashMap<String, KeplerianElements>,
}

/// Build a `KeplerianElements` from perihelion distance / eccentricity /
/// perihelion-passage time, the convention JPL small-body elements and
/// this corpus's comet table both use. Mean anomaly is zero at the
/// perihelion epoch by definition, for both elliptical and hyperbolic
/// orbits.
fn from_perihelion(q: f64, e: f64, i_deg: f64, node_deg: f64, arg_peri_deg: f64, perihelion_jd: f64) -> KeplerianElements {
    let a = q / (1.0 - e);
    KeplerianElements::new(a, e, i_deg.to_radians(), node_deg.to_radians(), arg_peri_deg.to_radians(), 0.0, perihelion_jd)
        .expect("catalog-seeded elements are always valid")
}

impl StaticCatalog {
    pub fn new() -> Self {
        let mut entries = HashMap::new();

        // Worked examples.
        entries.insert(
            "Earth-analog".to_string(),
            KeplerianElements::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2451545.0).unwrap(),
        );
        entries.insert(
            "1P/Halley".to_string(),
            from_perihelion(0.586, 0.96714, 162.2627, 58.4201, 111.3325, 2449400.5),
        );

        // Periodic comets, perihelion-distance elements (JPL Small-Body
        // Database), mirroring the comet table used elsewhere in this
        // corpus.
        entries.insert(
            "2P/Encke".to_string(),
            from_perihelion(0.336, 0.8483, 11.78, 334.57, 186.54, 2460229.5),
        );
        entries.insert(
            "67P/C-G".to_string(),
            from_perihelion(1.243, 0.6405, 7.04, 50.19, 12.78, 2460585.5),
        );
        entries.insert(
            "46P/Wirtanen".to_string(),
            from_perihelion(1.055, 0.6588, 11.75, 82.16, 356.34, 2460405.5),
        );

        // Notable non-periodic comets: near-parabolic and hyperbolic.
        entries.insert(
            "C/2020 F3 NEOWISE".to_string(),
            from_perihelion(0.295, 0.9992, 128.94, 61.01, 37.28, 2459034.18),
        );
        entries.insert(
            "C/2023 A3 T-ATLAS".to_string(),
            from_perihelion(0.391, 1.0001, 139.11, 21.55, 308.48, 2460585.3),
        );
        entries.insert(
            "C/1995 O1 Hale-Bopp".to_string(),
            from_perihelion(0.914, 0.9951, 89.43, 282.47, 130.59, 2450538.9),
        );

        // Pluto, mean-element form (JPL Horizons, epoch J2000.0).
        entries.insert(
            "Pluto".to_string(),
            KeplerianElements::new(
                39.48211675,
                0.2488273,
                17.14175_f64.to_radians(),
                110.30347_f64.to_radians(),
                113.76329_f64.to_radians(),
                14.86205_f64.to_radians(),
                2451545.0,
            )
            .unwrap(),
        );

        Self { entries }
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for StaticCatalog {
    fn find(&self, designation: &str) -> Option<KeplerianElements> {
        self.entries.get(designation).copied()
    }

    fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats { total: self.entries.len(), ..Default::default() };
        for elements in self.entries.values() {
            if (elements.e - 1.0).abs() < ECCENTRICITY_NEAR_PARABOLIC_EPS {
                stats.parabolic += 1;
            } else if elements.classify() == OrbitFamily::Hyperbolic {
                stats.hyperbolic += 1;
            } else {
                stats.periodic += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_earth_analog() {
        let catalog = StaticCatalog::new();
        let elements = catalog.find("Earth-analog").unwrap();
        assert_eq!(elements.a, 1.0);
        assert_eq!(elements.e, 0.0);
    }

    #[test]
    fn test_find_unknown_returns_none() {
        let catalog = StaticCatalog::new();
        assert!(catalog.find("does-not-exist").is_none());
    }

    #[test]
    fn test_stats_counts_hyperbolic_comet() {
        let catalog = StaticCatalog::new();
        let stats = catalog.stats();
        assert!(stats.hyperbolic >= 1, "Tsuchinshan-ATLAS (e>1) should count as hyperbolic");
        assert_eq!(stats.total, catalog.entries.len());
    }

    #[test]
    fn test_halley_elements_match_known_period() {
        let catalog = StaticCatalog::new();
        let elements = catalog.find("1P/Halley").unwrap();
        assert!((elements.perihelion_distance() - 0.586).abs() < 1e-6);
    }
}
