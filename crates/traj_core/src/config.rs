//! Runtime configuration for the orbital mechanics kernel.
//!
//! Physical constants (GM_SUN, planetary GMs, obliquity) are not
//! configurable — they live in `constants` as `pub const`s. What's here
//! is everything a deployment might reasonably want to tune without a
//! rebuild: ephemeris source, batch limits, cache size.

use crate::nbody::Tolerances;
use crate::planets::Planet;
use std::env;
use std::path::PathBuf;

/// Default cap on concurrent jobs accepted by a single batch request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default bound on the number of cached trajectory results kept resident.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing per-planet binary ephemeris kernels. `None`
    /// means the mean-element fallback is used unconditionally.
    pub ephemeris_kernel_path: Option<PathBuf>,
    pub max_batch_size: usize,
    pub cache_capacity: usize,
    /// Step-size control tolerances for the N-body integrator.
    pub nbody_tolerances: Tolerances,
    /// Perturber set applied to an N-body request when the caller
    /// specifies none.
    pub default_planets: Vec<Planet>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ephemeris_kernel_path: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            nbody_tolerances: Tolerances::default(),
            default_planets: Planet::DEFAULT_PERTURBERS.to_vec(),
        }
    }
}

impl Config {
    /// Build a `Config` from environment variables, falling back to
    /// defaults for anything unset or unparsable:
    /// `TRAJ_EPHEMERIS_KERNEL_PATH`, `TRAJ_MAX_BATCH_SIZE`,
    /// `TRAJ_CACHE_CAPACITY`, `TRAJ_NBODY_RTOL`, `TRAJ_NBODY_ATOL`,
    /// `TRAJ_DEFAULT_PLANETS` (comma-separated planet names).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ephemeris_kernel_path: env::var("TRAJ_EPHEMERIS_KERNEL_PATH").ok().map(PathBuf::from),
            max_batch_size: env::var("TRAJ_MAX_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_batch_size),
            cache_capacity: env::var("TRAJ_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_capacity),
            nbody_tolerances: Tolerances {
                rtol: env::var("TRAJ_NBODY_RTOL")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.nbody_tolerances.rtol),
                atol: env::var("TRAJ_NBODY_ATOL")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.nbody_tolerances.atol),
            },
            default_planets: env::var("TRAJ_DEFAULT_PLANETS")
                .ok()
                .map(|v| v.split(',').filter_map(|name| Planet::from_name(name.trim())).collect())
                .unwrap_or(defaults.default_planets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_kernel_path() {
        let config = Config::default();
        assert!(config.ephemeris_kernel_path.is_none());
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
    }

    #[test]
    fn test_default_planets_are_the_gas_giants() {
        let config = Config::default();
        assert_eq!(config.default_planets, Planet::DEFAULT_PERTURBERS.to_vec());
    }
}
