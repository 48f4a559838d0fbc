//! Thin time-scale helpers built on `hifitime`.
//!
//! Every other module in this crate works in plain Julian Date `f64`s
//! (TDB, matching the dynamical time scale orbital elements are quoted
//! in). This module is the only place that talks to calendar dates or
//! UTC, keeping the scale conversion in one spot.

use hifitime::Epoch;

/// Convert a UTC calendar date/time to a TDB Julian Date.
pub fn julian_date_tdb_from_utc(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: f64) -> f64 {
    let secs = second.floor() as u8;
    let nanos = ((second - second.floor()) * 1_000_000_000.0) as u32;
    let epoch = Epoch::from_gregorian_utc(year, month, day, hour, minute, secs, nanos);
    epoch.to_jde_tdb_days()
}

/// The current instant, as a TDB Julian Date.
pub fn now_jd_tdb() -> f64 {
    Epoch::now().expect("system clock unavailable").to_jde_tdb_days()
}

/// Julian centuries since J2000.0 TDB, the time argument most ephemeris
/// series (including VSOP87) are parameterized by.
pub fn julian_centuries_tdb(jd_tdb: f64) -> f64 {
    (jd_tdb - 2451545.0) / 36525.0
}
