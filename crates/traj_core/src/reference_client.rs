//! Blocking HTTP client for fetching reference state vectors from an
//! external ephemeris service, used only by the validation test suite.
//! Gated behind the `reference-client` feature so default builds never
//! link or touch the network; never called from `batch`, `continuation`,
//! or the CLI.

use crate::error::{CoreResult, TrajectoryError};
use crate::kepler::StateVector;
use crate::vector::Vector3;
use std::thread;
use std::time::{Duration, Instant};

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Simple token-bucket rate limiter: at most `max_per_second` requests
/// are let through per rolling one-second window.
pub struct RateLimiter {
    max_per_second: u32,
    window_start: Instant,
    used_in_window: u32,
}

impl RateLimiter {
    pub fn new(max_per_second: u32) -> Self {
        Self { max_per_second, window_start: Instant::now(), used_in_window: 0 }
    }

    fn acquire(&mut self) {
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.window_start = Instant::now();
            self.used_in_window = 0;
        }
        if self.used_in_window >= self.max_per_second {
            let remaining = Duration::from_secs(1) - elapsed;
            thread::sleep(remaining);
            self.window_start = Instant::now();
            self.used_in_window = 0;
        }
        self.used_in_window += 1;
    }
}

pub struct ReferenceClient {
    base_url: String,
    rate_limiter: RateLimiter,
}

impl ReferenceClient {
    pub fn new(base_url: impl Into<String>, max_requests_per_second: u32) -> Self {
        Self { base_url: base_url.into(), rate_limiter: RateLimiter::new(max_requests_per_second) }
    }

    /// Fetch a reference heliocentric state vector for `designation` at
    /// Julian Date `jd`. Retried with exponential backoff on transient
    /// failures.
    pub fn fetch_state(&mut self, designation: &str, jd: f64) -> CoreResult<StateVector> {
        self.rate_limiter.acquire();

        let url = format!("{}/state?designation={}&jd={}", self.base_url, urlencode(designation), jd);

        let mut last_error = String::new();
        for attempt in 0..MAX_RETRIES {
            match ureq::get(&url).call() {
                Ok(response) => {
                    let body: ReferenceStateResponse = response
                        .into_json()
                        .map_err(|e| TrajectoryError::InvalidRequest(format!("malformed reference response: {e}")))?;
                    return Ok(StateVector::new(
                        Vector3::new(body.position_au[0], body.position_au[1], body.position_au[2]),
                        Vector3::new(body.velocity_au_per_day[0], body.velocity_au_per_day[1], body.velocity_au_per_day[2]),
                        jd,
                    ));
                }
                Err(e) => {
                    last_error = e.to_string();
                    log::warn!("reference client attempt {} for {designation} failed: {last_error}", attempt + 1);
                    thread::sleep(BASE_BACKOFF * 2u32.pow(attempt));
                }
            }
        }

        Err(TrajectoryError::InvalidRequest(format!("reference client exhausted retries: {last_error}")))
    }
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c.to_string() } else { format!("%{:02X}", c as u32) })
        .collect()
}

#[derive(serde::Deserialize)]
struct ReferenceStateResponse {
    position_au: [f64; 3],
    velocity_au_per_day: [f64; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencode_passes_through_designation_chars() {
        assert_eq!(urlencode("1P/Halley"), "1P%2FHalley");
        assert_eq!(urlencode("Earth-analog"), "Earth-analog");
    }

    #[test]
    fn test_rate_limiter_does_not_panic_under_burst() {
        let mut limiter = RateLimiter::new(1000);
        for _ in 0..10 {
            limiter.acquire();
        }
    }
}
