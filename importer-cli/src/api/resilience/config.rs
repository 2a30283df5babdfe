//! Rate limiting configuration
//!
//! The HTTP backend throttles itself client-side; the remote service gets at
//! most `requests_per_second` calls with bursts up to `burst_capacity`.

/// Token bucket settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_capacity: u32,
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_second(60)
    }
}

impl RateLimitConfig {
    /// Limit to `rate` requests per second with a burst equal to the rate.
    ///
    /// A rate of zero turns limiting off.
    pub fn per_second(rate: u32) -> Self {
        Self {
            requests_per_second: rate,
            burst_capacity: rate,
            enabled: rate > 0,
        }
    }

    /// No throttling at all (tests, local mock runs)
    pub fn disabled() -> Self {
        Self {
            requests_per_second: u32::MAX,
            burst_capacity: u32::MAX,
            enabled: false,
        }
    }
}
