//! Client-side throttling for the HTTP backend

pub mod config;
pub mod rate_limiter;

pub use config::RateLimitConfig;
pub use rate_limiter::{RateLimiter, RateLimiterStats};
