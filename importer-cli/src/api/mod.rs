//! HTTP API backend
//!
//! Talks to the customer/account service (or the bundled mock) one record per
//! request, throttled client-side.

pub mod client;
pub mod resilience;

pub use client::ApiClient;
pub use resilience::{RateLimitConfig, RateLimiter, RateLimiterStats};
