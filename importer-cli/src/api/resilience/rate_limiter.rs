//! Token bucket rate limiter
//!
//! Callers `acquire()` before every outbound request. The bucket starts full,
//! refills continuously at the configured rate and never holds more than the
//! burst capacity.

use super::config::RateLimitConfig;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, rate: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Client-side token bucket
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
    requests_acquired: AtomicU64,
    requests_waited: AtomicU64,
}

impl RateLimiter {
    /// A zero rate is treated as unlimited
    pub fn new(mut config: RateLimitConfig) -> Self {
        if config.requests_per_second == 0 {
            config.enabled = false;
        }
        let capacity = config.burst_capacity.max(1) as f64;
        Self {
            config,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            requests_acquired: AtomicU64::new(0),
            requests_waited: AtomicU64::new(0),
        }
    }

    /// Wait until the bucket admits one request
    pub async fn acquire(&self) {
        if !self.config.enabled {
            self.requests_acquired.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let rate = self.config.requests_per_second as f64;
        let capacity = self.config.burst_capacity.max(1) as f64;
        let mut waited = false;

        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(rate, capacity);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64((1.0 - bucket.tokens) / rate))
                }
            };

            match wait {
                None => break,
                Some(delay) => {
                    if !waited {
                        waited = true;
                        self.requests_waited.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!("Rate limiter: waiting {:?} for a token", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.requests_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            requests_per_second: self.config.requests_per_second,
            burst_capacity: self.config.burst_capacity,
            requests_acquired: self.requests_acquired.load(Ordering::Relaxed),
            requests_waited: self.requests_waited.load(Ordering::Relaxed),
            enabled: self.config.enabled,
        }
    }
}

/// Statistics for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    pub requests_per_second: u32,
    pub burst_capacity: u32,
    /// Total tokens handed out
    pub requests_acquired: u64,
    /// Number of acquisitions that had to sleep
    pub requests_waited: u64,
    pub enabled: bool,
}

impl RateLimiterStats {
    pub fn wait_rate(&self) -> f64 {
        if self.requests_acquired == 0 {
            0.0
        } else {
            self.requests_waited as f64 / self.requests_acquired as f64
        }
    }
}
