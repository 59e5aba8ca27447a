//! Request pacing for one crawl worker
//!
//! Every outbound request (login, robots.txt, pages) goes through
//! [`RateLimiter::acquire`]. Holders of a shared instance are serialized, so
//! two requests never start closer together than the configured interval.

use crate::config::RateLimitConfig;
use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct LimiterState {
    /// When the previous `acquire` returned
    last: Option<Instant>,

    /// Current minimum spacing; may be raised by a robots.txt crawl delay
    interval: Duration,
}

/// Enforces a minimum spacing, plus random jitter, between requests
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    jitter: Duration,
}

impl RateLimiter {
    /// Creates a new rate limiter
    ///
    /// # Arguments
    ///
    /// * `interval` - Minimum time between two `acquire` returns
    /// * `jitter` - Upper bound of a random extra delay added to each spacing
    pub fn new(interval: Duration, jitter: Duration) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                last: None,
                interval,
            }),
            jitter,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Duration::from_millis(config.interval_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }

    /// A limiter that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Waits until the caller may issue its next request
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        if state.interval.is_zero() && self.jitter.is_zero() {
            state.last = Some(Instant::now());
            return;
        }

        if let Some(last) = state.last {
            let required = state.interval + self.random_jitter();
            let elapsed = last.elapsed();
            if elapsed < required {
                let wait = required - elapsed;
                tracing::trace!("Rate limiter sleeping {:?}", wait);
                // The lock is held across the sleep so waiters queue up behind it
                tokio::time::sleep(wait).await;
            }
        }

        state.last = Some(Instant::now());
    }

    /// Raises the minimum spacing to at least `floor`
    ///
    /// Used to honor a robots.txt `Crawl-delay` longer than the configured
    /// interval. Never lowers the current interval.
    pub async fn raise_interval(&self, floor: Duration) {
        let mut state = self.state.lock().await;
        if floor > state.interval {
            tracing::info!(
                "Raising request interval from {:?} to {:?}",
                state.interval,
                floor
            );
            state.interval = floor;
        }
    }

    fn random_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let millis = self.jitter.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }
}
