//! Retry bookkeeping as a plain state machine
//!
//! [`Backoff`] only counts attempts and computes delays; the caller decides
//! how to wait, so the same value drives async fetches and synchronous tests.

use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_attempts: u32,
    attempts: u32,
    jitter: bool,
}

impl Backoff {
    /// Creates a new backoff schedule
    ///
    /// # Arguments
    ///
    /// * `base` - Delay after the first failed attempt
    /// * `max` - Cap on any single delay
    /// * `max_attempts` - Total attempts allowed, including the first
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max,
            max_attempts: max_attempts.max(1),
            attempts: 0,
            jitter: false,
        }
    }

    /// Schedule for page fetches
    pub fn for_fetch(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_delay_ms),
            Duration::from_millis(config.max_retry_delay_ms),
            config.max_retries,
        )
        .with_jitter()
    }

    /// Schedule for the login handshake
    pub fn for_login(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_delay_ms),
            Duration::from_millis(config.max_retry_delay_ms),
            config.login_attempts,
        )
        .with_jitter()
    }

    /// Scales each delay by a random factor in 0.75..=1.25, still capped at `max`
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Records a failed attempt
    ///
    /// # Returns
    ///
    /// * `Some(delay)` - Wait this long, then try again
    /// * `None` - No attempts left
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            return None;
        }

        let delay = self.delay_for(self.attempts);
        if !self.jitter {
            return Some(delay);
        }

        let factor = rand::thread_rng().gen_range(0.75..=1.25);
        Some(delay.mul_f64(factor).min(self.max))
    }

    /// Un-jittered delay after the `failures`-th failure: base * 2^(failures-1), capped
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}
