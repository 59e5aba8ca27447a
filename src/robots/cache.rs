//! Time-bounded cache entry for the site's robots.txt

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

/// How long a fetched policy is trusted before it is fetched again
pub const ROBOTS_TTL_HOURS: i64 = 24;

/// A robots.txt policy together with when it was fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub policy: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(policy: ParsedRobots) -> Self {
        Self {
            policy,
            fetched_at: Utc::now(),
        }
    }

    /// Returns true once the entry is older than [`ROBOTS_TTL_HOURS`]
    pub fn is_stale(&self) -> bool {
        self.age() > Duration::hours(ROBOTS_TTL_HOURS)
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        self.policy.is_allowed(url, agent)
    }
}
