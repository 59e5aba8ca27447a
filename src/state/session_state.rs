use std::time::{Duration, Instant};

/// Tracks the authenticated session between requests
///
/// Cookies themselves live in the HTTP client's cookie jar; this structure
/// only records what the session manager needs to decide whether the jar is
/// still worth using.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Whether the last login succeeded
    pub authenticated: bool,

    /// When the current session was established
    pub login_at: Option<Instant>,

    /// User agent sent with the most recent request
    pub user_agent: Option<String>,

    /// Timestamp of the most recent request
    pub last_request_at: Option<Instant>,

    /// Set when a fetch observed a login prompt instead of content
    pub expired: bool,

    /// Successful logins during this run
    pub login_count: u32,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful login
    pub fn mark_logged_in(&mut self, now: Instant) {
        self.authenticated = true;
        self.expired = false;
        self.login_at = Some(now);
        self.login_count += 1;
    }

    /// Records that the server no longer recognizes the session
    pub fn mark_expired(&mut self) {
        self.expired = true;
    }

    /// Records an outbound request
    pub fn record_request(&mut self, user_agent: &str, now: Instant) {
        self.user_agent = Some(user_agent.to_string());
        self.last_request_at = Some(now);
    }

    /// Checks whether the session can still be used
    ///
    /// # Arguments
    ///
    /// * `timeout` - Maximum session age
    /// * `now` - The current time instant
    pub fn is_valid(&self, timeout: Duration, now: Instant) -> bool {
        if !self.authenticated || self.expired {
            return false;
        }

        match self.login_at {
            Some(at) => now.duration_since(at) < timeout,
            None => false,
        }
    }

    /// Forgets the login but keeps request bookkeeping
    pub fn clear(&mut self) {
        self.authenticated = false;
        self.expired = false;
        self.login_at = None;
    }
}
