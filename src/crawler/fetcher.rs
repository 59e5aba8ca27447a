//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building the HTTP client (cookie jar, compression, browser-like headers)
//! - robots.txt checks with a 24 hour policy cache
//! - User agent rotation per attempt
//! - Retry with exponential backoff for transient failures
//! - Detecting login prompts and block pages served with HTTP 200

use crate::config::{Config, CrawlerConfig};
use crate::crawler::backoff::Backoff;
use crate::crawler::session::{find_signature, SessionManager};
use crate::robots::{fetch_robots, CachedRobots};
use crate::ForumError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with a cookie store and browser-like defaults
///
/// The user agent is not fixed here; every request sets its own from the
/// rotation pool.
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Status codes worth retrying: rate limiting and server errors
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Network-level failures worth retrying
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout()
        || error.is_connect()
        || error.is_request()
        || error.is_body()
        || error.is_decode()
}

/// Outcome of one HTTP attempt
enum Attempt {
    Page { final_url: Url, body: String },
    Transient(String),
}

/// Issues page requests through an authenticated session
///
/// | Condition | Action |
/// |-----------|--------|
/// | robots.txt disallows | `PolicyViolation`, no request |
/// | 2xx with login prompt | re-login once, then `FetchBlocked` |
/// | 2xx with block page | `FetchBlocked` |
/// | 2xx | body |
/// | timeout, connect, 429, 5xx | retry with backoff, then `FetchFailed` |
/// | any other status | `FetchBlocked`, no retry |
pub struct PageFetcher {
    session: SessionManager,
    crawler: CrawlerConfig,
    login_prompts: Vec<String>,
    block_signatures: Vec<String>,
    robots: Option<CachedRobots>,
}

impl PageFetcher {
    pub fn new(session: SessionManager, config: &Config) -> Self {
        Self {
            session,
            crawler: config.crawler.clone(),
            login_prompts: config.site.login_prompt_signatures.clone(),
            block_signatures: config.site.block_signatures.clone(),
            robots: None,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager {
        &mut self.session
    }

    /// Fetches one page and returns its body
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute page URL
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The page body
    /// * `Err(ForumError)` - `PolicyViolation`, `FetchBlocked`, `FetchFailed`
    ///   or `AuthFailure` if re-login failed
    pub async fn fetch(&mut self, url: &Url) -> Result<String, ForumError> {
        self.check_policy(url).await?;

        let mut relogged = false;
        loop {
            let (final_url, body) = self.fetch_with_retry(url).await?;
            let lowered = body.to_lowercase();

            let login_prompt = self.session.is_login_url(&final_url)
                || find_signature(&lowered, &self.login_prompts).is_some();

            if login_prompt {
                self.session.mark_expired();
                if relogged {
                    return Err(ForumError::FetchBlocked {
                        url: url.to_string(),
                        reason: "session still expired after re-login".to_string(),
                    });
                }
                tracing::warn!("Session expired while fetching {}", url);
                self.session.reauthenticate().await?;
                relogged = true;
                continue;
            }

            if let Some(signature) = find_signature(&lowered, &self.block_signatures) {
                return Err(ForumError::FetchBlocked {
                    url: url.to_string(),
                    reason: format!("block page detected ({})", signature),
                });
            }

            return Ok(body);
        }
    }

    /// Fails with `PolicyViolation` if robots.txt disallows `url`
    async fn check_policy(&mut self, url: &Url) -> Result<(), ForumError> {
        if !self.crawler.respect_robots_txt {
            return Ok(());
        }

        let needs_fetch = self.robots.as_ref().map_or(true, CachedRobots::is_stale);
        if needs_fetch {
            self.session.limiter().acquire().await;
            let agent = self.session.random_user_agent();
            self.session.record_request(&agent);

            let policy = fetch_robots(self.session.client(), url, &agent).await;
            if let Some(delay) = policy.crawl_delay(&self.crawler.policy_agent) {
                if delay.is_finite() && delay > 0.0 {
                    self.session
                        .limiter()
                        .raise_interval(Duration::from_secs_f64(delay))
                        .await;
                }
            }
            self.robots = Some(CachedRobots::new(policy));
        }

        let allowed = self
            .robots
            .as_ref()
            .map_or(true, |cached| cached.is_allowed(url.as_str(), &self.crawler.policy_agent));

        if allowed {
            Ok(())
        } else {
            tracing::info!("URL {} disallowed by robots.txt", url);
            Err(ForumError::PolicyViolation {
                url: url.to_string(),
            })
        }
    }

    /// Issues the GET, retrying transient failures with backoff
    async fn fetch_with_retry(&mut self, url: &Url) -> Result<(Url, String), ForumError> {
        let mut backoff = Backoff::for_fetch(&self.crawler);

        loop {
            match self.attempt(url).await? {
                Attempt::Page { final_url, body } => return Ok((final_url, body)),
                Attempt::Transient(error) => match backoff.next_delay() {
                    Some(delay) => {
                        tracing::warn!(
                            "Attempt {} for {} failed ({}), retrying in {:?}",
                            backoff.attempts(),
                            url,
                            error,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(ForumError::FetchFailed {
                            url: url.to_string(),
                            attempts: backoff.attempts(),
                            last_error: error,
                        });
                    }
                },
            }
        }
    }

    async fn attempt(&mut self, url: &Url) -> Result<Attempt, ForumError> {
        self.session.limiter().acquire().await;
        let agent = self.session.random_user_agent();
        self.session.record_request(&agent);

        tracing::debug!("GET {}", url);
        let response = match self
            .session
            .client()
            .get(url.clone())
            .header(USER_AGENT, agent)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_transient_error(&e) => return Ok(Attempt::Transient(e.to_string())),
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if is_retryable_status(status) {
            return Ok(Attempt::Transient(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(ForumError::FetchBlocked {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let final_url = response.url().clone();
        match response.text().await {
            Ok(body) => Ok(Attempt::Page { final_url, body }),
            Err(e) => Ok(Attempt::Transient(e.to_string())),
        }
    }
}
