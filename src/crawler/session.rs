//! Authenticated forum session
//!
//! The [`SessionManager`] owns the HTTP client (and with it the cookie jar),
//! performs the form login, and decides when the session must be renewed.

use crate::config::{Config, Credentials, CrawlerConfig, SiteConfig};
use crate::crawler::backoff::Backoff;
use crate::crawler::fetcher::{build_http_client, is_retryable_status, is_transient_error};
use crate::crawler::rate_limiter::RateLimiter;
use crate::state::SessionState;
use crate::ForumError;
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Input names that identify the username field of a login form
const USERNAME_FIELDS: &[&str] = &["username", "email", "login", "user"];

/// Why a single login attempt did not succeed
#[derive(Debug)]
enum LoginError {
    /// Network trouble or a 5xx/429; worth another attempt
    Transient(String),
    /// The site answered and said no
    Rejected(String),
}

/// A login form discovered on the login page
#[derive(Debug, Clone, PartialEq)]
struct LoginForm {
    action: Url,
    use_get: bool,
    username_field: String,
    password_field: String,
    hidden: Vec<(String, String)>,
}

/// Owns one authenticated session for the duration of a run
pub struct SessionManager {
    client: Client,
    base_url: Url,
    site: SiteConfig,
    crawler: CrawlerConfig,
    user_agents: Vec<String>,
    limiter: Arc<RateLimiter>,
    state: SessionState,
    credentials: Option<Credentials>,
}

impl SessionManager {
    /// Creates a session manager that is not yet logged in
    ///
    /// # Arguments
    ///
    /// * `config` - Run configuration (site, crawler and user agent settings)
    /// * `limiter` - Rate limiter shared with the page fetcher
    pub fn new(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self, ForumError> {
        let client = build_http_client(&config.crawler)?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
            site: config.site.clone(),
            crawler: config.crawler.clone(),
            user_agents: config.user_agents.pool.clone(),
            limiter,
            state: SessionState::new(),
            credentials: None,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Picks a user agent at random from the configured pool
    pub fn random_user_agent(&self) -> String {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| self.crawler.policy_agent.clone())
    }

    /// Records an outbound request made with `user_agent`
    pub fn record_request(&mut self, user_agent: &str) {
        self.state.record_request(user_agent, Instant::now());
    }

    /// Logs in with the given credentials
    ///
    /// Transient failures are retried up to `login-attempts` times. A rejected
    /// login, a lockout page or a missing login form fail immediately.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The session is authenticated
    /// * `Err(ForumError::AuthFailure)` - Login is not possible
    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), ForumError> {
        if credentials.is_incomplete() {
            return Err(ForumError::AuthFailure {
                reason: "username and password are required".to_string(),
            });
        }

        let mut backoff = Backoff::for_login(&self.crawler);

        loop {
            match self.attempt_login(credentials).await {
                Ok(()) => {
                    self.state.mark_logged_in(Instant::now());
                    self.credentials = Some(credentials.clone());
                    tracing::info!("Logged in as {}", credentials.username);
                    return Ok(());
                }
                Err(LoginError::Rejected(reason)) => {
                    self.state.clear();
                    tracing::error!("Login rejected: {}", reason);
                    return Err(ForumError::AuthFailure { reason });
                }
                Err(LoginError::Transient(reason)) => match backoff.next_delay() {
                    Some(delay) => {
                        tracing::warn!(
                            "Login attempt {} failed ({}), retrying in {:?}",
                            backoff.attempts(),
                            reason,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        self.state.clear();
                        return Err(ForumError::AuthFailure {
                            reason: format!(
                                "login failed after {} attempts: {}",
                                backoff.attempts(),
                                reason
                            ),
                        });
                    }
                },
            }
        }
    }

    /// Returns true if the session can be used for page requests
    pub fn is_valid(&self) -> bool {
        self.state.is_valid(
            Duration::from_secs(self.crawler.session_timeout_secs),
            Instant::now(),
        )
    }

    /// Marks the session as no longer recognized by the server
    pub fn mark_expired(&mut self) {
        self.state.mark_expired();
    }

    /// Logs in again with the credentials of the last successful login
    pub async fn reauthenticate(&mut self) -> Result<(), ForumError> {
        let credentials = self.credentials.clone().ok_or_else(|| ForumError::AuthFailure {
            reason: "no stored credentials to re-authenticate with".to_string(),
        })?;

        tracing::info!("Re-authenticating session");
        self.login(&credentials).await
    }

    /// Best-effort logout; the local session state is cleared regardless
    pub async fn logout(&mut self) {
        if !self.state.authenticated {
            return;
        }

        if let Ok(url) = self.base_url.join(&self.site.logout_path) {
            self.limiter.acquire().await;
            let agent = self.random_user_agent();
            self.record_request(&agent);
            match self.client.get(url).header(USER_AGENT, agent).send().await {
                Ok(response) => tracing::debug!("Logout returned {}", response.status()),
                Err(e) => tracing::debug!("Logout request failed: {}", e),
            }
        }

        self.state.clear();
        self.credentials = None;
        tracing::info!("Logged out");
    }

    /// Returns true if `url` points at the login page
    pub fn is_login_url(&self, url: &Url) -> bool {
        url.path().trim_end_matches('/') == self.site.login_path.trim_end_matches('/')
    }

    async fn attempt_login(&mut self, credentials: &Credentials) -> Result<(), LoginError> {
        let login_url = self
            .base_url
            .join(&self.site.login_path)
            .map_err(|e| LoginError::Rejected(format!("invalid login path: {}", e)))?;

        let (page_url, page) = self.get_text(login_url).await?;
        let form = find_login_form(&page, &page_url)
            .ok_or_else(|| LoginError::Rejected("no login form found".to_string()))?;

        let mut fields = form.hidden.clone();
        fields.push((form.username_field.clone(), credentials.username.clone()));
        fields.push((form.password_field.clone(), credentials.password.clone()));

        self.limiter.acquire().await;
        let agent = self.random_user_agent();
        self.record_request(&agent);

        let request = if form.use_get {
            self.client.get(form.action.clone()).query(&fields)
        } else {
            self.client.post(form.action.clone()).form(&fields)
        };

        let response = request
            .header(USER_AGENT, agent)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if is_retryable_status(status) {
            return Err(LoginError::Transient(format!("login returned HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(LoginError::Rejected(format!("login returned HTTP {}", status)));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| LoginError::Transient(e.to_string()))?
            .to_lowercase();

        if let Some(signature) = find_signature(&body, &self.site.lockout_signatures) {
            return Err(LoginError::Rejected(format!("account locked ({})", signature)));
        }

        if find_signature(&body, &self.site.login_success_indicators).is_some() {
            return Ok(());
        }
        if find_login_form(&body, &final_url).is_some() {
            return Err(LoginError::Rejected(
                "credentials rejected (login form shown again)".to_string(),
            ));
        }

        if self.left_login_page(&final_url, &page_url, &form.action) {
            Ok(())
        } else {
            Err(LoginError::Rejected("credentials rejected".to_string()))
        }
    }

    /// True when the login response landed somewhere other than the login
    /// page or the form's action endpoint
    fn left_login_page(&self, final_url: &Url, page_url: &Url, action: &Url) -> bool {
        let location = final_url[url::Position::BeforePath..].to_lowercase();
        !self.is_login_url(final_url)
            && !same_page(final_url, page_url)
            && !same_page(final_url, action)
            && !location.contains("login")
    }

    async fn get_text(&mut self, url: Url) -> Result<(Url, String), LoginError> {
        self.limiter.acquire().await;
        let agent = self.random_user_agent();
        self.record_request(&agent);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, agent)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if is_retryable_status(status) {
            return Err(LoginError::Transient(format!("login page returned HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(LoginError::Rejected(format!("login page returned HTTP {}", status)));
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| LoginError::Transient(e.to_string()))?;
        Ok((final_url, body))
    }
}

/// Same origin, path and query; fragments are ignored
fn same_page(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
        && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
        && a.query() == b.query()
}

fn classify_request_error(error: reqwest::Error) -> LoginError {
    if is_transient_error(&error) {
        LoginError::Transient(error.to_string())
    } else {
        LoginError::Rejected(error.to_string())
    }
}

/// Returns the first signature contained in an already lowercased body
pub(crate) fn find_signature<'a>(lowercase_body: &str, signatures: &'a [String]) -> Option<&'a str> {
    signatures
        .iter()
        .map(String::as_str)
        .find(|sig| !sig.is_empty() && lowercase_body.contains(&sig.to_lowercase()))
}

/// Locates the login form: `#login-form`, `.login-form`, or any form with a username input
fn find_login_form(html: &str, page_url: &Url) -> Option<LoginForm> {
    let document = Html::parse_document(html);
    let explicit = Selector::parse("form#login-form, form.login-form").ok()?;
    let any_form = Selector::parse("form").ok()?;
    let inputs = Selector::parse("input[name]").ok()?;

    let form = document.select(&explicit).next().or_else(|| {
        document.select(&any_form).find(|form| {
            form.select(&inputs).any(|input| {
                input
                    .value()
                    .attr("name")
                    .map(|name| USERNAME_FIELDS[..2].contains(&name.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
        })
    })?;

    Some(describe_form(form, &inputs, page_url))
}

fn describe_form(form: ElementRef<'_>, inputs: &Selector, page_url: &Url) -> LoginForm {
    let action = form
        .value()
        .attr("action")
        .filter(|a| !a.trim().is_empty())
        .and_then(|a| page_url.join(a.trim()).ok())
        .unwrap_or_else(|| page_url.clone());

    let use_get = form
        .value()
        .attr("method")
        .map(|m| m.eq_ignore_ascii_case("get"))
        .unwrap_or(false);

    let mut username_field = None;
    let mut password_field = None;
    let mut hidden = Vec::new();

    for input in form.select(inputs) {
        let Some(name) = input.value().attr("name") else {
            continue;
        };
        let kind = input.value().attr("type").unwrap_or("text").to_lowercase();

        match kind.as_str() {
            "hidden" => {
                let value = input.value().attr("value").unwrap_or("");
                hidden.push((name.to_string(), value.to_string()));
            }
            "password" => {
                password_field.get_or_insert_with(|| name.to_string());
            }
            _ if USERNAME_FIELDS.contains(&name.to_lowercase().as_str()) => {
                username_field.get_or_insert_with(|| name.to_string());
            }
            _ => {}
        }
    }

    LoginForm {
        action,
        use_get,
        username_field: username_field.unwrap_or_else(|| "username".to_string()),
        password_field: password_field.unwrap_or_else(|| "password".to_string()),
        hidden,
    }
}
