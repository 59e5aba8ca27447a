//! Robots.txt handling module
//!
//! This module fetches, parses, and caches the forum's robots.txt. A site
//! without a reachable policy is treated as allowing everything.

mod cache;
mod parser;

pub use cache::{CachedRobots, ROBOTS_TTL_HOURS};
pub use parser::ParsedRobots;

use reqwest::Client;
use url::Url;

/// Fetches robots.txt for the site at `base_url`
///
/// # Arguments
///
/// * `client` - The HTTP client (shares the session's cookie jar)
/// * `base_url` - Any URL on the site; only scheme, host and port are used
/// * `user_agent` - User agent header for the request
///
/// # Returns
///
/// The parsed policy. Missing, unreachable or non-text policies yield
/// [`ParsedRobots::allow_all`].
pub async fn fetch_robots(client: &Client, base_url: &Url, user_agent: &str) -> ParsedRobots {
    let robots_url = match base_url.join("/robots.txt") {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot build robots.txt URL from {}: {}", base_url, e);
            return ParsedRobots::allow_all();
        }
    };

    let response = match client
        .get(robots_url.clone())
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("robots.txt unreachable at {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "robots.txt returned {} at {}, allowing all",
            response.status(),
            robots_url
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!("Fetched robots.txt ({} bytes)", body.len());
            ParsedRobots::from_content(&body)
        }
        Err(e) => {
            tracing::debug!("Failed to read robots.txt body: {}", e);
            ParsedRobots::allow_all()
        }
    }
}
