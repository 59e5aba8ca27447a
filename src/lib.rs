//! Forum-Sieve: a credentialed forum crawler and post classifier
//!
//! This crate logs into a discussion forum, walks a fixed set of sections page by
//! page, turns each page into structured post records, classifies and anonymizes
//! them, and folds the results into summary analytics.

pub mod analysis;
pub mod config;
pub mod crawler;
pub mod output;
pub mod post;
pub mod robots;
pub mod state;

use thiserror::Error;

/// Main error type for Forum-Sieve operations
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {reason}")]
    AuthFailure { reason: String },

    #[error("URL disallowed by robots.txt: {url}")]
    PolicyViolation { url: String },

    #[error("Fetch blocked for {url}: {reason}")]
    FetchBlocked { url: String, reason: String },

    #[error("Fetch failed for {url} after {attempts} attempts: {last_error}")]
    FetchFailed {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Page could not be parsed: {reason}")]
    ParseFailed { reason: String },

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForumError {
    /// Returns true if this error must end the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthFailure { .. } | Self::Config(_) | Self::UnknownSection(_)
        )
    }

    /// Returns true if this error ends the current section but not the run
    pub fn abandons_section(&self) -> bool {
        matches!(
            self,
            Self::PolicyViolation { .. } | Self::FetchBlocked { .. } | Self::FetchFailed { .. }
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Result type alias for Forum-Sieve operations
pub type Result<T> = std::result::Result<T, ForumError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use analysis::{Aggregator, Anonymizer, Classifier, Summary};
pub use config::{Config, Credentials};
pub use crawler::{Coordinator, RunReport};
pub use post::{Link, LinkType, OpportunityCategory, Post, Section};
