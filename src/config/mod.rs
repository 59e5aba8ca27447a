//! Configuration module for Forum-Sieve
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and loading login credentials from the environment.
//!
//! # Example
//!
//! ```no_run
//! use forum_sieve::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("forum.toml")).unwrap();
//! println!("Crawling {} sections", config.sections.len());
//! ```

mod credentials;
mod parser;
mod types;
mod validation;

// Re-export types
pub use credentials::{Credentials, PASSWORD_ENV, USERNAME_ENV};
pub use types::{
    ClassifierConfig, Config, CrawlerConfig, EngagementConfig, InsightsConfig, OpportunityTerms,
    OutputConfig, PrivacyConfig, RateLimitConfig, SiteConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

use crate::post::Section;
use crate::ForumError;
use url::Url;

impl Config {
    /// Resolves a configured section by name
    ///
    /// This is the only way to obtain a [`Section`], so every post produced
    /// downstream belongs to a section the configuration knows about.
    pub fn section(&self, name: &str) -> Result<Section, ForumError> {
        if self.sections.contains_key(name) {
            Ok(Section::new(name))
        } else {
            Err(ForumError::UnknownSection(name.to_string()))
        }
    }

    /// All configured sections in name order
    pub fn all_sections(&self) -> Vec<Section> {
        self.sections.keys().map(|name| Section::new(name)).collect()
    }

    /// Resolves a list of names, failing on the first unknown one
    pub fn resolve_sections(&self, names: &[String]) -> Result<Vec<Section>, ForumError> {
        names.iter().map(|name| self.section(name)).collect()
    }

    /// Parsed site base URL
    pub fn base_url(&self) -> Result<Url, ForumError> {
        Ok(Url::parse(&self.site.base_url)?)
    }

    /// URL template for a section
    pub fn section_template(&self, section: &Section) -> Option<&str> {
        self.sections.get(section.name()).map(String::as_str)
    }
}
