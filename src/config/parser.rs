use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use forum_sieve::config::load_config;
///
/// let config = load_config(Path::new("forum.toml")).unwrap();
/// println!("Max pages per section: {}", config.crawler.max_pages);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded alongside run output so a result set can be traced back to the
/// exact configuration that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL: &str = r#"
[site]
base-url = "https://forum.example.com"

[sections]
general_discussion = "/forum/general-discussion"
married_life = "/forum/married-life?page={page}"
"#;

    #[test]
    fn test_load_minimal_config_fills_defaults() {
        let file = create_temp_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.sections.len(), 2);
        assert_eq!(config.site.login_path, "/login");
        assert_eq!(config.crawler.max_pages, 50);
        assert_eq!(config.rate_limit.interval_ms, 1500);
        assert_eq!(config.user_agents.pool.len(), 4);
        assert!(config.privacy.redact_contact_info);
        assert_eq!(config.output.high_engagement_threshold, 50.0);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
[site]
base-url = "https://forum.example.com"
login-path = "/account/login"

[sections]
pregnancy = "/forum/pregnancy"

[crawler]
max-pages = 5
page-size = 25
max-retries = 4
retry-delay-ms = 100
respect-robots-txt = false

[rate-limit]
interval-ms = 0
jitter-ms = 0

[user-agents]
pool = ["TestAgent/1.0"]

[classifier]
auto-keywords = 0

[classifier.opportunities]
product = ["stroller"]
service = ["doula"]
information = ["guide"]
community = ["meetup"]

[classifier.engagement]
ratio-weight = 50.0
volume-weight = 50.0
volume-saturation = 1000

[privacy]
redact-contact-info = false

[output]
directory = "/tmp/out"
high-engagement-threshold = 40.0
"#;
        let config = parse_config(content).unwrap();
        assert_eq!(config.site.login_path, "/account/login");
        assert_eq!(config.crawler.max_pages, 5);
        assert_eq!(config.crawler.page_size, Some(25));
        assert!(!config.crawler.respect_robots_txt);
        assert_eq!(config.rate_limit.interval_ms, 0);
        assert_eq!(config.user_agents.pool, vec!["TestAgent/1.0".to_string()]);
        assert_eq!(config.classifier.opportunities.service, vec!["doula".to_string()]);
        assert_eq!(config.classifier.engagement.volume_saturation, 1000);
        assert!(!config.privacy.redact_contact_info);
        assert_eq!(config.output.directory, "/tmp/out");
    }

    #[test]
    fn test_load_config_without_sections_fails() {
        let content = r#"
[site]
base-url = "https://forum.example.com"

[sections]
"#;
        let result = parse_config(content);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/forum.toml"));
        assert!(matches!(result.unwrap_err(), ConfigError::Io(_)));
    }

    #[test]
    fn test_load_config_bad_toml() {
        let result = parse_config("[site\nbase-url = ");
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
