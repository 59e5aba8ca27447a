use crate::config::types::{
    ClassifierConfig, Config, CrawlerConfig, InsightsConfig, OutputConfig, SiteConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use std::collections::{BTreeMap, HashMap};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let base = validate_site_config(&config.site)?;
    validate_sections(&config.sections, &base)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agents)?;
    validate_classifier_config(&config.classifier)?;
    validate_insights_config(&config.insights)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the site block and returns the parsed base URL
fn validate_site_config(config: &SiteConfig) -> Result<Url, ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if !config.login_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "login-path must start with '/', got '{}'",
            config.login_path
        )));
    }

    if config.login_success_indicators.is_empty() {
        return Err(ConfigError::Validation(
            "login-success-indicators cannot be empty".to_string(),
        ));
    }

    Ok(base)
}

/// Validates section names and their URL templates
fn validate_sections(sections: &BTreeMap<String, String>, base: &Url) -> Result<(), ConfigError> {
    if sections.is_empty() {
        return Err(ConfigError::Validation(
            "at least one section must be configured".to_string(),
        ));
    }

    for (name, template) in sections {
        validate_section_name(name)?;

        let first_page = template.replace("{page}", "1");
        base.join(&first_page).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid URL template for section '{}': {}", name, e))
        })?;
    }

    Ok(())
}

/// Section names: lowercase alphanumerics, underscores and hyphens
fn validate_section_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "section name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "section name must contain only lowercase letters, digits, '_' or '-', got '{}'",
            name
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.login_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "login-attempts must be >= 1, got {}",
            config.login_attempts
        )));
    }

    if config.max_retry_delay_ms < config.retry_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max-retry-delay-ms ({}) must be >= retry-delay-ms ({})",
            config.max_retry_delay_ms, config.retry_delay_ms
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.page_size == Some(0) {
        return Err(ConfigError::Validation(
            "page-size must be >= 1 when set".to_string(),
        ));
    }

    if config.policy_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "policy-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the user agent pool
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.pool.is_empty() {
        return Err(ConfigError::Validation(
            "user-agents pool cannot be empty".to_string(),
        ));
    }

    if config.pool.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agents pool cannot contain blank entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates classifier term lists and the engagement policy
fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    let sets = [
        ("product", &config.opportunities.product),
        ("service", &config.opportunities.service),
        ("information", &config.opportunities.information),
        ("community", &config.opportunities.community),
    ];

    // Opportunity sets must be pairwise disjoint
    let mut owners: HashMap<String, &str> = HashMap::new();
    for (category, terms) in sets {
        for term in terms.iter() {
            let key = term.trim().to_lowercase();
            if key.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "blank term in '{}' opportunity set",
                    category
                )));
            }
            if let Some(other) = owners.insert(key.clone(), category) {
                if other != category {
                    return Err(ConfigError::Validation(format!(
                        "term '{}' appears in both '{}' and '{}' opportunity sets",
                        key, other, category
                    )));
                }
            }
        }
    }

    let engagement = &config.engagement;
    for (name, weight) in [
        ("ratio-weight", engagement.ratio_weight),
        ("volume-weight", engagement.volume_weight),
    ] {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigError::Validation(format!(
                "{} must be a non-negative number, got {}",
                name, weight
            )));
        }
    }

    if engagement.volume_saturation < 1 {
        return Err(ConfigError::Validation(
            "volume-saturation must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Every service kind and season needs at least one non-blank term
fn validate_insights_config(config: &InsightsConfig) -> Result<(), ConfigError> {
    let tables = [
        ("service-kinds", &config.service_kinds),
        ("seasonal-topics", &config.seasonal_topics),
    ];

    for (table, rows) in tables {
        for (name, terms) in rows {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{} has an entry with an empty name",
                    table
                )));
            }
            if terms.iter().all(|t| t.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "{} entry '{}' has no terms",
                    table, name
                )));
            }
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if !(0.0..=100.0).contains(&config.high_engagement_threshold) {
        return Err(ConfigError::Validation(format!(
            "high-engagement-threshold must be within 0..=100, got {}",
            config.high_engagement_threshold
        )));
    }

    Ok(())
}
