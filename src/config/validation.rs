use crate::config::types::{Config, CrawlConfig, ExtractConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Longest accepted delay bound or base timeout (seconds)
const MAX_SECONDS: f64 = 3600.0;

/// Most retries accepted per page
const MAX_RETRIES: u32 = 20;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_extract_config(&config.extract)?;
    Ok(())
}

/// Validates crawl engine tunables
pub fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    for (name, value) in [
        ("min_delay", config.min_delay),
        ("max_delay", config.max_delay),
        ("initial_delay", config.initial_delay),
        ("base_timeout", config.base_timeout),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "{} must be a positive number of seconds, got {}",
                name, value
            )));
        }
        if value > MAX_SECONDS {
            return Err(ConfigError::Validation(format!(
                "{} must be at most {}s, got {}",
                name, MAX_SECONDS, value
            )));
        }
    }

    if config.max_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "max_retries must be at most {}, got {}",
            MAX_RETRIES, config.max_retries
        )));
    }

    if config.min_delay > config.max_delay {
        return Err(ConfigError::Validation(format!(
            "min_delay ({}s) must not exceed max_delay ({}s)",
            config.min_delay, config.max_delay
        )));
    }

    if config.initial_delay < config.min_delay || config.initial_delay > config.max_delay {
        return Err(ConfigError::Validation(format!(
            "initial_delay ({}s) must lie between min_delay ({}s) and max_delay ({}s)",
            config.initial_delay, config.min_delay, config.max_delay
        )));
    }

    if config.checkpoint_every_n_items < 1 {
        return Err(ConfigError::Validation(
            "checkpoint_every_n_items must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    for (name, path) in [
        ("json_path", &config.json_path),
        ("summary_path", &config.summary_path),
        ("database_path", &config.database_path),
    ] {
        if matches!(path, Some(p) if p.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "{} cannot be empty when set",
                name
            )));
        }
    }

    Ok(())
}

/// Validates that every configured selector parses
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    validate_selector("item_selector", &config.item_selector)?;
    validate_selector("key_selector", &config.key_selector)?;

    if config.key_attribute.is_empty() {
        return Err(ConfigError::Validation(
            "key_attribute cannot be empty".to_string(),
        ));
    }

    if let Some(next) = &config.next_page_selector {
        validate_selector("next_page_selector", next)?;
    }

    for (field, selector) in &config.fields {
        validate_selector(field, selector)?;
    }

    Ok(())
}

fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ConfigError::Validation(format!("Invalid email format: '{}'", email)))?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
