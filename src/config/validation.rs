use crate::config::types::{
    BackendsConfig, CircuitBreakerSettings, Config, DiscoveryConfig, SchedulerConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scheduler_config(&config.scheduler)?;
    validate_circuit_breaker(&config.circuit_breaker)?;
    validate_domain_limits(config)?;
    validate_rules(config)?;
    validate_backends(&config.backends)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_discovery(&config.discovery)?;

    if config.fetch.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch.timeout-ms must be > 0".to_string(),
        ));
    }

    for entry in &config.credentials {
        validate_domain_pattern(&entry.domain)?;
    }

    Ok(())
}

fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    validate_max_concurrent("default-max-concurrent", config.default_max_concurrent)?;
    validate_rps("default-rps", config.default_rps)
}

fn validate_circuit_breaker(config: &CircuitBreakerSettings) -> Result<(), ConfigError> {
    if config.fail_threshold < 1 {
        return Err(ConfigError::Validation(
            "fail-threshold must be >= 1".to_string(),
        ));
    }

    for (name, value) in [
        ("open-duration-ms", config.open_duration_ms),
        ("initial-backoff-ms", config.initial_backoff_ms),
        ("max-backoff-ms", config.max_backoff_ms),
        ("max-admission-wait-ms", config.max_admission_wait_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{} must be > 0", name)));
        }
    }

    if config.initial_backoff_ms > config.max_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "initial-backoff-ms ({}) cannot exceed max-backoff-ms ({})",
            config.initial_backoff_ms, config.max_backoff_ms
        )));
    }

    Ok(())
}

fn validate_domain_limits(config: &Config) -> Result<(), ConfigError> {
    for entry in &config.domain_limits {
        validate_domain_pattern(&entry.domain)?;

        if let Some(max) = entry.max_concurrent {
            validate_max_concurrent(&format!("max-concurrent for {}", entry.domain), max)?;
        }
        if let Some(rps) = entry.rps {
            validate_rps(&format!("rps for {}", entry.domain), rps)?;
        }
    }
    Ok(())
}

fn validate_rules(config: &Config) -> Result<(), ConfigError> {
    for rule in &config.rules {
        validate_domain_pattern(&rule.domain)?;

        for name in rule.headers.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Rule for '{}' has an empty header name",
                    rule.domain
                )));
            }
        }
    }
    Ok(())
}

fn validate_backends(config: &BackendsConfig) -> Result<(), ConfigError> {
    if let Some(remote) = &config.remote {
        validate_service_url("backends.remote.url", &remote.url)?;
    }

    if let Some(browser) = &config.browser {
        validate_service_url("backends.browser.url", &browser.url)?;

        if browser.viewport_width == 0 || browser.viewport_height == 0 {
            return Err(ConfigError::Validation(
                "browser viewport dimensions must be > 0".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_service_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, value
        )));
    }

    Ok(())
}

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

    validate_email(&config.contact_email)
}

fn validate_discovery(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    if config.max_urls < 1 {
        return Err(ConfigError::Validation(
            "discovery.max-urls must be >= 1".to_string(),
        ));
    }

    for pattern in config.include.iter().chain(&config.exclude) {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid discovery pattern '{}': {}", pattern, e))
        })?;
    }

    if let Some(prefix) = &config.path_prefix {
        if !prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "discovery.path-prefix must start with '/', got '{}'",
                prefix
            )));
        }
    }

    Ok(())
}

fn validate_max_concurrent(name: &str, value: u32) -> Result<(), ConfigError> {
    if value < 1 {
        return Err(ConfigError::Validation(format!(
            "{} must be >= 1, got {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_rps(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a positive finite number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validates a domain pattern (supports `*.` wildcards)
pub fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    validate_domain_string(pattern.strip_prefix("*.").unwrap_or(pattern))
}

fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must be lowercase and contain only letters, digits, '.' and '-'",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    Ok(())
}
