use crate::config::types::{
    ClientConfig, Config, ExtractionConfig, PacingConfig, PortalConfig, StorageConfig,
};
use crate::datasets::DatasetKey;
use crate::{ConfigError, ConfigResult};
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_portal_config(&config.portal)?;
    validate_client_config(&config.client)?;
    validate_pacing_config(&config.pacing)?;
    validate_extraction_config(&config.extraction)?;
    validate_storage_config(&config.storage)?;
    validate_dataset_flags(config)?;
    Ok(())
}

/// Every key of `[datasets]` must name a dataset
fn validate_dataset_flags(config: &Config) -> ConfigResult<()> {
    match config.datasets.keys().find(|key| DatasetKey::parse(key).is_none()) {
        Some(key) => Err(ConfigError::Validation(format!(
            "Unknown dataset '{}' in [datasets]",
            key
        ))),
        None => Ok(()),
    }
}

/// Validates the portal location and page paths
fn validate_portal_config(config: &PortalConfig) -> ConfigResult<()> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    for (name, value) in [
        ("login-page", &config.login_page),
        ("login-submit", &config.login_submit),
        ("token-field", &config.token_field),
        ("post-login-path", &config.post_login_path),
        ("referer-page", &config.referer_page),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    for (key, path) in &config.paths {
        if DatasetKey::parse(key).is_none() {
            return Err(ConfigError::Validation(format!(
                "Unknown dataset '{}' in [portal.paths]",
                key
            )));
        }
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Path override for '{}' cannot be empty",
                key
            )));
        }
    }

    Ok(())
}

/// Validates timeouts and slow-response thresholds
fn validate_client_config(config: &ClientConfig) -> ConfigResult<()> {
    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be greater than 0".to_string(),
        ));
    }

    if config.fast_response_ms >= config.slow_response_ms {
        return Err(ConfigError::Validation(format!(
            "fast-response-ms ({}) must be below slow-response-ms ({})",
            config.fast_response_ms, config.slow_response_ms
        )));
    }

    if config.slow_streak < 1 {
        return Err(ConfigError::Validation(
            "slow-streak must be >= 1".to_string(),
        ));
    }

    if config.cooldown_min_ms > config.cooldown_max_ms {
        return Err(ConfigError::Validation(format!(
            "cooldown-min-ms ({}) cannot exceed cooldown-max-ms ({})",
            config.cooldown_min_ms, config.cooldown_max_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates inter-request delays and login retry policy
fn validate_pacing_config(config: &PacingConfig) -> ConfigResult<()> {
    if config.item_delay_min_ms > config.item_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "item-delay-min-ms ({}) cannot exceed item-delay-max-ms ({})",
            config.item_delay_min_ms, config.item_delay_max_ms
        )));
    }

    if config.login_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "login-retries must be at most 10, got {}",
            config.login_retries
        )));
    }

    Ok(())
}

/// Validates extraction heuristics; every navigation pattern must compile
fn validate_extraction_config(config: &ExtractionConfig) -> ConfigResult<()> {
    for pattern in &config.nav_patterns {
        Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    }

    if config.snapshot_limit == 0 {
        return Err(ConfigError::Validation(
            "snapshot-limit must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates persistence settings
fn validate_storage_config(config: &StorageConfig) -> ConfigResult<()> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.log_history == 0 {
        return Err(ConfigError::Validation(
            "log-history must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.portal.base_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        config.portal.base_url = "ftp://portal.example.edu/".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_unknown_path_override() {
        let mut config = Config::default();
        config
            .portal
            .paths
            .insert("nonsense".to_string(), "X.do".to_string());
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_alias_path_override_accepted() {
        let mut config = Config::default();
        config
            .portal
            .paths
            .insert("viewGrades".to_string(), "J_VG2.do".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_dataset_flag() {
        let mut config = Config::default();
        config.datasets.insert("grades".to_string(), true);
        assert!(validate(&config).is_ok());
        config.datasets.insert("gradez".to_string(), false);
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let mut config = Config::default();
        config.client.fast_response_ms = 6_000;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_cooldown_range() {
        let mut config = Config::default();
        config.client.cooldown_min_ms = 70_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.client.timeout_ms = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_nav_pattern() {
        let mut config = Config::default();
        config.extraction.nav_patterns.push("(unclosed".to_string());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_zero_streak() {
        let mut config = Config::default();
        config.client.slow_streak = 0;
        assert!(validate(&config).is_err());
    }
}
