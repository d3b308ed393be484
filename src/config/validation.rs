use crate::config::types::{
    ClassifierConfig, Config, CrawlerConfig, RequestConfig, StorageConfig,
};
use crate::url::{contains_all, contains_any, normalize_href};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_classifier_config(&config.classifier)?;
    validate_request_config(&config.request)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.allowed_host_substrings.is_empty() {
        return Err(ConfigError::Validation(
            "allowed_host_substrings must name at least one host fragment".to_string(),
        ));
    }

    if config.allowed_host_substrings.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::Validation(
            "allowed_host_substrings cannot contain empty entries".to_string(),
        ));
    }

    validate_image_extensions(&config.allowed_image_extensions)?;

    if config.channel_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "channel_capacity must be >= 1, got {}",
            config.channel_capacity
        )));
    }

    for (name, selector) in [
        ("link_selector", &config.link_selector),
        ("image_selector", &config.image_selector),
    ] {
        Selector::parse(selector).map_err(|e| {
            ConfigError::Validation(format!("Invalid {} '{}': {:?}", name, selector, e))
        })?;
    }

    validate_seed_url(config)
}

/// The seed must itself survive the page filters, otherwise the crawl has no start
fn validate_seed_url(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let seed = normalize_href(&config.seed_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed_url '{}': {}", config.seed_url, e)))?;

    let host = seed.host_str().unwrap_or_default();
    if !contains_any(host, &config.allowed_host_substrings) {
        return Err(ConfigError::Validation(format!(
            "seed_url host '{}' matches none of allowed_host_substrings",
            host
        )));
    }

    if !contains_all(seed.as_str(), &config.required_url_substrings) {
        return Err(ConfigError::Validation(format!(
            "seed_url '{}' is missing one of required_url_substrings",
            seed
        )));
    }

    Ok(())
}

/// Validates image extensions: non-empty list of ".ext" entries
fn validate_image_extensions(extensions: &[String]) -> Result<(), ConfigError> {
    if extensions.is_empty() {
        return Err(ConfigError::Validation(
            "allowed_image_extensions cannot be empty".to_string(),
        ));
    }

    for ext in extensions {
        if ext.len() < 2 || !ext.starts_with('.') || ext[1..].contains('.') {
            return Err(ConfigError::Validation(format!(
                "Image extension '{}' must look like '.png'",
                ext
            )));
        }
    }

    Ok(())
}

fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid classifier endpoint: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Classifier endpoint must be http(s), got '{}'",
            config.endpoint
        )));
    }

    Ok(())
}

fn validate_request_config(config: &RequestConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawler_config() -> CrawlerConfig {
        CrawlerConfig {
            seed_url: "https://boards.4channel.org/g/".to_string(),
            allowed_host_substrings: vec!["4channel.org".to_string()],
            required_url_substrings: vec!["https".to_string(), "boards.".to_string()],
            allowed_image_extensions: vec![".jpg".to_string(), ".png".to_string()],
            html_limit: 0,
            image_limit: 0,
            classify_limit: 0,
            channel_capacity: 16,
            link_selector: "a".to_string(),
            image_selector: "div .file div .fileText a".to_string(),
        }
    }

    #[test]
    fn test_valid_crawler_config() {
        assert!(validate_crawler_config(&crawler_config()).is_ok());
    }

    #[test]
    fn test_seed_must_pass_host_filter() {
        let mut config = crawler_config();
        config.seed_url = "https://example.com/g/".to_string();
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_seed_must_pass_required_filter() {
        let mut config = crawler_config();
        config.seed_url = "http://boards.4channel.org/g/".to_string();
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_zero_channel_capacity_rejected() {
        let mut config = crawler_config();
        config.channel_capacity = 0;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_bad_selector_rejected() {
        let mut config = crawler_config();
        config.image_selector = "div >>> [".to_string();
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_validate_image_extensions() {
        assert!(validate_image_extensions(&[".jpg".to_string()]).is_ok());

        assert!(validate_image_extensions(&[]).is_err());
        assert!(validate_image_extensions(&["jpg".to_string()]).is_err());
        assert!(validate_image_extensions(&[".".to_string()]).is_err());
        assert!(validate_image_extensions(&[".tar.gz".to_string()]).is_err());
    }

    #[test]
    fn test_validate_classifier_endpoint() {
        let ok = ClassifierConfig {
            endpoint: "http://localhost:5000".to_string(),
        };
        let bad = ClassifierConfig {
            endpoint: "localhost".to_string(),
        };
        assert!(validate_classifier_config(&ok).is_ok());
        assert!(validate_classifier_config(&bad).is_err());
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        let config = RequestConfig {
            max_attempts: 0,
            ..RequestConfig::default()
        };
        assert!(validate_request_config(&config).is_err());
    }
}
