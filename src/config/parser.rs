use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Environment overrides (`VISION_API_URL`, `HTML_LIMIT`, `IMAGE_LIMIT`,
/// `CLASSIFY_LIMIT`, `DATABASE_PATH`) are applied after parsing and before
/// validation, so a deployment can keep one file and vary these per host.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use pepe_scout::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Seed: {}", config.crawler.seed_url);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate(&config)?;

    Ok(config)
}

/// Overrides config values with environment variables
///
/// `lookup` returns the raw value of a variable, or `None` when unset. Empty
/// values count as unset.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

    if let Some(endpoint) = read("VISION_API_URL") {
        config.classifier.endpoint = endpoint;
    }

    if let Some(path) = read("DATABASE_PATH") {
        config.storage.database_path = path;
    }

    for (name, slot) in [
        ("HTML_LIMIT", &mut config.crawler.html_limit),
        ("IMAGE_LIMIT", &mut config.crawler.image_limit),
        ("CLASSIFY_LIMIT", &mut config.crawler.classify_limit),
    ] {
        if let Some(raw) = read(name) {
            *slot = raw.trim().parse().map_err(|e| ConfigError::Environment {
                name: name.to_string(),
                message: format!("expected a non-negative integer, got '{}': {}", raw, e),
            })?;
        }
    }

    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so two runs can be matched to the config they used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
