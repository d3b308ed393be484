//! Configuration module for Pepe-Scout
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! plus the environment overrides a container deployment relies on.
//!
//! # Example
//!
//! ```no_run
//! use pepe_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Classifier: {}", config.classifier.endpoint);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ClassifierConfig, Config, CrawlerConfig, RequestConfig, StorageConfig};

// Re-export parser functions
pub use parser::{apply_env_overrides, compute_config_hash, load_config, load_config_with_hash};
