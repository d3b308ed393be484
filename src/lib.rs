//! Pepe-Scout: an image board crawler feeding an image classifier
//!
//! This crate walks an image board, stores the pages it visits, downloads the
//! images attached to posts and files each one into a category based on the
//! score returned by an external classification service.
//!
//! The two pipelines (pages and images) run as many concurrent tasks that feed
//! each other. A quiescence barrier decides when the crawl is over, limiters
//! cap outbound requests per resource class, and every task runs under a
//! supervisor that turns unexpected failures into a fatal, diagnosable exit.

pub mod config;
pub mod coordination;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Pepe-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to {method} {url} after {attempts} attempts")]
    RetriesExhausted {
        method: String,
        url: String,
        attempts: u32,
    },

    #[error("Classifier health check failed at {url}")]
    ClassifierUnavailable { url: String },

    #[error("Malformed classifier response for {file}: {source}")]
    ClassifierResponse {
        file: String,
        source: serde_json::Error,
    },

    #[error("Seed URL {url} could not be fetched: {reason}")]
    SeedUnavailable { url: String, reason: String },

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Storage lock poisoned by a panicked task")]
    StoragePoisoned,

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task '{label}' failed: {message}")]
    TaskFailed { label: String, message: String },
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

    #[error("Invalid environment variable {name}: {message}")]
    Environment { name: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Pepe-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use coordination::{Barrier, Limiter, Supervisor};
pub use state::Category;
pub use url::{normalize_href, resolve_href};
