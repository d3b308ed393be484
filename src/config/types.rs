use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Pepe-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub request: RequestConfig,
    pub storage: StorageConfig,
}

/// Crawl frontier and pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First page of the crawl
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// A page host must contain at least one of these substrings
    #[serde(rename = "allowed-host-substrings")]
    pub allowed_host_substrings: Vec<String>,

    /// A page URL must contain every one of these substrings
    #[serde(rename = "required-url-substrings", default)]
    pub required_url_substrings: Vec<String>,

    /// Image extensions worth downloading, with the leading dot
    #[serde(rename = "allowed-image-extensions")]
    pub allowed_image_extensions: Vec<String>,

    /// Concurrent page fetches (0 = uncapped)
    #[serde(rename = "html-limit", default)]
    pub html_limit: u32,

    /// Concurrent image downloads (0 = uncapped)
    #[serde(rename = "image-limit", default)]
    pub image_limit: u32,

    /// Concurrent classifier calls (0 = uncapped)
    #[serde(rename = "classify-limit", default)]
    pub classify_limit: u32,

    /// Capacity of every work channel between pipeline stages
    #[serde(rename = "channel-capacity", default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Selector for anchors followed as pages
    #[serde(rename = "link-selector", default = "default_link_selector")]
    pub link_selector: String,

    /// Selector for anchors pointing at post attachments
    #[serde(rename = "image-selector", default = "default_image_selector")]
    pub image_selector: String,
}

/// Classification service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL of the service; `<endpoint>/health` must answer before crawling
    pub endpoint: String,
}

/// Outbound request behavior
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Attempt number at which a request gives up for good
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Unit of the exponential backoff (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "keep-alive", default = "default_keep_alive")]
    pub keep_alive: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            timeout_secs: default_timeout_secs(),
            keep_alive: default_keep_alive(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root of the html/, image/ and error/ directories
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Where --export-summary writes its markdown report
    #[serde(rename = "summary-path", default = "default_summary_path")]
    pub summary_path: String,
}

impl StorageConfig {
    pub fn html_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("html")
    }

    pub fn image_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("image")
    }

    pub fn error_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("error")
    }
}

fn default_channel_capacity() -> usize {
    16
}

fn default_link_selector() -> String {
    "a".to_string()
}

fn default_image_selector() -> String {
    "div .file div .fileText a".to_string()
}

fn default_user_agent() -> String {
    "PostmanRuntime/7.29.3".to_string()
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_keep_alive() -> bool {
    true
}

fn default_summary_path() -> String {
    "data/summary.md".to_string()
}
