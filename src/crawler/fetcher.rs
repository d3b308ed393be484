//! HTTP transport for the crawler
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the board-friendly default headers
//! - GET requests for pages and images, multipart POSTs for classification
//! - Retry with exponential backoff for transient failures
//! - Capturing unexpected responses in the diagnostic store
//! - Classifying every response into an `Outcome`

use crate::config::RequestConfig;
use crate::storage::DiagnosticStore;
use crate::ScoutError;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use std::error::Error as _;
use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};

const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Error text fragments that mark a network failure as worth retrying
const TRANSIENT_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection closed",
    "broken pipe",
    "timed out",
    "eof",
];

/// Final result of a request, after any retries
#[derive(Debug)]
pub enum Outcome {
    /// 2xx response with its full body
    Success {
        /// HTTP status code
        status: u16,
        /// Response body
        body: Vec<u8>,
    },

    /// HTTP 404; never retried
    NotFound,

    /// Any other failure the caller has to decide about
    Failed {
        /// HTTP status code, `None` for network errors
        status: Option<u16>,
        /// Human readable reason for logs
        reason: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Body that can be rebuilt for every attempt
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// multipart/form-data with a single file part
    Multipart {
        field: String,
        file_name: String,
        data: Vec<u8>,
    },
}

impl RequestBody {
    fn to_form(&self) -> Form {
        match self {
            Self::Multipart {
                field,
                file_name,
                data,
            } => Form::new().part(
                field.clone(),
                Part::bytes(data.clone()).file_name(file_name.clone()),
            ),
        }
    }
}

/// A request description the transport can send any number of times
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub body: Option<RequestBody>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    /// POST uploading `data` as the single file part named `field`
    pub fn post_file(
        url: impl Into<String>,
        field: impl Into<String>,
        file_name: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: Some(RequestBody::Multipart {
                field: field.into(),
                file_name: file_name.into(),
                data,
            }),
        }
    }
}

/// Exponential backoff with a hard attempt budget
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RequestConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Delay before the attempt after `attempt`: `base * 2^attempt`
    ///
    /// # Examples
    ///
    /// ```
    /// use pepe_scout::crawler::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy { max_attempts: 10, base_delay: Duration::from_secs(1) };
    /// assert_eq!(policy.delay(1), Duration::from_secs(2));
    /// assert_eq!(policy.delay(3), Duration::from_secs(8));
    /// ```
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Fails once `attempt` reaches the budget
    ///
    /// Attempts are numbered from 1.
    pub fn check(&self, request: &Request, attempt: u32) -> Result<(), ScoutError> {
        if attempt >= self.max_attempts {
            return Err(ScoutError::RetriesExhausted {
                method: request.method.to_string(),
                url: request.url.clone(),
                attempts: attempt,
            });
        }
        Ok(())
    }

    /// Checks the budget, then sleeps for the backoff of `attempt`
    pub async fn back_off(&self, request: &Request, attempt: u32) -> Result<(), ScoutError> {
        self.check(request, attempt + 1)?;
        let delay = self.delay(attempt);
        info!(
            "Retrying {} {} after {:?}",
            request.method, request.url, delay
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

/// Result of a single attempt
enum Attempt {
    Done(Outcome),
    Retry(String),
}

/// Builds an HTTP client with the crawler's default headers
///
/// # Arguments
///
/// * `config` - The request configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &RequestConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGE),
    );

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true for network errors that are expected to clear up on retry
///
/// Timeouts and body read failures always qualify. Anything else, connect
/// errors included, only qualifies when a cause in its source chain is a
/// refused, reset or timed out connection or a premature EOF. Name
/// resolution failures do not.
fn is_transient(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_body() {
        return true;
    }

    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<io::Error>() {
            if is_transient_io(io.kind()) {
                return true;
            }
        }

        let text = cause.to_string().to_lowercase();
        if TRANSIENT_MARKERS.iter().any(|marker| text.contains(marker)) {
            return true;
        }
        source = cause.source();
    }

    false
}

fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::UnexpectedEof
    )
}

/// Sends requests with retries and sorts responses into outcomes
#[derive(Clone)]
pub struct Transport {
    client: Client,
    policy: RetryPolicy,
    keep_alive: bool,
    diagnostics: DiagnosticStore,
}

impl Transport {
    pub fn new(config: &RequestConfig, diagnostics: DiagnosticStore) -> Result<Self, ScoutError> {
        Ok(Self {
            client: build_http_client(config)?,
            policy: RetryPolicy::from_config(config),
            keep_alive: config.keep_alive,
            diagnostics,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `request`, retrying transient failures until the budget runs out
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | `Outcome::Success` |
    /// | HTTP 404 | Immediate `Outcome::NotFound` |
    /// | HTTP 503 | Retry with backoff |
    /// | Other status | Body saved to the error store, `Outcome::Failed` |
    /// | Timeout, refused, reset, EOF | Retry with backoff |
    /// | Other network error, DNS failures included | `Outcome::Failed` without status |
    pub async fn execute(&self, request: &Request) -> Result<Outcome, ScoutError> {
        let mut attempt = 1;
        loop {
            self.policy.check(request, attempt)?;

            match self.attempt(request).await? {
                Attempt::Done(outcome) => return Ok(outcome),
                Attempt::Retry(reason) => {
                    warn!("Failed to {} {}; {}", request.method, request.url, reason);
                    self.policy.back_off(request, attempt).await?;
                    attempt += 1;
                }
            }
        }
    }

    /// Fails with `ClassifierUnavailable` unless `<endpoint>/health` answers 2xx
    ///
    /// A single attempt is made so a missing service is reported at once.
    pub async fn health_check(&self, endpoint: &str) -> Result<(), ScoutError> {
        let url = format!("{}/health", endpoint.trim_end_matches('/'));
        let request = Request::get(url.clone());

        match self.attempt(&request).await? {
            Attempt::Done(Outcome::Success { .. }) => {
                info!("Classifier is healthy at {}", url);
                Ok(())
            }
            Attempt::Done(outcome) => {
                debug!("Health check outcome: {:?}", outcome);
                Err(ScoutError::ClassifierUnavailable { url })
            }
            Attempt::Retry(reason) => {
                debug!("Health check failed: {}", reason);
                Err(ScoutError::ClassifierUnavailable { url })
            }
        }
    }

    async fn attempt(&self, request: &Request) -> Result<Attempt, ScoutError> {
        debug!("Fetching {} {}", request.method, request.url);

        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header(header::CONNECTION, connection);

        if let Some(body) = &request.body {
            builder = builder.multipart(body.to_form());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) => return Ok(Attempt::Retry(e.to_string())),
            Err(e) => {
                warn!(
                    "Failed to {} {}; unknown error {}",
                    request.method, request.url, e
                );
                return Ok(Attempt::Done(Outcome::Failed {
                    status: None,
                    reason: e.to_string(),
                }));
            }
        };

        let status = response.status();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Ok(Attempt::Retry("503 response".to_string()));
        }

        if status == StatusCode::NOT_FOUND {
            debug!("Failed to {} {}; 404 response", request.method, request.url);
            return Ok(Attempt::Done(Outcome::NotFound));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if is_transient(&e) => return Ok(Attempt::Retry(e.to_string())),
            Err(e) => {
                return Ok(Attempt::Done(Outcome::Failed {
                    status: Some(status.as_u16()),
                    reason: e.to_string(),
                }))
            }
        };

        if !status.is_success() {
            let path = self
                .diagnostics
                .record_response(status.as_u16(), &request.url, &body)
                .await?;
            warn!(
                "Failed to {} {}; {} response saved to {}",
                request.method,
                request.url,
                status.as_u16(),
                path.display()
            );
            return Ok(Attempt::Done(Outcome::Failed {
                status: Some(status.as_u16()),
                reason: format!("{} response", status.as_u16()),
            }));
        }

        debug!("Successfully fetched {} {}", request.method, request.url);
        Ok(Attempt::Done(Outcome::Success {
            status: status.as_u16(),
            body: body.to_vec(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(base_ms),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&RequestConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_delay_is_exponential() {
        let policy = policy(1000);
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(4), Duration::from_secs(16));
    }

    #[test]
    fn test_delay_is_monotonic() {
        let policy = policy(250);
        let delays: Vec<_> = (1..12).map(|a| policy.delay(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = policy(1000);
        assert!(policy.delay(200) >= policy.delay(31));
    }

    #[test]
    fn test_check_budget() {
        let policy = policy(1);
        let request = Request::get("https://a.b/g/");

        assert!(policy.check(&request, 1).is_ok());
        assert!(policy.check(&request, 9).is_ok());
        match policy.check(&request, 10) {
            Err(ScoutError::RetriesExhausted { method, attempts, .. }) => {
                assert_eq!(method, "GET");
                assert_eq!(attempts, 10);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_transient_io_kinds() {
        assert!(is_transient_io(io::ErrorKind::ConnectionRefused));
        assert!(is_transient_io(io::ErrorKind::ConnectionReset));
        assert!(is_transient_io(io::ErrorKind::UnexpectedEof));
        assert!(!is_transient_io(io::ErrorKind::NotFound));
        assert!(!is_transient_io(io::ErrorKind::Other));
    }

    #[test]
    fn test_multipart_request() {
        let request = Request::post_file("http://localhost:5000", "file", "a.png", vec![1, 2, 3]);
        assert_eq!(request.method, Method::POST);
        match request.body {
            Some(RequestBody::Multipart { field, file_name, data }) => {
                assert_eq!(field, "file");
                assert_eq!(file_name, "a.png");
                assert_eq!(data, vec![1, 2, 3]);
            }
            None => panic!("expected a body"),
        }
    }
}
