//! Transport seam beneath the dispatcher
//!
//! The dispatcher only knows how to hand a URL to a [`Transport`] and hold on
//! to the outcome. [`HttpTransport`] is the production implementation backed
//! by a shared `reqwest::Client`; tests plug in scripted upstreams.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use tracing::{debug, warn};

use super::config::{
    calculate_transport_backoff, HTTP_CONNECT_TIMEOUT, HTTP_REQUEST_TIMEOUT,
    MAX_TRANSPORT_RETRIES,
};

/// Status and body of a completed request. Status codes are not interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Bytes,
}

impl RawResponse {
    /// Build a response from parts
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that never produced a status code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established or was reset
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The worker executing the request died
    #[error("request worker failed: {0}")]
    Worker(String),

    /// Anything else reported by the HTTP stack
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_) | Self::Body(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() || e.is_request() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Executes a single GET request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`, returning its status and body
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport with low-level retries for connection failures
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_retries: u32,
}

impl HttpTransport {
    /// Build a transport sending `user_agent` with every request
    ///
    /// # Errors
    /// Returns an error if the user agent is not a valid header value or the
    /// TLS backend cannot be initialised
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|e| TransportError::Other(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_TRANSPORT_RETRIES,
        })
    }

    /// Override the number of low-level retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Configured low-level retries
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    async fn get_once(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let mut attempt = 0;
        loop {
            match self.get_once(url).await {
                Ok(response) => {
                    debug!(url, status = response.status, attempt, "Request completed");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = calculate_transport_backoff(attempt);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transport error: {e}, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
