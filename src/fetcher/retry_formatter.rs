//! Retry message formatting for page fetches.
//!
//! Keeps the retry, recovery and final failure lines consistent so a user
//! watching stderr can tell which shard is struggling and why.

use std::time::Duration;

use crate::dispatcher::TransportError;

/// Classification of retry errors for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Network timeout
    NetworkTimeout,
    /// Connection refused, reset, or DNS failure
    NetworkOffline,
    /// HTTP 420 or 429 throttling
    RateLimit,
    /// HTTP 5xx server error
    ServerError(u16),
    /// HTTP 404
    NotFound,
    /// Other client errors (4xx)
    ClientError(u16),
    /// Generic fallback when no better classification fits
    NetworkGeneric,
}

impl RetryErrorType {
    /// User-friendly description string used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::NotFound => "resource not found",
            Self::ClientError(_) => "client error",
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation presented after the final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection and firewall settings",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Lower --requests-per-minute and try again",
            Self::ServerError(_) => "speedrun.com may be experiencing issues, try again later",
            Self::NotFound => "Check that the leaderboard URL is correct",
            Self::ClientError(_) => "Review the request parameters or --api-base",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub error_type: RetryErrorType,
    /// Sleep before the next attempt
    pub backoff_duration: Duration,
    /// Shard being walked (e.g., "wk6pexd1/verified")
    pub shard: String,
    /// Original error message for details
    pub error_message: String,
    /// URL that failed
    pub url: String,
}

impl RetryContext {
    /// Convenience constructor used throughout the retry logic.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        backoff_duration: Duration,
        shard: impl Into<String>,
        error_message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            backoff_duration,
            shard: shard.into(),
            error_message: error_message.into(),
            url: url.into(),
        }
    }

    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        let mut message = format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds...",
            self.attempt,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64()
        );
        append_shard(&mut message, &self.shard);
        message
    }

    /// Format retry success message when a previous attempt eventually works.
    pub fn format_success(&self) -> String {
        let mut message = format!(
            "Retry attempt {}/{} succeeded - resuming traversal",
            self.attempt, self.max_attempts
        );
        append_shard(&mut message, &self.shard);
        message
    }

    /// Format final failure summary with actionable suggestions.
    pub fn format_failure(&self) -> String {
        let shard = if self.shard.is_empty() {
            "unknown"
        } else {
            &self.shard
        };

        let mut lines = vec![
            format!("[FAILED] Fetch failed after {} attempts", self.max_attempts),
            format!("  Last error: {}", self.error_message),
            format!("  Shard: {shard}"),
            format!("  URL: {}", self.url),
            "  Suggestions:".to_string(),
        ];
        lines.push(format!("    - {}", self.error_type.suggestion()));
        lines.push("    - Check API status at https://www.speedrun.com".to_string());

        lines.join("\n")
    }
}

/// Extract a [`RetryErrorType`] from an HTTP status or transport failure.
pub fn extract_error_type(status: Option<u16>, err: Option<&TransportError>) -> RetryErrorType {
    if let Some(status) = status {
        return match status {
            420 | 429 => RetryErrorType::RateLimit,
            404 => RetryErrorType::NotFound,
            500..=599 => RetryErrorType::ServerError(status),
            400..=499 => RetryErrorType::ClientError(status),
            _ => RetryErrorType::NetworkGeneric,
        };
    }

    match err {
        Some(TransportError::Timeout(_)) => RetryErrorType::NetworkTimeout,
        Some(TransportError::Connect(_)) => RetryErrorType::NetworkOffline,
        _ => RetryErrorType::NetworkGeneric,
    }
}

fn append_shard(buffer: &mut String, shard: &str) {
    if !shard.is_empty() {
        buffer.push_str(" (");
        buffer.push_str(shard);
        buffer.push(')');
    }
}
