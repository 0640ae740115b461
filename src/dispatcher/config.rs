//! Dispatcher configuration constants

use std::time::Duration;

/// Default admissions per rolling window.
/// speedrun.com allows 100 requests per minute per client.
pub const DEFAULT_REQUESTS_PER_MINUTE: usize = 100;

/// Length of the rolling admission window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Number of requests allowed to execute concurrently.
pub const DEFAULT_WORKERS: usize = 10;

/// First sleep when the window is full.
pub const INITIAL_ADMISSION_BACKOFF: Duration = Duration::from_secs(1);

/// Ceiling for a single admission sleep.
pub const MAX_ADMISSION_BACKOFF: Duration = Duration::from_secs(60);

/// Low-level retries for requests that never produced a status code.
/// These happen beneath the dispatcher and are not counted in the window.
pub const MAX_TRANSPORT_RETRIES: u32 = 10;

/// Initial transport retry delay in milliseconds.
pub const INITIAL_TRANSPORT_BACKOFF_MS: u64 = 250;

/// Maximum transport retry delay in milliseconds.
pub const MAX_TRANSPORT_BACKOFF_MS: u64 = 30_000;

/// HTTP connect timeout
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP request timeout
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("srcom-dump/", env!("CARGO_PKG_VERSION"));

/// Calculate exponential backoff delay for transport retries
pub fn calculate_transport_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_TRANSPORT_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    Duration::from_millis(delay_ms.min(MAX_TRANSPORT_BACKOFF_MS))
}

/// Tunables for a [`Dispatcher`](super::Dispatcher).
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Admissions allowed inside one window
    pub requests_per_minute: usize,
    /// Window length
    pub window: Duration,
    /// Worker pool size
    pub workers: usize,
    /// First admission sleep
    pub initial_backoff: Duration,
    /// Admission sleep cap
    pub max_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            window: RATE_WINDOW,
            workers: DEFAULT_WORKERS,
            initial_backoff: INITIAL_ADMISSION_BACKOFF,
            max_backoff: MAX_ADMISSION_BACKOFF,
        }
    }
}

impl DispatcherConfig {
    /// Set the number of admissions per window (minimum 1)
    pub fn with_requests_per_minute(mut self, requests_per_minute: usize) -> Self {
        self.requests_per_minute = requests_per_minute.max(1);
        self
    }

    /// Set the worker pool size (minimum 1)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Override the admission backoff bounds
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }
}
