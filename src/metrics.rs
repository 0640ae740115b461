//! Observability metrics for dispatch and traversal
//!
//! Metrics are recorded through the `metrics` facade, so every call is a
//! cheap no-op until [`init_metrics`] installs the Prometheus exporter.
//!
//! ## Recorded series
//!
//! - `requests_submitted_total` / `admission_wait_seconds` - dispatcher admission
//! - `http_responses_total{status}` / `transport_failures_total` - request outcomes
//! - `fetch_retries_total` / `retry_backoff_seconds` - page-level retries
//! - `runs_fetched_total` / `partial_shards_total` - traversal results

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::RunStatus;

static METRICS_INITIALIZED: Lazy<RwLock<bool>> = Lazy::new(|| RwLock::new(false));

/// Initialize metrics system with a Prometheus scrape endpoint
///
/// Idempotent: a second call is a no-op.
///
/// # Arguments
/// * `addr` - Socket address to bind the scrape endpoint (e.g., "127.0.0.1:9090")
///
/// # Errors
/// Returns an error if the exporter cannot be installed or bound
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "requests_submitted_total",
        Unit::Count,
        "Requests admitted by the rate window"
    );
    describe_histogram!(
        "admission_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for the rate window to admit a request"
    );
    describe_counter!(
        "http_responses_total",
        Unit::Count,
        "Responses received from the upstream API, by status"
    );
    describe_counter!(
        "transport_failures_total",
        Unit::Count,
        "Requests that never produced a status code"
    );
    describe_counter!(
        "fetch_retries_total",
        Unit::Count,
        "Page requests retried after a failure"
    );
    describe_histogram!(
        "retry_backoff_seconds",
        Unit::Seconds,
        "Sleep before a page retry"
    );
    describe_counter!("runs_fetched_total", Unit::Count, "Runs collected");
    describe_counter!(
        "partial_shards_total",
        Unit::Count,
        "Shards abandoned at the offset ceiling"
    );

    *initialized = true;
    info!("Metrics endpoint listening on {}", addr);
    Ok(())
}

/// Check if the metrics exporter is installed
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record one admission and how long it waited
pub fn record_admission(waited: Duration) {
    counter!("requests_submitted_total").increment(1);
    histogram!("admission_wait_seconds").record(waited.as_secs_f64());
}

/// Record a response status
pub fn record_response(status: u16) {
    counter!("http_responses_total", "status" => status.to_string()).increment(1);
}

/// Record a request that failed below HTTP
pub fn record_transport_failure() {
    counter!("transport_failures_total").increment(1);
}

/// Record a page retry and its sleep
pub fn record_retry(backoff: Duration, attempt: u32) {
    counter!("fetch_retries_total", "attempt" => attempt.to_string()).increment(1);
    histogram!("retry_backoff_seconds").record(backoff.as_secs_f64());
}

/// Per-shard traversal metrics
pub struct ShardMetrics {
    category: String,
    status: RunStatus,
    start_time: Instant,
}

impl ShardMetrics {
    /// Start tracking a shard
    pub fn start(category: impl Into<String>, status: RunStatus) -> Self {
        let category = category.into();
        debug!(category = %category, status = %status, "Shard traversal started");
        Self {
            category,
            status,
            start_time: Instant::now(),
        }
    }

    /// Record a shard that ran to completion
    pub fn record_complete(&self, runs: usize, pages: usize) {
        counter!(
            "runs_fetched_total",
            "status" => self.status.as_str(),
        )
        .increment(runs as u64);

        debug!(
            category = %self.category,
            status = %self.status,
            runs,
            pages,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Shard traversal complete"
        );
    }

    /// Record a shard abandoned with a partial result
    pub fn record_partial(&self, runs: usize, pages: usize) {
        counter!(
            "runs_fetched_total",
            "status" => self.status.as_str(),
        )
        .increment(runs as u64);
        counter!(
            "partial_shards_total",
            "status" => self.status.as_str(),
        )
        .increment(1);

        warn!(
            category = %self.category,
            status = %self.status,
            runs,
            pages,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Shard abandoned with partial result"
        );
    }
}
