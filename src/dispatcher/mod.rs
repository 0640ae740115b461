//! Throttled request dispatch
//!
//! The [`Dispatcher`] is the only component that talks to the upstream API.
//! It enforces a sliding-window request budget and runs admitted requests on
//! a bounded worker pool.
//!
//! # Overview
//!
//! 1. **Admission**: [`Dispatcher::submit`] blocks until the [`RateWindow`]
//!    has room, backing off exponentially (1s doubling to 60s) while full.
//! 2. **Execution**: the request is handed to the worker pool, which never
//!    runs more than `workers` requests at once.
//! 3. **Resolution**: the caller gets a [`RequestTicket`] back immediately and
//!    awaits it whenever it needs the result.
//!
//! Status codes are never interpreted here; that is the fetcher's job. Only
//! admitted submissions count against the window, so low-level retries done
//! by the [`Transport`] do not consume budget.
//!
//! # Components
//!
//! - [`config`] - Defaults and builder-style configuration
//! - [`rate_limit`] - Sliding-window admission control
//! - [`ticket`] - Idempotent handles to in-flight requests
//! - [`transport`] - The HTTP seam and its reqwest implementation

pub mod config;
pub mod rate_limit;
pub mod ticket;
pub mod transport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

pub use config::DispatcherConfig;
pub use rate_limit::{AdmissionBackoff, RateLimitError, RateWindow};
pub use ticket::{RequestTicket, TicketOutcome};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};

use crate::metrics;
use crate::shutdown::SharedShutdown;

/// Dispatch errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// Admission failed
    #[error("rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),

    /// Shutdown was requested while waiting on a ticket
    #[error("request cancelled by shutdown")]
    Cancelled,
}

impl DispatchError {
    /// Whether this error stems from a shutdown request
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::RateLimit(RateLimitError::Cancelled)
        )
    }
}

struct DispatcherInner {
    window: RateWindow,
    workers: Arc<Semaphore>,
    worker_count: usize,
    transport: Arc<dyn Transport>,
    next_ticket: AtomicU64,
}

/// Rate-limited request dispatcher.
///
/// Cloning is cheap and every clone shares the same window and worker pool,
/// so independent traversals can share one budget.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
    shutdown: Option<SharedShutdown>,
}

impl Dispatcher {
    /// Create a dispatcher over `transport`
    pub fn new(transport: Arc<dyn Transport>, config: DispatcherConfig) -> Self {
        let window = RateWindow::new(config.requests_per_minute, config.window)
            .with_backoff(config.initial_backoff, config.max_backoff);

        Self {
            inner: Arc::new(DispatcherInner {
                window,
                workers: Arc::new(Semaphore::new(config.workers.max(1))),
                worker_count: config.workers.max(1),
                transport,
                next_ticket: AtomicU64::new(0),
            }),
            shutdown: None,
        }
    }

    /// Attach a shutdown coordinator; admission waits and ticket waits abort on shutdown
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Shutdown coordinator, if attached
    pub fn shutdown(&self) -> Option<&SharedShutdown> {
        self.shutdown.as_ref()
    }

    /// Admission window shared by all clones
    pub fn window(&self) -> &RateWindow {
        &self.inner.window
    }

    /// Worker pool size
    pub fn workers(&self) -> usize {
        self.inner.worker_count
    }

    /// Submit a GET for `url`.
    ///
    /// Suspends until the rate window admits the request, then returns a
    /// ticket without waiting for the response.
    ///
    /// # Errors
    /// [`DispatchError::RateLimit`] if shutdown is requested during admission
    pub async fn submit(&self, url: impl Into<String>) -> Result<RequestTicket, DispatchError> {
        let url: String = url.into();

        let waited = self.inner.window.admit(self.shutdown.as_deref()).await?;
        metrics::record_admission(waited);

        let id = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        debug!(
            ticket = id,
            url = %url,
            waited_ms = waited.as_millis() as u64,
            "Request admitted"
        );

        let workers = self.inner.workers.clone();
        let transport = self.inner.transport.clone();
        let task_url = url.clone();
        let handle = tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|e| TransportError::Worker(e.to_string()))?;
            trace!(ticket = id, "Worker picked up request");
            let outcome = transport.get(&task_url).await;
            match &outcome {
                Ok(response) => metrics::record_response(response.status),
                Err(_) => metrics::record_transport_failure(),
            }
            outcome
        });

        Ok(RequestTicket::new(id, url, handle))
    }

    /// Submit `url` and wait for its outcome, honouring shutdown
    ///
    /// # Errors
    /// [`DispatchError`] if shutdown interrupts admission or the wait
    pub async fn fetch(&self, url: impl Into<String>) -> Result<TicketOutcome, DispatchError> {
        let ticket = self.submit(url).await?;
        ticket.wait_or_cancel(self.shutdown.as_deref()).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("requests_per_window", &self.inner.window.limit())
            .field("workers", &self.inner.worker_count)
            .finish()
    }
}
