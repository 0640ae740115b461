//! Sliding-window admission control with exponential backoff
//!
//! Every admitted submission leaves a monotonic timestamp in the window.
//! Before each admission check, timestamps older than the window are purged;
//! a caller is admitted only while fewer than `limit` timestamps remain.
//! Purge, check and append happen under a single lock so concurrent callers
//! can never both squeeze into the last slot.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::shutdown::ShutdownCoordinator;

/// Doubling sleep schedule used while the window is full.
///
/// Yields `initial`, `2 * initial`, ... and then `max` forever.
#[derive(Debug, Clone)]
pub struct AdmissionBackoff {
    next: Duration,
    max: Duration,
}

impl AdmissionBackoff {
    /// Create a schedule starting at `initial` and capped at `max`
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    /// Delay to sleep before the next admission check
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }
}

impl Iterator for AdmissionBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// Rolling record of admitted submissions.
#[derive(Debug)]
pub struct RateWindow {
    limit: usize,
    window: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
    history: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    /// Create a window admitting `limit` submissions per `window`
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            initial_backoff: super::config::INITIAL_ADMISSION_BACKOFF,
            max_backoff: super::config::MAX_ADMISSION_BACKOFF,
            history: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    /// Override the admission backoff bounds
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Configured admissions per window
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of admissions still inside the window
    pub async fn len(&self) -> usize {
        let mut history = self.history.lock().await;
        prune(&mut history, Instant::now(), self.window);
        history.len()
    }

    /// Whether the window currently holds no admissions
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Single purge-check-append step. Returns `true` when admitted.
    pub async fn try_admit(&self) -> bool {
        let mut history = self.history.lock().await;
        let now = Instant::now();
        prune(&mut history, now, self.window);

        if history.len() >= self.limit {
            return false;
        }

        history.push_back(now);
        true
    }

    /// Wait until the window admits one more submission.
    ///
    /// The lock is released while sleeping; admission is re-checked after
    /// every sleep because purging may have freed a slot early.
    ///
    /// # Returns
    /// Total time spent waiting for admission
    ///
    /// # Errors
    /// [`RateLimitError::Cancelled`] if shutdown is requested while waiting
    pub async fn admit(
        &self,
        shutdown: Option<&ShutdownCoordinator>,
    ) -> Result<Duration, RateLimitError> {
        let started = Instant::now();
        let mut backoff = AdmissionBackoff::new(self.initial_backoff, self.max_backoff);

        loop {
            if shutdown.is_some_and(|s| s.is_shutdown_requested()) {
                return Err(RateLimitError::Cancelled);
            }

            if self.try_admit().await {
                return Ok(started.elapsed());
            }

            let delay = backoff.next_delay();
            debug!(
                limit = self.limit,
                backoff_ms = delay.as_millis() as u64,
                "Rate window full, backing off"
            );

            match shutdown {
                Some(shutdown) => {
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = shutdown.wait_for_shutdown() => return Err(RateLimitError::Cancelled),
                    }
                }
                None => sleep(delay).await,
            }
        }
    }
}

fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = history.front() {
        if now.duration_since(*oldest) >= window {
            history.pop_front();
        } else {
            break;
        }
    }
}

/// Rate limiter errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimitError {
    /// Shutdown was requested while waiting for admission
    #[error("admission cancelled by shutdown")]
    Cancelled,
}
