//! Paginated leaderboard traversal
//!
//! A leaderboard is split into shards, one per `(category, status)` pair.
//! Each shard is walked page by page through the [`Dispatcher`], one request
//! at a time, by a [`TraversalState`]. Shard results are merged into a
//! [`LeaderboardResult`] that drops repeated run ids, keeping the first one.
//!
//! Failed pages are retried at a fixed interval; a URL that keeps failing
//! past the retry ceiling fails the whole fetch. A shard that cannot be fully
//! walked because of the offset ceiling is kept, and reported as a
//! [`PartialShard`] warning on the result.

pub mod config;
pub mod page;
pub mod retry_formatter;
pub mod traversal;

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

pub use config::FetchConfig;
pub use page::{Page, Pagination};
pub use traversal::{Direction, ShardStatus, Step, TraversalState};

use crate::dispatcher::{DispatchError, Dispatcher, RawResponse};
use crate::metrics::{self, ShardMetrics};
use crate::resolver::Leaderboard;
use crate::{record_id, Record, RunStatus};
use retry_formatter::{extract_error_type, RetryContext};

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// A URL kept failing past the retry ceiling
    #[error("giving up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Failing URL
        url: String,
        /// Attempts made
        attempts: u32,
        /// Last status or transport failure
        last_error: String,
    },

    /// Response body could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Response parsed but is unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A request URL could not be built
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Shutdown was requested
    #[error("fetch cancelled")]
    Cancelled,
}

impl From<DispatchError> for FetcherError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Cancelled | DispatchError::RateLimit(_) => FetcherError::Cancelled,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// One traversal shard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    /// Category id
    pub category_id: String,
    /// Run status filter
    pub status: RunStatus,
}

impl Partition {
    /// Create a partition
    pub fn new(category_id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            category_id: category_id.into(),
            status,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category_id, self.status)
    }
}

/// Records collected from one shard
#[derive(Debug)]
pub struct ShardResult {
    /// The shard
    pub partition: Partition,
    /// Records in first-seen order, unique within the shard
    pub records: Vec<Record>,
    /// Pages requested successfully
    pub pages: usize,
    /// How the walk ended
    pub status: ShardStatus,
}

/// A shard known to be incomplete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialShard {
    /// The shard
    pub partition: Partition,
    /// Records collected before it was abandoned
    pub records_fetched: usize,
}

impl fmt::Display for PartialShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "category {} ({} runs) is incomplete: {} runs fetched, more exist past the offset ceiling in both directions",
            self.partition.category_id, self.partition.status, self.records_fetched
        )
    }
}

/// Deduplicated records of a whole leaderboard
#[derive(Debug, Default)]
pub struct LeaderboardResult {
    /// Records in first-seen order, unique by id
    pub records: Vec<Record>,
    /// Shards known to be incomplete
    pub warnings: Vec<PartialShard>,
    seen: HashSet<String>,
}

impl LeaderboardResult {
    /// Empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` unless its id was already seen. Returns whether it was kept.
    ///
    /// Records without an id are always kept.
    pub fn push(&mut self, record: Record) -> bool {
        if let Some(id) = record_id(&record) {
            if !self.seen.insert(id) {
                return false;
            }
        }
        self.records.push(record);
        true
    }

    /// Merge a shard, recording a warning if it was abandoned
    pub fn absorb(&mut self, shard: ShardResult) {
        if shard.status == ShardStatus::Abandoned {
            self.warnings.push(PartialShard {
                partition: shard.partition,
                records_fetched: shard.records.len(),
            });
        }
        for record in shard.records {
            self.push(record);
        }
    }

    /// Whether every shard was fully walked
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Progress callback, invoked with the running total of runs collected
pub type ProgressCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// Walks leaderboard shards through a shared [`Dispatcher`]
#[derive(Clone)]
pub struct LeaderboardFetcher {
    dispatcher: Dispatcher,
    config: FetchConfig,
    progress: Option<ProgressCallback>,
    collected: Arc<AtomicUsize>,
}

impl LeaderboardFetcher {
    /// Create a fetcher
    pub fn new(dispatcher: Dispatcher, config: FetchConfig) -> Self {
        Self {
            dispatcher,
            config,
            progress: None,
            collected: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report the running total of collected runs after every page
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch every run of `leaderboard`, walking each category once per status
    ///
    /// # Errors
    /// Fails if any page exhausts its retries, a response is malformed, or
    /// shutdown is requested
    pub async fn fetch_leaderboard(
        &self,
        leaderboard: &Leaderboard,
    ) -> FetcherResult<LeaderboardResult> {
        self.fetch_partitions(leaderboard.partitions(&self.config.statuses))
            .await
    }

    /// Walk `partitions` and merge their records in partition order
    ///
    /// Up to `concurrency` shards are walked at once; requests within a shard
    /// stay strictly sequential.
    ///
    /// # Errors
    /// The first shard error aborts the whole fetch
    pub async fn fetch_partitions(
        &self,
        partitions: Vec<Partition>,
    ) -> FetcherResult<LeaderboardResult> {
        let shard_count = partitions.len();
        let mut shards = stream::iter(partitions)
            .map(|partition| self.fetch_shard(partition))
            .buffered(self.config.concurrency.max(1));

        let mut result = LeaderboardResult::new();
        while let Some(shard) = shards.next().await {
            result.absorb(shard?);
        }

        info!(
            shards = shard_count,
            runs = result.records.len(),
            partial_shards = result.warnings.len(),
            "Leaderboard fetch complete"
        );
        Ok(result)
    }

    /// Walk a single shard to completion or abandonment
    ///
    /// # Errors
    /// See [`LeaderboardFetcher::fetch_partitions`]
    pub async fn fetch_shard(&self, partition: Partition) -> FetcherResult<ShardResult> {
        let shard_metrics = ShardMetrics::start(&partition.category_id, partition.status);
        let mut state = TraversalState::new(&self.config, &partition)?;

        let status = loop {
            let response = self.fetch_page(&state.next_url, &partition).await?;
            let page = Page::parse(&response.body)?;
            let before = state.records.len();

            let step = state.absorb(page)?;
            self.report_progress(state.records.len() - before);

            match step {
                Step::Continue => continue,
                Step::Done(status) => break status,
            }
        };

        let pages = state.pages();
        if status.is_complete() {
            shard_metrics.record_complete(state.records.len(), pages);
        } else {
            shard_metrics.record_partial(state.records.len(), pages);
        }

        Ok(ShardResult {
            partition,
            records: state.records,
            pages,
            status,
        })
    }

    /// Request `url` until it succeeds or the retry ceiling is reached.
    ///
    /// Non-2xx statuses and transport failures both count as failures. After
    /// `retry_ceiling` sleeps, one more failure is fatal.
    async fn fetch_page(&self, url: &str, partition: &Partition) -> FetcherResult<RawResponse> {
        let mut failures: u32 = 0;

        loop {
            self.check_cancelled()?;

            let (status, transport_error) = match self.dispatcher.fetch(url).await? {
                Ok(response) if response.is_success() => {
                    if failures > 0 {
                        let ctx = self.retry_context(failures + 1, None, None, url, partition);
                        info!("{}", ctx.format_success());
                    }
                    return Ok(response);
                }
                Ok(response) => (Some(response.status), None),
                Err(e) => (None, Some(e)),
            };

            let last_error = match (&status, &transport_error) {
                (Some(status), _) => format!("HTTP status {status}"),
                (None, Some(e)) => e.to_string(),
                (None, None) => "unknown error".to_string(),
            };

            if failures >= self.config.retry_ceiling {
                let ctx = self.retry_context(
                    failures + 1,
                    status,
                    transport_error.as_ref(),
                    url,
                    partition,
                );
                let ctx = RetryContext {
                    error_message: last_error.clone(),
                    ..ctx
                };
                error!("{}", ctx.format_failure());
                return Err(FetcherError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: failures + 1,
                    last_error,
                });
            }

            failures += 1;
            let ctx = self.retry_context(failures, status, transport_error.as_ref(), url, partition);
            warn!(url, error = %last_error, "{}", ctx.format_retry());
            metrics::record_retry(self.config.retry_interval, failures);

            self.sleep_or_cancel(self.config.retry_interval).await?;
        }
    }

    fn retry_context(
        &self,
        attempt: u32,
        status: Option<u16>,
        transport_error: Option<&crate::dispatcher::TransportError>,
        url: &str,
        partition: &Partition,
    ) -> RetryContext {
        let error_type = extract_error_type(status, transport_error);
        RetryContext::new(
            attempt,
            self.config.retry_ceiling + 1,
            error_type,
            self.config.retry_interval,
            partition.to_string(),
            error_type.description(),
            url,
        )
    }

    fn check_cancelled(&self) -> FetcherResult<()> {
        match self.dispatcher.shutdown() {
            Some(shutdown) if shutdown.is_shutdown_requested() => Err(FetcherError::Cancelled),
            _ => Ok(()),
        }
    }

    async fn sleep_or_cancel(&self, duration: std::time::Duration) -> FetcherResult<()> {
        match self.dispatcher.shutdown() {
            Some(shutdown) => tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = shutdown.wait_for_shutdown() => Err(FetcherError::Cancelled),
            },
            None => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }

    fn report_progress(&self, added: usize) {
        let total = self.collected.fetch_add(added, Ordering::Relaxed) + added;
        if let Some(progress) = &self.progress {
            progress(total);
        }
    }
}

impl fmt::Debug for LeaderboardFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaderboardFetcher")
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish()
    }
}
