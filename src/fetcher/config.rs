//! Traversal configuration constants

use std::time::Duration;

use crate::RunStatus;

/// speedrun.com REST API root
pub const DEFAULT_API_BASE: &str = "https://www.speedrun.com/api/v1";

/// Runs requested per page (the API maximum)
pub const PAGE_SIZE: u32 = 200;

/// Consecutive failures tolerated for one URL before the fetch fails.
/// The request is attempted `RETRY_CEILING + 1` times in total.
pub const RETRY_CEILING: u32 = 10;

/// Fixed sleep between retries of a failed page
pub const RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Offset at which the upstream cursor stops returning results.
/// A `next` link reaching it means the rest of the shard is unreachable
/// in the current direction.
pub const OFFSET_CEILING: u64 = 10_000;

/// Field runs are ordered by; stable across ascending and descending passes
pub const ORDER_BY: &str = "submitted";

/// Tunables for a [`LeaderboardFetcher`](super::LeaderboardFetcher).
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// API root, without trailing slash
    pub api_base: String,
    /// Runs per page
    pub page_size: u32,
    /// Secondary shard keys, walked in order for each category
    pub statuses: Vec<RunStatus>,
    /// Consecutive failures tolerated per URL
    pub retry_ceiling: u32,
    /// Sleep between retries
    pub retry_interval: Duration,
    /// Offset ceiling that triggers the descending pass
    pub offset_ceiling: u64,
    /// Shards walked concurrently
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: PAGE_SIZE,
            statuses: RunStatus::ALL.to_vec(),
            retry_ceiling: RETRY_CEILING,
            retry_interval: RETRY_INTERVAL,
            offset_ceiling: OFFSET_CEILING,
            concurrency: 1,
        }
    }
}

impl FetchConfig {
    /// Override the API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the page size
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Override the retry ceiling and interval
    pub fn with_retry(mut self, ceiling: u32, interval: Duration) -> Self {
        self.retry_ceiling = ceiling;
        self.retry_interval = interval;
        self
    }

    /// Override the offset ceiling
    pub fn with_offset_ceiling(mut self, offset_ceiling: u64) -> Self {
        self.offset_ceiling = offset_ceiling;
        self
    }

    /// Number of shards walked at once (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}
