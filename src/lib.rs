//! # srcom-dump
//!
//! Dumps every run of a speedrun.com leaderboard, working around the
//! upstream API's rate limit and its unreliable pagination.
//!
//! ## Features
//!
//! - **Throttling**: a sliding-window dispatcher keeps the request rate under
//!   the API budget and backs off exponentially when the window is full
//! - **Complete traversal**: runs are sharded by category and status, loops in
//!   the pagination cursor are detected, and the 10,000 offset ceiling is
//!   worked around by walking the shard a second time in descending order
//! - **Explicit partial results**: a shard that cannot be fully walked is
//!   reported as a warning instead of being silently truncated
//! - **Output**: flattened CSV or key-sorted JSON
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use srcom_dump::dispatcher::{Dispatcher, DispatcherConfig, HttpTransport};
//! use srcom_dump::fetcher::{FetchConfig, LeaderboardFetcher};
//! use srcom_dump::identifier::LeaderboardUrl;
//! use srcom_dump::resolver::LeaderboardResolver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let url = LeaderboardUrl::parse("https://www.speedrun.com/sms")?;
//!
//! let transport = Arc::new(HttpTransport::new("srcom-dump/0.1")?);
//! let dispatcher = Dispatcher::new(transport, DispatcherConfig::default());
//! let config = FetchConfig::default();
//!
//! let leaderboard = LeaderboardResolver::new(dispatcher.clone(), config.api_base.clone())
//!     .resolve(&url)
//!     .await?;
//! let result = LeaderboardFetcher::new(dispatcher, config)
//!     .fetch_leaderboard(&leaderboard)
//!     .await?;
//!
//! println!("{} runs, {} partial shards", result.records.len(), result.warnings.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`dispatcher`] - Sliding-window rate limiting and the worker pool
//! - [`fetcher`] - Shard traversal, loop detection and deduplication
//! - [`resolver`] - Leaderboard URL to game and category ids
//! - [`identifier`] - Leaderboard URL validation
//! - [`output`] - CSV and JSON encoders
//! - [`shutdown`] - Cooperative cancellation

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Throttled request dispatch
pub mod dispatcher;

/// Paginated traversal
pub mod fetcher;

/// Leaderboard URL parsing and validation
pub mod identifier;

/// Observability metrics
pub mod metrics;

/// Record encoders
pub mod output;

/// Leaderboard resolution
pub mod resolver;

/// Cooperative cancellation shared across modules
pub mod shutdown;

pub use identifier::LeaderboardUrl;

/// One run as returned by the API. Only its `id` field is interpreted.
pub type Record = serde_json::Value;

/// Identity of a record: its `id` field, as text.
///
/// String ids are used verbatim, numeric ids in their JSON form, so `42` and
/// `"42"` are the same identity and the second one seen counts as a repeat.
/// Returns `None` for records without a usable id.
pub fn record_id(record: &Record) -> Option<String> {
    match record.get("id")? {
        serde_json::Value::String(id) => Some(id.clone()),
        serde_json::Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Run verification status, used as the secondary shard key.
///
/// A single unsplit query silently drops runs past the offset ceiling, so
/// each category is walked once per status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Verified runs
    Verified,
    /// Runs awaiting verification
    New,
    /// Rejected runs
    Rejected,
}

impl RunStatus {
    /// Every status, in traversal order
    pub const ALL: [RunStatus; 3] = [RunStatus::Verified, RunStatus::New, RunStatus::Rejected];

    /// Query-string form
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Verified => "verified",
            RunStatus::New => "new",
            RunStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "verified" => Ok(RunStatus::Verified),
            "new" => Ok(RunStatus::New),
            "rejected" => Ok(RunStatus::Rejected),
            _ => Err(format!(
                "Invalid run status: {s}. Valid options: verified, new, rejected"
            )),
        }
    }
}
