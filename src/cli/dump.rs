//! Dump command implementation

use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::CliError;
use crate::dispatcher::config::{DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_USER_AGENT};
use crate::dispatcher::{Dispatcher, DispatcherConfig, HttpTransport};
use crate::fetcher::config::DEFAULT_API_BASE;
use crate::fetcher::{FetchConfig, LeaderboardFetcher, PartialShard};
use crate::identifier::LeaderboardUrl;
use crate::output::{self, OutputFormat, OutputTarget};
use crate::resolver::LeaderboardResolver;
use crate::shutdown::SharedShutdown;

/// Maximum shard concurrency; the rate window is shared, so more buys nothing
const MAX_CONCURRENCY: usize = 32;

/// Upper bound on the admission budget
const MAX_REQUESTS_PER_MINUTE: usize = 10_000;

/// Maximum worker pool size
const MAX_WORKERS: usize = 64;

fn parse_bounded(s: &str, name: &str, max: usize) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err(format!("{name} must be at least 1"));
    }
    if value > max {
        return Err(format!("{name} {value} exceeds maximum of {max}"));
    }
    Ok(value)
}

fn parse_concurrency(s: &str) -> Result<usize, String> {
    parse_bounded(s, "concurrency", MAX_CONCURRENCY)
}

fn parse_requests_per_minute(s: &str) -> Result<usize, String> {
    parse_bounded(s, "requests per minute", MAX_REQUESTS_PER_MINUTE)
}

fn parse_workers(s: &str) -> Result<usize, String> {
    parse_bounded(s, "workers", MAX_WORKERS)
}

/// Dump all runs of a speedrun.com leaderboard
#[derive(Parser, Debug)]
#[command(name = "srcom-dump")]
#[command(about = "Dump all runs of a speedrun.com leaderboard", long_about = None)]
#[command(version)]
pub struct Cli {
    /// URL of the game to dump
    #[arg(value_name = "URL")]
    pub url: String,

    /// Path to output file, or - for stdout
    #[arg(short, long, value_name = "FILENAME", default_value = "-")]
    pub output: OutputTarget,

    /// Which format to use as the output (CSV or JSON)
    #[arg(short = 'f', long, default_value = "JSON")]
    pub output_format: OutputFormat,

    /// Requests admitted per rolling minute
    #[arg(long, default_value_t = DEFAULT_REQUESTS_PER_MINUTE, value_parser = parse_requests_per_minute)]
    pub requests_per_minute: usize,

    /// Requests allowed in flight at once (max: 64)
    #[arg(long, default_value = "10", value_parser = parse_workers)]
    pub workers: usize,

    /// Shards walked concurrently (max: 32)
    ///
    /// All shards share one rate window, so this mostly helps when individual
    /// requests are slow rather than when the budget is exhausted.
    #[arg(long, default_value = "1", value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// User-Agent header sent with every request
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// API root
    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Exit with status 2 if any shard is known to be incomplete
    #[arg(long, default_value_t = false)]
    pub fail_on_partial: bool,
}

/// What a finished dump produced
#[derive(Debug)]
pub struct DumpSummary {
    /// Runs written
    pub runs: usize,
    /// Shards known to be incomplete
    pub partial_shards: Vec<PartialShard>,
}

impl DumpSummary {
    /// Whether every shard was fully walked
    pub fn is_complete(&self) -> bool {
        self.partial_shards.is_empty()
    }
}

impl Cli {
    /// Dispatcher configuration derived from the flags
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::default()
            .with_requests_per_minute(self.requests_per_minute)
            .with_workers(self.workers)
    }

    /// Fetch configuration derived from the flags
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::default()
            .with_api_base(self.api_base.clone())
            .with_concurrency(self.concurrency)
    }

    /// Resolve, fetch and write the leaderboard
    ///
    /// # Errors
    /// Any fatal resolution, traversal or output error
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<DumpSummary, CliError> {
        let url = LeaderboardUrl::parse(&self.url)?;

        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        }

        let transport = Arc::new(HttpTransport::new(&self.user_agent)?);
        let dispatcher = Dispatcher::new(transport, self.dispatcher_config()).with_shutdown(shutdown);
        let fetch_config = self.fetch_config();

        let leaderboard = LeaderboardResolver::new(dispatcher.clone(), fetch_config.api_base.clone())
            .resolve(&url)
            .await?;

        let spinner = progress_spinner();
        let progress = {
            let spinner = spinner.clone();
            Arc::new(move |total: usize| {
                spinner.set_message(format!("Fetched {total} runs so far..."));
            })
        };

        let result = LeaderboardFetcher::new(dispatcher, fetch_config)
            .with_progress(progress)
            .fetch_leaderboard(&leaderboard)
            .await;
        spinner.finish_and_clear();
        let result = result?;

        for warning in &result.warnings {
            warn!(
                category = %warning.partition.category_id,
                status = %warning.partition.status,
                runs = warning.records_fetched,
                "Partial result: {}",
                warning
            );
        }

        output::write_records(&result.records, self.output_format, &self.output)?;
        info!(runs = result.records.len(), "Dump complete");

        Ok(DumpSummary {
            runs: result.records.len(),
            partial_shards: result.warnings,
        })
    }
}

fn progress_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message("Resolving leaderboard...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
