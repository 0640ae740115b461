//! Entry point for the srcom-dump CLI

use clap::Parser;
use srcom_dump::cli::Cli;
use srcom_dump::shutdown::ShutdownCoordinator;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Exit status when `--fail-on-partial` is set and a shard was incomplete
const EXIT_PARTIAL: i32 = 2;

/// Initialize tracing on stderr, JSON when LOG_FORMAT=json
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("srcom_dump=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received - abandoning dump");
                shutdown.request_shutdown();
            }
        }
    });

    match cli.execute(shutdown).await.map_err(|e| anyhow::anyhow!(e)) {
        Ok(summary) => {
            if !summary.is_complete() {
                eprintln!(
                    "{} of the shards are incomplete; {} runs written",
                    summary.partial_shards.len(),
                    summary.runs
                );
                if cli.fail_on_partial {
                    std::process::exit(EXIT_PARTIAL);
                }
            }
        }
        Err(e) => {
            error!("Command failed: {}", e);
            std::process::exit(1);
        }
    }
}
