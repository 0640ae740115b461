//! Unit tests for command-line parsing

use clap::Parser;
use srcom_dump::cli::Cli;
use srcom_dump::dispatcher::config::DEFAULT_USER_AGENT;
use srcom_dump::fetcher::config::DEFAULT_API_BASE;
use srcom_dump::output::{OutputFormat, OutputTarget};
use std::path::PathBuf;

#[test]
fn test_defaults() {
    let cli = Cli::parse_from(["srcom-dump", "https://www.speedrun.com/sms"]);

    assert_eq!(cli.url, "https://www.speedrun.com/sms");
    assert_eq!(cli.output, OutputTarget::Stdout);
    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.requests_per_minute, 100);
    assert_eq!(cli.workers, 10);
    assert_eq!(cli.concurrency, 1);
    assert_eq!(cli.user_agent, DEFAULT_USER_AGENT);
    assert_eq!(cli.api_base, DEFAULT_API_BASE);
    assert!(cli.metrics_addr.is_none());
    assert!(!cli.fail_on_partial);
}

#[test]
fn test_output_flags() {
    let cli = Cli::parse_from([
        "srcom-dump",
        "https://www.speedrun.com/sms",
        "-o",
        "dumps/sms.csv",
        "-f",
        "csv",
    ]);

    assert_eq!(cli.output, OutputTarget::File(PathBuf::from("dumps/sms.csv")));
    assert_eq!(cli.output_format, OutputFormat::Csv);
}

#[test]
fn test_long_flags() {
    let cli = Cli::parse_from([
        "srcom-dump",
        "https://www.speedrun.com/sms",
        "--output-format",
        "JSON",
        "--requests-per-minute",
        "30",
        "--workers",
        "4",
        "--concurrency",
        "3",
        "--metrics-addr",
        "127.0.0.1:9090",
        "--fail-on-partial",
    ]);

    assert_eq!(cli.requests_per_minute, 30);
    assert_eq!(cli.workers, 4);
    assert_eq!(cli.concurrency, 3);
    assert_eq!(cli.metrics_addr, Some("127.0.0.1:9090".parse().unwrap()));
    assert!(cli.fail_on_partial);

    let config = cli.dispatcher_config();
    assert_eq!(config.requests_per_minute, 30);
    assert_eq!(config.workers, 4);
    assert_eq!(cli.fetch_config().concurrency, 3);
}

#[test]
fn test_rejects_bad_values() {
    let base = ["srcom-dump", "https://www.speedrun.com/sms"];
    let with = |extra: &[&str]| {
        let args: Vec<&str> = base.iter().chain(extra.iter()).copied().collect();
        Cli::try_parse_from(args)
    };

    assert!(with(&["-f", "xml"]).is_err());
    assert!(with(&["--concurrency", "0"]).is_err());
    assert!(with(&["--concurrency", "33"]).is_err());
    assert!(with(&["--workers", "65"]).is_err());
    assert!(with(&["--requests-per-minute", "0"]).is_err());
    assert!(with(&["-o", ""]).is_err());
    assert!(Cli::try_parse_from(["srcom-dump"]).is_err());
}

#[tokio::test]
async fn test_invalid_url_fails_before_any_request() {
    let cli = Cli::parse_from(["srcom-dump", "https://example.com/sms"]);
    let err = cli
        .execute(srcom_dump::shutdown::ShutdownCoordinator::shared())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "'https://example.com/sms' is not a valid URL");
}
