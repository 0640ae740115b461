//! Integration tests for shard traversal against a simulated API

use serde_json::Value;
use srcom_dump::dispatcher::{Dispatcher, DispatcherConfig, RawResponse, TransportError};
use srcom_dump::fetcher::{FetchConfig, FetcherError, LeaderboardFetcher, Partition, ShardStatus};
use srcom_dump::{record_id, RunStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::support::{json_response, page_body, run, runs, FakeApi, MockTransport};

const API: &str = "https://fake.test/api/v1";

fn fetcher(transport: Arc<MockTransport>, page_size: u32, offset_ceiling: u64) -> LeaderboardFetcher {
    let dispatcher = Dispatcher::new(transport, DispatcherConfig::default());
    let config = FetchConfig::default()
        .with_api_base(API)
        .with_page_size(page_size)
        .with_offset_ceiling(offset_ceiling);
    LeaderboardFetcher::new(dispatcher, config)
}

fn ids(records: &[Value]) -> Vec<String> {
    records.iter().filter_map(record_id).collect()
}

fn verified(category: &str) -> Partition {
    Partition::new(category, RunStatus::Verified)
}

#[tokio::test(start_paused = true)]
async fn test_short_first_page_is_one_request() {
    let api = FakeApi::new(10_000).with_runs("cat", "verified", runs("r", 3));
    let transport = Arc::new(MockTransport::api(api));

    let shard = fetcher(transport.clone(), 200, 10_000)
        .fetch_shard(verified("cat"))
        .await
        .unwrap();

    assert_eq!(shard.status, ShardStatus::Exhausted);
    assert_eq!(ids(&shard.records), vec!["r0", "r1", "r2"]);
    assert_eq!(transport.request_count(), 1);

    let first = &transport.requests()[0];
    assert!(first.starts_with("https://fake.test/api/v1/runs?"));
    assert!(first.contains("category=cat"));
    assert!(first.contains("status=verified"));
    assert!(first.contains("orderby=submitted"));
    assert!(first.contains("direction=asc"));
    assert!(first.contains("max=200"));
}

#[tokio::test(start_paused = true)]
async fn test_follows_next_links_until_short_page() {
    let api = FakeApi::new(10_000).with_runs("cat", "verified", runs("r", 5));
    let transport = Arc::new(MockTransport::api(api));

    let shard = fetcher(transport.clone(), 2, 10_000)
        .fetch_shard(verified("cat"))
        .await
        .unwrap();

    assert_eq!(shard.status, ShardStatus::Exhausted);
    assert_eq!(ids(&shard.records), vec!["r0", "r1", "r2", "r3", "r4"]);
    assert_eq!(shard.pages, 3);
    assert_eq!(transport.request_count(), 3);
    assert!(transport.requests()[2].contains("offset=4"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_shard() {
    let transport = Arc::new(MockTransport::api(FakeApi::new(10_000)));

    let shard = fetcher(transport.clone(), 2, 10_000)
        .fetch_shard(verified("cat"))
        .await
        .unwrap();

    assert!(shard.records.is_empty());
    assert_eq!(shard.status, ShardStatus::Exhausted);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_id_on_third_page_ends_shard() {
    // Page 3 re-serves page 2, as a misbehaving upstream would.
    let transport = Arc::new(MockTransport::new(|url: &str| {
        let page = if url.contains("offset=4") || url.contains("offset=2") {
            vec![run("r2"), run("r3")]
        } else {
            vec![run("r0"), run("r1")]
        };
        let offset = if url.contains("offset=4") {
            4
        } else if url.contains("offset=2") {
            2
        } else {
            0
        };
        let next = format!("{API}/runs?category=cat&offset={}", offset + 2);
        Ok(page_body(&page, offset, 2, Some(&next)))
    }));

    let shard = fetcher(transport.clone(), 2, 10_000)
        .fetch_shard(verified("cat"))
        .await
        .unwrap();

    assert_eq!(shard.status, ShardStatus::LoopDetected);
    assert_eq!(ids(&shard.records), vec!["r0", "r1", "r2", "r3"]);
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_flips_to_descending_and_meets_in_the_middle() {
    let api = FakeApi::new(4).with_runs("cat", "verified", runs("r", 7));
    let transport = Arc::new(MockTransport::api(api));

    let shard = fetcher(transport.clone(), 2, 4)
        .fetch_shard(verified("cat"))
        .await
        .unwrap();

    assert_eq!(shard.status, ShardStatus::LoopDetected);
    assert!(shard.status.is_complete());
    assert_eq!(ids(&shard.records), vec!["r0", "r1", "r2", "r3", "r6", "r5", "r4"]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 4);
    assert!(requests[1].contains("direction=asc"));
    assert!(requests[2].contains("direction=desc"));
    assert!(!requests[2].contains("offset="));
    assert!(requests.iter().all(|url| !url.contains("offset=4")));
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_in_both_directions_abandons_shard() {
    let api = FakeApi::new(4).with_runs("cat", "verified", runs("r", 10));
    let transport = Arc::new(MockTransport::api(api));

    let result = fetcher(transport.clone(), 2, 4)
        .fetch_partitions(vec![verified("cat")])
        .await
        .unwrap();

    assert_eq!(
        ids(&result.records),
        vec!["r0", "r1", "r2", "r3", "r9", "r8", "r7", "r6"]
    );
    assert!(!result.is_complete());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].partition, verified("cat"));
    assert_eq!(result.warnings[0].records_fetched, 8);
    assert_eq!(transport.request_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_after_retry_ceiling() {
    let transport = Arc::new(MockTransport::new(|_: &str| {
        Ok(json_response(503, &serde_json::json!({"message": "down"})))
    }));
    let started = Instant::now();

    let err = fetcher(transport.clone(), 2, 10_000)
        .fetch_shard(verified("cat"))
        .await
        .unwrap_err();

    match err {
        FetcherError::RetriesExhausted {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 11);
            assert!(last_error.contains("503"));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(transport.request_count(), 11);

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(100), "slept {elapsed:?}");
    assert!(elapsed < Duration::from_secs(101), "slept {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_transport_failures_count_toward_ceiling() {
    let transport = Arc::new(MockTransport::new(|_: &str| {
        Err(TransportError::Connect("connection refused".to_string()))
    }));

    let err = fetcher(transport.clone(), 2, 10_000)
        .fetch_shard(verified("cat"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::RetriesExhausted { attempts: 11, .. }));
    assert_eq!(transport.request_count(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_failure_count() {
    // Every URL fails ten times before succeeding; ten is within the ceiling.
    let api = FakeApi::new(10_000).with_runs("cat", "verified", runs("r", 3));
    let failures: Mutex<HashMap<String, u32>> = Mutex::new(HashMap::new());
    let transport = Arc::new(MockTransport::new(move |url: &str| {
        let mut failures = failures.lock().unwrap();
        let count = failures.entry(url.to_string()).or_insert(0);
        if *count < 10 {
            *count += 1;
            return Ok(RawResponse::new(500, "oops"));
        }
        Ok(api.respond(url))
    }));
    let started = Instant::now();

    let shard = fetcher(transport.clone(), 2, 10_000)
        .fetch_shard(verified("cat"))
        .await
        .unwrap();

    assert_eq!(ids(&shard.records), vec!["r0", "r1", "r2"]);
    assert_eq!(transport.request_count(), 22);
    assert!(started.elapsed() >= Duration::from_secs(200));
}

#[tokio::test(start_paused = true)]
async fn test_record_without_id_is_rejected() {
    let transport = Arc::new(MockTransport::new(|_: &str| {
        Ok(page_body(&[serde_json::json!({"times": {}})], 0, 2, None))
    }));

    let err = fetcher(transport, 2, 10_000)
        .fetch_shard(verified("cat"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::InvalidResponse(_)));
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_body_is_fatal() {
    let transport = Arc::new(MockTransport::new(|_: &str| {
        Ok(RawResponse::new(200, "<html>maintenance</html>"))
    }));

    let err = fetcher(transport.clone(), 2, 10_000)
        .fetch_shard(verified("cat"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::ParseError(_)));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicates_across_shards_keep_first() {
    let api = FakeApi::new(10_000)
        .with_runs("a", "verified", vec![run("x"), run("y")])
        .with_runs("a", "new", vec![run("z"), run("x")])
        .with_runs("b", "verified", vec![run("y"), run("w")]);
    let transport = Arc::new(MockTransport::api(api));

    let partitions = vec![
        verified("a"),
        Partition::new("a", RunStatus::New),
        verified("b"),
    ];
    let result = fetcher(transport, 200, 10_000)
        .fetch_partitions(partitions)
        .await
        .unwrap();

    assert_eq!(ids(&result.records), vec!["x", "y", "z", "w"]);
    assert!(result.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_shards_merge_in_partition_order() {
    let api = FakeApi::new(10_000)
        .with_runs("a", "verified", runs("a", 5))
        .with_runs("b", "verified", runs("b", 3));
    let transport = Arc::new(MockTransport::api(api));
    let dispatcher = Dispatcher::new(transport, DispatcherConfig::default());
    let config = FetchConfig::default()
        .with_api_base(API)
        .with_page_size(2)
        .with_concurrency(2);

    let result = LeaderboardFetcher::new(dispatcher, config)
        .fetch_partitions(vec![verified("a"), verified("b")])
        .await
        .unwrap();

    assert_eq!(
        ids(&result.records),
        vec!["a0", "a1", "a2", "a3", "a4", "b0", "b1", "b2"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_progress_reports_running_total() {
    let api = FakeApi::new(10_000).with_runs("cat", "verified", runs("r", 5));
    let transport = Arc::new(MockTransport::api(api));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let progress = {
        let seen = seen.clone();
        Arc::new(move |total: usize| seen.lock().unwrap().push(total))
    };

    fetcher(transport, 2, 10_000)
        .with_progress(progress)
        .fetch_shard(verified("cat"))
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![2, 4, 5]);
}
