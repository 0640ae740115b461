use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use srcom_dump::dispatcher::{Dispatcher, DispatcherConfig};
use srcom_dump::fetcher::{FetchConfig, FetcherError, LeaderboardFetcher, Partition};
use srcom_dump::shutdown::ShutdownCoordinator;
use srcom_dump::RunStatus;
use tokio::time::Instant;

use crate::support::{json_response, MockTransport};

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            true
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

/// Shutdown requested before anyone waits must not be missed.
#[tokio::test]
async fn shutdown_requested_before_wait_is_seen() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let handle = shutdown.clone();
    let waiter = tokio::spawn(async move {
        handle.wait_for_shutdown().await;
        true
    });

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok(), "wait_for_shutdown() hung despite shutdown already requested");
}

#[tokio::test]
async fn shutdown_concurrent_waiters_all_notified() {
    let shutdown = ShutdownCoordinator::shared();

    let mut waiters = Vec::new();
    for _ in 0..10 {
        let handle = shutdown.clone();
        waiters.push(tokio::spawn(async move {
            handle.wait_for_shutdown().await;
        }));
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown.request_shutdown();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "A waiter was not notified of shutdown");
    }
}

/// A shard stuck retrying stops at the next sleep once shutdown is requested.
#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_retry_sleep() {
    let shutdown = ShutdownCoordinator::shared();
    let transport = Arc::new(MockTransport::new(|_: &str| {
        Ok(json_response(503, &json!({"message": "down"})))
    }));
    let dispatcher =
        Dispatcher::new(transport.clone(), DispatcherConfig::default()).with_shutdown(shutdown.clone());
    let fetcher = LeaderboardFetcher::new(
        dispatcher,
        FetchConfig::default().with_api_base("https://fake.test/api/v1"),
    );
    let started = Instant::now();

    let walk = tokio::spawn(async move {
        fetcher
            .fetch_shard(Partition::new("cat", RunStatus::Verified))
            .await
    });

    tokio::time::sleep(Duration::from_secs(15)).await;
    shutdown.request_shutdown();

    let err = walk.await.unwrap().unwrap_err();
    assert!(matches!(err, FetcherError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_fetch_sends_nothing() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let transport = Arc::new(MockTransport::new(|_: &str| {
        Ok(json_response(200, &json!({})))
    }));
    let dispatcher =
        Dispatcher::new(transport.clone(), DispatcherConfig::default()).with_shutdown(shutdown);

    let err = LeaderboardFetcher::new(dispatcher, FetchConfig::default())
        .fetch_shard(Partition::new("cat", RunStatus::New))
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::Cancelled));
    assert_eq!(transport.request_count(), 0);
}
