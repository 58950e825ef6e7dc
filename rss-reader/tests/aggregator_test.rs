mod common;

use common::{entry, init_tracing, sources, FakeFetcher, Script};
use chrono::Utc;
use rss_reader::{FailureKind, FeedAggregator, FetchConfig, FetchOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

fn config(max_connections: usize, fetch_timeout_seconds: u64) -> FetchConfig {
    FetchConfig {
        max_connections,
        fetch_timeout_seconds,
        ..FetchConfig::default()
    }
}

#[tokio::test]
async fn test_every_source_gets_exactly_one_outcome() {
    init_tracing();

    let urls = [
        "https://down-0.example/rss",
        "https://up-1.example/rss",
        "https://up-2.example/rss",
        "https://down-3.example/rss",
        "https://up-4.example/rss",
        "https://down-5.example/rss",
    ];
    let mut fake = FakeFetcher::new();
    for url in urls {
        let script = if url.contains("down") {
            Script::Fail(FailureKind::Network)
        } else {
            Script::Entries(vec![entry(url, "post", Some(Utc::now()))])
        };
        fake = fake.with(url, script);
    }
    let fake = Arc::new(fake);

    let aggregator = FeedAggregator::new(fake.clone(), &config(10, 10));
    let result = aggregator
        .fetch_all(&sources("Test", &urls), 5, Duration::from_secs(5))
        .await;

    assert_eq!(result.outcomes.len(), urls.len());
    assert_eq!(result.failed, 3);
    assert_eq!(result.succeeded, 3);
    assert_eq!(fake.calls(), urls.len());

    for ((source, outcome), url) in result.outcomes.iter().zip(urls) {
        assert_eq!(source.url, url);
        assert_eq!(outcome.is_success(), url.contains("up"), "{}", url);
    }
}

#[tokio::test]
async fn test_hanging_source_times_out_without_delaying_others() {
    init_tracing();

    let urls = ["https://slow.example/rss", "https://fast.example/rss"];
    let fake = Arc::new(
        FakeFetcher::new()
            .with(urls[0], Script::Hang)
            .with(urls[1], Script::Entries(vec![entry(urls[1], "quick", None)])),
    );
    let aggregator = FeedAggregator::new(fake.clone(), &config(10, 10));

    let deadline = Duration::from_millis(300);
    let start = Instant::now();
    let result = aggregator.fetch_all(&sources("Test", &urls), 5, deadline).await;
    let elapsed = start.elapsed();

    info!("Aggregation with a hanging source took {:?}", elapsed);
    assert!(elapsed < deadline + Duration::from_millis(500), "took {:?}", elapsed);

    match &result.outcomes[0].1 {
        FetchOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Timeout);
            assert_eq!(failure.source, urls[0]);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    match &result.outcomes[1].1 {
        FetchOutcome::Fetched(entries) => assert_eq!(entries.len(), 1),
        other => panic!("expected entries, got {:?}", other),
    }
}

#[tokio::test]
async fn test_per_fetch_timeout_applies_inside_overall_budget() {
    init_tracing();

    let urls = ["https://stuck.example/rss", "https://fine.example/rss"];
    let fake = Arc::new(
        FakeFetcher::new()
            .with(urls[0], Script::Hang)
            .with(urls[1], Script::Entries(vec![entry(urls[1], "ok", None)])),
    );
    let aggregator = FeedAggregator::new(fake, &config(10, 1));

    let start = Instant::now();
    let result = aggregator
        .fetch_all(&sources("Test", &urls), 5, Duration::from_secs(10))
        .await;

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(result.failed, 1);
    assert!(result
        .failures()
        .all(|f| f.kind == FailureKind::Timeout && f.source == urls[0]));
}

#[tokio::test]
async fn test_concurrency_is_bounded_by_connection_cap() {
    init_tracing();

    let urls: Vec<String> = (0..8).map(|i| format!("https://feed-{}.example/rss", i)).collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let fake = Arc::new(FakeFetcher::new().with_delay(Duration::from_millis(50)));
    let aggregator = FeedAggregator::new(fake.clone(), &config(2, 10));

    let result = aggregator
        .fetch_all(&sources("Test", &url_refs), 5, Duration::from_secs(5))
        .await;

    assert_eq!(result.outcomes.len(), 8);
    assert_eq!(result.succeeded, 8);
    assert!(fake.max_in_flight() <= 2, "saw {} concurrent fetches", fake.max_in_flight());
    assert!(fake.max_in_flight() >= 1);
}

#[tokio::test]
async fn test_unstarted_sources_time_out_at_deadline() {
    init_tracing();

    // One slot, first source hangs; the others are too slow to finish in time.
    let urls = ["https://hang.example/rss", "https://b.example/rss", "https://c.example/rss"];
    let fake = Arc::new(
        FakeFetcher::new()
            .with(urls[0], Script::Hang)
            .with_delay(Duration::from_millis(500)),
    );
    let aggregator = FeedAggregator::new(fake.clone(), &config(1, 10));

    let result = aggregator
        .fetch_all(&sources("Test", &urls), 5, Duration::from_millis(200))
        .await;

    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(result.failed, 3);
    assert!(result.failures().all(|f| f.kind == FailureKind::Timeout));
    assert!(fake.calls() <= urls.len());
}

#[tokio::test]
async fn test_per_feed_limit_is_forwarded() {
    init_tracing();

    let url = "https://many.example/rss";
    let now = Utc::now();
    let entries = (0..10).map(|i| entry(url, &format!("post {}", i), Some(now))).collect();
    let fake = Arc::new(FakeFetcher::new().with(url, Script::Entries(entries)));
    let aggregator = FeedAggregator::new(fake.clone(), &config(10, 10));

    let result = aggregator
        .fetch_all(&sources("Test", &[url]), 3, Duration::from_secs(5))
        .await;

    assert_eq!(fake.limits_seen(), vec![3]);
    match &result.outcomes[0].1 {
        FetchOutcome::Fetched(entries) => assert_eq!(entries.len(), 3),
        other => panic!("expected entries, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_sources_no_outcomes() {
    let fake = Arc::new(FakeFetcher::new());
    let aggregator = FeedAggregator::new(fake.clone(), &FetchConfig::default());

    let result = aggregator.fetch_all(&[], 5, Duration::from_secs(1)).await;

    assert!(result.outcomes.is_empty());
    assert_eq!(result.succeeded + result.failed, 0);
    assert_eq!(fake.calls(), 0);
}

#[tokio::test]
async fn test_unbounded_overall_deadline_is_accepted() {
    init_tracing();

    let url = "https://only.example/rss";
    let fake = Arc::new(
        FakeFetcher::new().with(url, Script::Entries(vec![entry(url, "post", None)])),
    );
    let aggregator = FeedAggregator::new(fake, &config(10, 1));

    let result = aggregator
        .fetch_all(&sources("Test", &[url]), 5, Duration::MAX)
        .await;

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 0);
}
