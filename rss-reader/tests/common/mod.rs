// Shared fakes and helpers for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rss_reader::{FailureKind, FailureRecord, FeedFetcher, FetchOutcome, RawEntry, Source};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// What the fake does when asked for a given URL.
#[derive(Debug, Clone)]
pub enum Script {
    Entries(Vec<RawEntry>),
    Fail(FailureKind),
    /// Never answers; only the fetch deadline ends it.
    Hang,
}

/// In-memory [`FeedFetcher`] with scripted per-URL behaviour.
pub struct FakeFetcher {
    scripts: HashMap<String, Script>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    limits_seen: Mutex<Vec<usize>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            limits_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn limits_seen(&self) -> Vec<usize> {
        self.limits_seen.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeFetcher {
    async fn run_script(&self, source: &Source, per_feed_limit: usize) -> FetchOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.scripts.get(&source.url) {
            Some(Script::Entries(entries)) => {
                FetchOutcome::Fetched(entries.iter().take(per_feed_limit).cloned().collect())
            }
            Some(Script::Fail(kind)) => {
                FetchOutcome::Failed(FailureRecord::new(*kind, source, "scripted failure"))
            }
            Some(Script::Hang) => std::future::pending::<FetchOutcome>().await,
            None => FetchOutcome::Fetched(Vec::new()),
        }
    }
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(
        &self,
        source: &Source,
        per_feed_limit: usize,
        deadline: Duration,
    ) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.limits_seen.lock().unwrap().push(per_feed_limit);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match tokio::time::timeout(deadline, self.run_script(source, per_feed_limit)).await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::Failed(FailureRecord::timeout(source, deadline)),
        }
    }
}

pub fn entry(source: &str, title: &str, published: Option<DateTime<Utc>>) -> RawEntry {
    RawEntry {
        title: Some(title.to_string()),
        link: Some(format!("{}/{}", source.trim_end_matches("/rss"), title.replace(' ', "-"))),
        summary: Some(format!("<p>About <b>{}</b></p>", title)),
        published: published.map(|dt| dt.to_rfc3339()),
        source: source.to_string(),
    }
}

pub fn sources(category: &str, urls: &[&str]) -> Vec<Source> {
    urls.iter().map(|url| Source::new(*url, category)).collect()
}
