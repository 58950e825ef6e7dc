use crate::parser::FeedParser;
use crate::pool::ConnectionPool;
use crate::traits::FeedFetcher;
use crate::types::{FailureKind, FailureRecord, FetchOutcome, RawEntry, Source};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// [`FeedFetcher`] that performs a real HTTP GET through the shared pool.
pub struct Fetcher {
    pool: Arc<ConnectionPool>,
}

impl Fetcher {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Wait for a connection slot, then fetch within `deadline`.
    ///
    /// The deadline covers the request, the body read and parsing. Time spent
    /// queued behind other fetches to the same host is not counted.
    async fn fetch_entries(
        &self,
        source: &Source,
        per_feed_limit: usize,
        deadline: Duration,
    ) -> std::result::Result<Vec<RawEntry>, FailureRecord> {
        let client = self
            .pool
            .client()
            .await
            .map_err(|e| FailureRecord::new(FailureKind::Network, source, e.to_string()))?;

        let _slot = self.pool.acquire(&source.url).await.map_err(|_| {
            FailureRecord::new(FailureKind::Network, source, "connection pool is closed")
        })?;

        let request = request_entries(client, source, per_feed_limit);
        match tokio::time::timeout(deadline, request).await {
            Ok(result) => result,
            Err(_) => Err(FailureRecord::timeout(source, deadline)),
        }
    }
}

async fn request_entries(
    client: &Client,
    source: &Source,
    per_feed_limit: usize,
) -> std::result::Result<Vec<RawEntry>, FailureRecord> {
    debug!("Fetching feed: {}", source.url);

    let response = client
        .get(&source.url)
        .send()
        .await
        .map_err(|e| classify_request_error(source, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FailureRecord::new(
            FailureKind::HttpStatus,
            source,
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| classify_request_error(source, &e))?;

    FeedParser::parse_entries(&body, source, per_feed_limit)
        .map_err(|e| FailureRecord::new(FailureKind::ParseError, source, e.to_string()))
}

#[async_trait]
impl FeedFetcher for Fetcher {
    async fn fetch(
        &self,
        source: &Source,
        per_feed_limit: usize,
        deadline: Duration,
    ) -> FetchOutcome {
        let start_time = Instant::now();

        match self.fetch_entries(source, per_feed_limit, deadline).await {
            Ok(entries) => {
                info!(
                    "Fetched {} entries from {} in {}ms",
                    entries.len(),
                    source.url,
                    start_time.elapsed().as_millis()
                );
                FetchOutcome::Fetched(entries)
            }
            Err(failure) => {
                warn!(
                    kind = %failure.kind,
                    source = %failure.source,
                    message = %failure.message,
                    "Feed fetch failed"
                );
                FetchOutcome::Failed(failure)
            }
        }
    }
}

fn classify_request_error(source: &Source, error: &reqwest::Error) -> FailureRecord {
    let kind = if error.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    FailureRecord::new(kind, source, error.to_string())
}
