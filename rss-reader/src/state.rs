use crate::aggregator::FeedAggregator;
use crate::digest::DigestAssembler;
use crate::fetcher::Fetcher;
use crate::pool::ConnectionPool;
use crate::rss_utils::time::parse_since_date;
use crate::traits::FeedFetcher;
use crate::types::{FeedDigest, FetchConfig, FetchFeedsRequest, Result};
use crate::FeedManager;
use std::sync::Arc;
use tracing::info;

/// Long-lived context behind the `fetch_feeds` operation.
///
/// Owns the feed catalog and the HTTP connection pool for the life of the
/// process; both are shared by every call.
pub struct RssState {
    feed_manager: FeedManager,
    pool: Option<Arc<ConnectionPool>>,
    assembler: DigestAssembler,
}

impl RssState {
    /// Context backed by real HTTP fetches through a lazily opened pool.
    pub fn new(feed_manager: FeedManager, config: FetchConfig) -> Self {
        let pool = Arc::new(ConnectionPool::new(config.clone()));
        let fetcher: Arc<dyn FeedFetcher> = Arc::new(Fetcher::new(pool.clone()));
        let mut state = Self::with_fetcher(feed_manager, config, fetcher);
        state.pool = Some(pool);
        state
    }

    /// Context with an injected fetcher, e.g. a fake in tests.
    pub fn with_fetcher(
        feed_manager: FeedManager,
        config: FetchConfig,
        fetcher: Arc<dyn FeedFetcher>,
    ) -> Self {
        let aggregator = Arc::new(FeedAggregator::new(fetcher, &config));
        let assembler = DigestAssembler::new(aggregator, &config);

        Self {
            feed_manager,
            pool: None,
            assembler,
        }
    }

    /// Fetch, filter and rank the articles of one category.
    ///
    /// Only a malformed `since_date` is an error; feed failures end up in the
    /// digest's error section.
    pub async fn fetch_feeds(&self, request: &FetchFeedsRequest) -> Result<FeedDigest> {
        let since = request
            .since_date
            .as_deref()
            .map(parse_since_date)
            .transpose()?;

        let sources = self.feed_manager.sources_for(&request.category);
        info!(
            "fetch_feeds: category '{}' ({} feeds), limit {}, per feed {}",
            request.category,
            sources.len(),
            request.limit,
            request.per_feed_limit
        );

        Ok(self
            .assembler
            .assemble(
                &request.category,
                &sources,
                request.limit,
                request.per_feed_limit,
                since,
            )
            .await)
    }

    /// Release the connection pool. Fetches still waiting for a slot fail.
    pub fn shutdown(self) {
        if let Some(pool) = &self.pool {
            pool.close();
            info!("Closed HTTP session (was open: {})", pool.is_open());
        }
    }
}
