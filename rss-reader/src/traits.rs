use crate::types::{FetchOutcome, Source};
use async_trait::async_trait;
use std::time::Duration;

/// Fetches one feed source and reports what happened.
///
/// Implementations never return an error: every failure is folded into
/// [`FetchOutcome::Failed`] so one broken feed cannot take down a whole
/// category. The aggregator only talks to this trait, which keeps it testable
/// without network access.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch `source`, keeping at most `per_feed_limit` entries in document
    /// order.
    ///
    /// `deadline` bounds the fetch itself and starts once the implementation
    /// holds whatever connection slot it needs; a fetch that overruns it is
    /// reported as [`FailureKind::Timeout`](crate::types::FailureKind::Timeout).
    /// Waiting for a slot is bounded by the caller.
    async fn fetch(
        &self,
        source: &Source,
        per_feed_limit: usize,
        deadline: Duration,
    ) -> FetchOutcome;
}
