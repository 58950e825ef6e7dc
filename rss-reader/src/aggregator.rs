use crate::traits::FeedFetcher;
use crate::types::{AggregateResult, FailureRecord, FetchConfig, FetchOutcome, Source};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Stand-in deadline when the configured one does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Fans one category's sources out over a bounded set of concurrent fetches.
pub struct FeedAggregator {
    fetcher: Arc<dyn FeedFetcher>,
    max_in_flight: usize,
    fetch_timeout: Duration,
}

impl FeedAggregator {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, config: &FetchConfig) -> Self {
        Self {
            fetcher,
            max_in_flight: config.max_connections.max(1),
            fetch_timeout: config.fetch_timeout(),
        }
    }

    /// Fetch every source, returning exactly one outcome per source in the
    /// order given.
    ///
    /// At most `max_connections` fetches run at once. Each fetcher is handed
    /// the per-fetch timeout, which runs from the moment it holds a connection
    /// slot. The whole call is cut off after `overall_deadline`; any source
    /// still pending or queued at that point is cancelled and reported as a
    /// timeout. A failing source never affects the others.
    pub async fn fetch_all(
        &self,
        sources: &[Source],
        per_feed_limit: usize,
        overall_deadline: Duration,
    ) -> AggregateResult {
        if sources.is_empty() {
            return AggregateResult::default();
        }

        let start_time = Instant::now();
        let now = tokio::time::Instant::now();
        let deadline_at = now
            .checked_add(overall_deadline)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let fetch_timeout = self.fetch_timeout.min(overall_deadline);
        let fetcher = &self.fetcher;

        info!(
            "Fetching {} feeds ({} at a time, {:?} budget)",
            sources.len(),
            self.max_in_flight,
            overall_deadline
        );

        let mut slots: Vec<Option<FetchOutcome>> = vec![None; sources.len()];

        {
            let fetches = stream::iter(sources.iter().enumerate())
                .map(move |(index, source)| async move {
                    // Queueing for a connection slot is bounded by the overall
                    // deadline only; the fetcher starts its own clock once
                    // the slot is granted.
                    let outcome = fetcher.fetch(source, per_feed_limit, fetch_timeout).await;
                    (index, outcome)
                })
                .buffer_unordered(self.max_in_flight);
            tokio::pin!(fetches);

            loop {
                match tokio::time::timeout_at(deadline_at, fetches.next()).await {
                    Ok(Some((index, outcome))) => {
                        debug!(
                            "Feed {} finished ({})",
                            sources[index].url,
                            outcome_label(&outcome)
                        );
                        slots[index] = Some(outcome);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        warn!(
                            "Overall deadline of {:?} reached with feeds still pending",
                            overall_deadline
                        );
                        break;
                    }
                }
            }
            // Dropping the stream here cancels whatever is still in flight.
        }

        let outcomes: Vec<(Source, FetchOutcome)> = sources
            .iter()
            .zip(slots)
            .map(|(source, slot)| {
                let outcome = slot.unwrap_or_else(|| {
                    warn!(
                        kind = "timeout",
                        source = %source.url,
                        "Feed fetch cancelled at overall deadline"
                    );
                    FetchOutcome::Failed(FailureRecord::timeout(source, overall_deadline))
                });
                (source.clone(), outcome)
            })
            .collect();

        let result = AggregateResult::from_outcomes(outcomes);
        info!(
            "Fetched {}/{} feeds in {}ms ({} failed)",
            result.succeeded,
            sources.len(),
            start_time.elapsed().as_millis(),
            result.failed
        );
        result
    }
}

fn outcome_label(outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Fetched(entries) => format!("{} entries", entries.len()),
        FetchOutcome::Failed(failure) => failure.kind.to_string(),
    }
}
