use crate::aggregator::FeedAggregator;
use crate::rss_utils::text::{clean, collapse_whitespace, extract_text_from_html};
use crate::rss_utils::time::{default_since, parse_date};
use crate::types::{
    AggregateResult, Article, FailureRecord, FeedDigest, FetchConfig, FetchOutcome, RawEntry,
    Source,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Turns a category's feeds into a ranked article list plus markdown.
pub struct DigestAssembler {
    aggregator: Arc<FeedAggregator>,
    overall_timeout: Duration,
    summary_max_chars: usize,
    lookback_days: i64,
}

impl DigestAssembler {
    pub fn new(aggregator: Arc<FeedAggregator>, config: &FetchConfig) -> Self {
        Self {
            aggregator,
            overall_timeout: config.overall_timeout(),
            summary_max_chars: config.summary_max_chars,
            lookback_days: config.default_lookback_days,
        }
    }

    pub async fn assemble(
        &self,
        category: &str,
        sources: &[Source],
        limit: usize,
        per_feed_limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> FeedDigest {
        if sources.is_empty() {
            info!("No feeds configured for category '{}'", category);
            return FeedDigest {
                markdown: render_no_feeds(category),
                articles: Vec::new(),
                errors: Vec::new(),
            };
        }

        let since = since.unwrap_or_else(|| default_since(Utc::now(), self.lookback_days));
        let result = self
            .aggregator
            .fetch_all(sources, per_feed_limit, self.overall_timeout)
            .await;

        self.build_digest(category, &result, limit, since)
    }

    /// Pure half of [`assemble`](Self::assemble): filter, rank, cap and render.
    pub fn build_digest(
        &self,
        category: &str,
        result: &AggregateResult,
        limit: usize,
        since: DateTime<Utc>,
    ) -> FeedDigest {
        let mut seen_links = HashSet::new();
        let mut articles = Vec::new();

        for (_, outcome) in &result.outcomes {
            let entries = match outcome {
                FetchOutcome::Fetched(entries) => entries,
                FetchOutcome::Failed(_) => continue,
            };

            for entry in entries {
                let Some(article) = self.to_article(entry) else {
                    debug!("Dropping entry without title or link from {}", entry.source);
                    continue;
                };

                if article.published.is_some_and(|published| published < since) {
                    continue;
                }

                if !seen_links.insert(article.link.clone()) {
                    debug!("Removing duplicate entry: {} ({})", article.title, article.link);
                    continue;
                }

                articles.push(article);
            }
        }

        rank_articles(&mut articles);
        articles.truncate(limit);

        let errors: Vec<FailureRecord> = result.failures().cloned().collect();
        let markdown = render_markdown(category, &articles, &errors, result.succeeded);

        info!(
            "Category '{}': {} articles, {} failed feeds",
            category,
            articles.len(),
            errors.len()
        );

        FeedDigest {
            markdown,
            articles,
            errors,
        }
    }

    fn to_article(&self, entry: &RawEntry) -> Option<Article> {
        let title = entry
            .title
            .as_deref()
            .map(extract_text_from_html)
            .filter(|title| !title.is_empty());
        let link = entry.link.clone().filter(|link| !link.trim().is_empty());

        if title.is_none() && link.is_none() {
            return None;
        }

        Some(Article {
            title: title.unwrap_or_else(|| "Untitled".to_string()),
            link: link.unwrap_or_else(|| entry.source.clone()),
            summary: clean(entry.summary.as_deref().unwrap_or(""), self.summary_max_chars),
            published: entry.published.as_deref().and_then(parse_date),
            source: entry.source.clone(),
        })
    }
}

/// Newest first; undated articles go last. The sort is stable so equal keys
/// keep their arrival order.
pub fn rank_articles(articles: &mut [Article]) {
    articles.sort_by(|a, b| match (a.published, b.published) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

fn render_no_feeds(category: &str) -> String {
    format!(
        "# {}\n\nNo feeds are configured for category '{}'.\n",
        category, category
    )
}

pub fn render_markdown(
    category: &str,
    articles: &[Article],
    errors: &[FailureRecord],
    succeeded: usize,
) -> String {
    let mut markdown = String::new();
    let _ = writeln!(markdown, "# {}\n", category);

    if articles.is_empty() {
        if succeeded == 0 && !errors.is_empty() {
            markdown.push_str("No articles could be fetched: every feed was unreachable.\n");
        } else {
            markdown.push_str("No recent articles found.\n");
        }
    }

    for article in articles {
        let published = article
            .published
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let _ = writeln!(
            markdown,
            "- **[{}]({})**",
            escape_link_text(&article.title),
            article.link
        );
        let _ = writeln!(markdown, "  Source: {} | Published: {}", article.source, published);

        // Plain-text summaries may carry line breaks; keep them inside the item.
        let summary = collapse_whitespace(&article.summary);
        if !summary.is_empty() {
            let _ = writeln!(markdown, "  {}", summary);
        }
    }

    if !errors.is_empty() {
        markdown.push_str("\n## Fetch errors\n\n");
        for error in errors {
            let _ = writeln!(
                markdown,
                "- {}: {} ({})",
                error.source,
                error.kind,
                collapse_whitespace(&error.message)
            );
        }
    }

    markdown
}

fn escape_link_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '[' | ']' | '*') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
