use crate::types::{RawEntry, Source};
use feed_rs::model::Entry;
use feed_rs::parser::{self, ParseFeedError};
use tracing::debug;

/// Turns a fetched RSS/Atom/JSON feed document into raw entries.
pub struct FeedParser;

impl FeedParser {
    /// Parse `content` and keep the first `limit` entries in document order.
    pub fn parse_entries(
        content: &[u8],
        source: &Source,
        limit: usize,
    ) -> std::result::Result<Vec<RawEntry>, ParseFeedError> {
        debug!("Parsing feed content from {} ({} bytes)", source.url, content.len());

        let feed = parser::parse(content)?;
        let total = feed.entries.len();

        let entries: Vec<RawEntry> = feed
            .entries
            .into_iter()
            .take(limit)
            .map(|entry| Self::raw_entry(entry, &source.url))
            .collect();

        debug!("Kept {}/{} entries from {}", entries.len(), total, source.url);
        Ok(entries)
    }

    fn raw_entry(entry: Entry, source_url: &str) -> RawEntry {
        let title = entry.title.map(|t| t.content).and_then(non_blank);

        // Atom feeds may carry several links; the alternate one is the article.
        let link = entry
            .links
            .iter()
            .find(|link| link.rel.as_deref() == Some("alternate"))
            .or_else(|| entry.links.first())
            .map(|link| link.href.clone())
            .and_then(non_blank);

        // Prefer the summary, fall back to the full content body
        let summary = entry
            .summary
            .map(|s| s.content)
            .and_then(non_blank)
            .or_else(|| entry.content.and_then(|c| c.body).and_then(non_blank));

        let published = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.to_rfc3339());

        RawEntry {
            title,
            link,
            summary,
            published,
            source: source_url.to_string(),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}
