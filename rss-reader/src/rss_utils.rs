//! Feed-specific helpers: date normalization, text cleanup and URL keys

/// URL utilities for RSS feeds
pub mod url {
    use url::Url;

    /// Key used to group connections to the same server.
    ///
    /// Falls back to the raw string for unparseable URLs so that every source
    /// still lands in exactly one bucket.
    pub fn host_key(url_str: &str) -> String {
        match Url::parse(url_str) {
            Ok(url) => match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host.to_lowercase(), port),
                (Some(host), None) => host.to_lowercase(),
                (None, _) => url_str.to_string(),
            },
            Err(_) => url_str.to_string(),
        }
    }

    /// Validate RSS feed URL format
    pub fn is_valid_rss_url(url_str: &str) -> bool {
        if let Ok(url) = Url::parse(url_str) {
            url.scheme() == "http" || url.scheme() == "https"
        } else {
            false
        }
    }
}

/// Date parsing for the many timestamp styles found in the wild
pub mod time {
    use crate::types::{AggregatorError, Result};
    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

    #[derive(Debug, Clone, Copy)]
    enum DateMatcher {
        /// `Mon, 02 Jan 2006 15:04:05 -0700`, obsolete zone names included
        Rfc2822,
        /// RFC 2822 shape ending in a `UTC` or `Z` zone name
        Rfc2822UtcName,
        /// `2006-01-02T15:04:05Z`, `2006-01-02T15:04:05.123+02:00`
        Rfc3339,
        WithOffset(&'static str),
        Naive(&'static str),
        DateOnly(&'static str),
    }

    /// Tried top to bottom; the first match wins.
    const DATE_MATCHERS: &[DateMatcher] = &[
        DateMatcher::Rfc2822,
        DateMatcher::Rfc2822UtcName,
        DateMatcher::Rfc3339,
        DateMatcher::WithOffset("%Y-%m-%dT%H:%M:%S%z"),
        DateMatcher::WithOffset("%Y-%m-%d %H:%M:%S%z"),
        DateMatcher::Naive("%Y-%m-%d %H:%M:%S"),
        DateMatcher::Naive("%Y-%m-%dT%H:%M:%S"),
        DateMatcher::DateOnly("%Y-%m-%d"),
    ];

    impl DateMatcher {
        fn parse(self, raw: &str) -> Option<DateTime<Utc>> {
            match self {
                DateMatcher::Rfc2822 => DateTime::parse_from_rfc2822(raw)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
                DateMatcher::Rfc2822UtcName => {
                    let stripped = raw
                        .strip_suffix(" UTC")
                        .or_else(|| raw.strip_suffix(" Z"))?;
                    DateTime::parse_from_rfc2822(&format!("{} +0000", stripped))
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc))
                }
                DateMatcher::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
                DateMatcher::WithOffset(format) => DateTime::parse_from_str(raw, format)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
                DateMatcher::Naive(format) => NaiveDateTime::parse_from_str(raw, format)
                    .ok()
                    .map(|naive| naive.and_utc()),
                DateMatcher::DateOnly(format) => NaiveDate::parse_from_str(raw, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc()),
            }
        }
    }

    /// Parse a feed timestamp into UTC. `None` means the date is unknown.
    pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        DATE_MATCHERS.iter().find_map(|matcher| matcher.parse(raw))
    }

    /// Strict `YYYY-MM-DD` parser for caller-supplied cutoffs.
    pub fn parse_since_date(raw: &str) -> Result<DateTime<Utc>> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| AggregatorError::InvalidSinceDate(raw.to_string()))
    }

    pub fn default_since(now: DateTime<Utc>, lookback_days: i64) -> DateTime<Utc> {
        now - Duration::days(lookback_days)
    }
}

/// Plain-text extraction from feed markup
pub mod text {
    use scraper::Html;

    pub const ELLIPSIS: char = '…';

    /// Elements whose text never reaches the reader.
    const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "iframe", "noscript"];

    /// Elements that separate words when flattened.
    const BLOCK_ELEMENTS: &[&str] = &[
        "p", "br", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
        "tr", "td", "th", "pre", "hr",
    ];

    /// Strip markup, decode entities, collapse whitespace and cap the length
    /// at `max_len` characters.
    pub fn clean(raw: &str, max_len: usize) -> String {
        if raw.is_empty() {
            return String::new();
        }

        // Nothing to extract: keep the text byte for byte.
        if !raw.contains('<') && !raw.contains('&') {
            return truncate(raw, max_len);
        }

        truncate(&extract_text_from_html(raw), max_len)
    }

    /// Extract clean text content from HTML
    pub fn extract_text_from_html(html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let mut text = String::new();

        for node in fragment.root_element().descendants() {
            if let Some(text_node) = node.value().as_text() {
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
                });
                if !hidden {
                    text.push_str(text_node);
                }
            } else if let Some(element) = node.value().as_element() {
                if BLOCK_ELEMENTS.contains(&element.name()) {
                    text.push(' ');
                }
            }
        }

        collapse_whitespace(&text)
    }

    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Cut to at most `max_len` characters, ending in an ellipsis when
    /// anything was removed.
    pub fn truncate(text: &str, max_len: usize) -> String {
        if text.chars().count() <= max_len {
            return text.to_string();
        }
        if max_len == 0 {
            return String::new();
        }

        let kept: String = text.chars().take(max_len - 1).collect();
        let mut truncated = kept.trim_end().to_string();
        truncated.push(ELLIPSIS);
        truncated
    }
}
