use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// A feed address together with the category it was configured under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub category: String,
}

impl Source {
    pub fn new(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
        }
    }
}

/// One entry as it came out of a feed document, before any normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Network,
    Timeout,
    HttpStatus,
    ParseError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
            FailureKind::HttpStatus => "http-status",
            FailureKind::ParseError => "parse-error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub source: String,
    pub message: String,
}

impl FailureRecord {
    pub fn new(kind: FailureKind, source: &Source, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.url.clone(),
            message: message.into(),
        }
    }

    pub fn timeout(source: &Source, after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            source,
            format!("no response within {:?}", after),
        )
    }
}

/// Result of one fetch attempt against one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(Vec<RawEntry>),
    Failed(FailureRecord),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Fetched(_))
    }
}

/// Outcomes of one aggregation, one per requested source, in request order.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub outcomes: Vec<(Source, FetchOutcome)>,
    pub succeeded: usize,
    pub failed: usize,
}

impl AggregateResult {
    pub fn from_outcomes(outcomes: Vec<(Source, FetchOutcome)>) -> Self {
        let succeeded = outcomes.iter().filter(|(_, o)| o.is_success()).count();
        let failed = outcomes.len() - succeeded;
        Self {
            outcomes,
            succeeded,
            failed,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.outcomes.iter().filter_map(|(_, outcome)| match outcome {
            FetchOutcome::Failed(record) => Some(record),
            FetchOutcome::Fetched(_) => None,
        })
    }
}

/// Structured and rendered output of one `fetch_feeds` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedDigest {
    pub markdown: String,
    pub articles: Vec<Article>,
    #[serde(default)]
    pub errors: Vec<FailureRecord>,
}

fn default_category() -> String {
    "Example".to_string()
}

fn default_limit() -> usize {
    20
}

fn default_per_feed_limit() -> usize {
    5
}

/// Arguments of the exposed `fetch_feeds` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFeedsRequest {
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_per_feed_limit")]
    pub per_feed_limit: usize,
    /// `YYYY-MM-DD`; defaults to seven days ago.
    #[serde(default)]
    pub since_date: Option<String>,
}

impl Default for FetchFeedsRequest {
    fn default() -> Self {
        Self {
            category: default_category(),
            limit: default_limit(),
            per_feed_limit: default_per_feed_limit(),
            since_date: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub connect_timeout_seconds: u64,
    pub fetch_timeout_seconds: u64,
    pub overall_timeout_seconds: u64,
    pub max_connections: usize,
    pub max_connections_per_host: usize,
    pub max_redirects: usize,
    pub use_system_proxy: bool,
    pub summary_max_chars: usize,
    pub default_lookback_days: i64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "RSS-Reader/1.0".to_string(),
            connect_timeout_seconds: 10,
            fetch_timeout_seconds: 10,
            overall_timeout_seconds: 30,
            max_connections: 10,
            max_connections_per_host: 3,
            max_redirects: 5,
            use_system_proxy: true,
            summary_max_chars: 250,
            default_lookback_days: 7,
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `RSS_READER_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(user_agent) = std::env::var("RSS_READER_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(secs) = env_number("RSS_READER_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout_seconds = cap_timeout("RSS_READER_FETCH_TIMEOUT_SECS", secs);
        }
        if let Some(secs) = env_number("RSS_READER_OVERALL_TIMEOUT_SECS") {
            config.overall_timeout_seconds = cap_timeout("RSS_READER_OVERALL_TIMEOUT_SECS", secs);
        }
        if let Some(max) = env_number("RSS_READER_MAX_CONNECTIONS") {
            config.max_connections = max;
        }
        if let Some(max) = env_number("RSS_READER_MAX_CONNECTIONS_PER_HOST") {
            config.max_connections_per_host = max;
        }

        config
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Longest timeout accepted from the environment.
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

fn cap_timeout(key: &str, secs: u64) -> u64 {
    if secs > MAX_TIMEOUT_SECS {
        warn!("Capping {} at {} seconds (got {})", key, MAX_TIMEOUT_SECS, secs);
        MAX_TIMEOUT_SECS
    } else {
        secs
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}: {:?} is not a valid number", key, raw);
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("Parameter 'since_date' must be in YYYY-mm-dd format, got {0:?}")]
    InvalidSinceDate(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
