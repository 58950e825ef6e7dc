use crate::rss_utils::url::is_valid_rss_url;
use crate::types::{Result, Source};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// In-memory catalog mapping category names to their feed URLs.
///
/// Loaded once from a TOML document such as
///
/// ```toml
/// Example = ["https://blog.rust-lang.org/feed.xml"]
/// News = ["https://feeds.bbci.co.uk/news/rss.xml", "https://feeds.npr.org/1001/rss.xml"]
/// ```
#[derive(Debug, Clone, Default)]
pub struct FeedManager {
    categories: BTreeMap<String, Vec<String>>,
}

impl FeedManager {
    pub fn new(categories: BTreeMap<String, Vec<String>>) -> Self {
        let categories = categories
            .into_iter()
            .map(|(name, urls)| {
                let urls = dedup_urls(&name, urls);
                (name, urls)
            })
            .collect();
        Self { categories }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let categories: BTreeMap<String, Vec<String>> = toml::from_str(content)?;
        Ok(Self::new(categories))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let manager = Self::from_toml_str(&content)?;

        info!(
            "Loaded {} feed categories from {}",
            manager.categories.len(),
            path.display()
        );
        Ok(manager)
    }

    /// Sources for `category`, in configured order. Unknown categories have none.
    pub fn sources_for(&self, category: &str) -> Vec<Source> {
        self.categories
            .get(category)
            .map(|urls| urls.iter().map(|url| Source::new(url.clone(), category)).collect())
            .unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }
}

fn dedup_urls(category: &str, urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| {
            if !is_valid_rss_url(url) {
                warn!("Category '{}' lists a non-HTTP feed URL: {}", category, url);
            }
            seen.insert(url.clone())
        })
        .collect()
}
