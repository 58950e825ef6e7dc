use anyhow::Context;
use clap::{Parser, ValueEnum};
use rss_reader::{FeedManager, FetchConfig, FetchFeedsRequest, RssState};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

/// Fetch recent articles from the feeds configured for a category.
#[derive(Debug, Parser)]
#[command(name = "rss-reader", version)]
struct Cli {
    /// TOML file mapping category names to feed URLs
    #[arg(long, env = "RSS_READER_FEEDS", default_value = "feeds.toml")]
    feeds: PathBuf,

    #[arg(long, default_value = "Example")]
    category: String,

    /// Maximum number of articles returned
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Maximum number of entries taken from each feed
    #[arg(long, default_value_t = 5)]
    per_feed_limit: usize,

    /// Only keep articles published on or after this date (YYYY-MM-DD)
    #[arg(long)]
    since_date: Option<String>,

    #[arg(long, value_enum, default_value = "markdown")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout only carries the digest.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("Starting RSS Reader");

    let feed_manager = FeedManager::load(&cli.feeds)
        .await
        .with_context(|| format!("failed to load feed catalog from {}", cli.feeds.display()))?;

    let state = RssState::new(feed_manager, FetchConfig::from_env());

    let request = FetchFeedsRequest {
        category: cli.category,
        limit: cli.limit,
        per_feed_limit: cli.per_feed_limit,
        since_date: cli.since_date,
    };

    let result = state.fetch_feeds(&request).await;
    state.shutdown();

    let digest = match result {
        Ok(digest) => digest,
        Err(e) => {
            error!("fetch_feeds failed: {}", e);
            return Err(e.into());
        }
    };

    match cli.format {
        OutputFormat::Markdown => println!("{}", digest.markdown),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&digest)?),
    }

    info!("RSS Reader finished");
    Ok(())
}
