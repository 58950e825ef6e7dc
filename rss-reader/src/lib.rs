pub mod types;
pub mod rss_utils;
pub mod parser;
pub mod pool;
pub mod traits;
pub mod fetcher;
pub mod aggregator;
pub mod digest;
pub mod feed_manager;
pub mod state;

pub use types::*;
pub use traits::FeedFetcher;
pub use parser::FeedParser;
pub use pool::ConnectionPool;
pub use fetcher::Fetcher;
pub use aggregator::FeedAggregator;
pub use digest::DigestAssembler;
pub use feed_manager::FeedManager;
pub use state::RssState;
