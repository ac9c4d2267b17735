//! Pipeline entry points.
//!
//! - `Crawler::run_crawl`: crawl every source and publish new items
//! - `FeedBuilder::render`: merge items into one RSS document

pub mod crawl;
pub mod feed;

pub use crawl::Crawler;
pub use feed::{FeedBuilder, merge_items, rss_timestamp};
