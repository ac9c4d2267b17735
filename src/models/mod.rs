// src/models/mod.rs

//! Domain models for the feed crawler.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod item;
mod report;
mod watermark;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, FeedConfig, PaginatorConfig, StorageConfig, parse_source_list,
};
pub use item::ItemRecord;
pub use report::{CrawlReport, SourceFailure};
pub use watermark::WatermarkMap;
