//! Crawl run summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::WatermarkMap;

/// A source whose crawl failed during a run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_id: String,
    pub error: String,
}

/// Outcome of one crawl invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Sources attempted
    pub sources_total: usize,
    /// Sources that produced at least one new item
    pub sources_with_items: usize,
    /// New items rendered into the feed
    pub items_emitted: usize,
    /// Sources that failed and kept their previous watermark
    pub failures: Vec<SourceFailure>,
    /// Watermarks after the run (equal to the loaded ones if nothing was committed)
    pub watermarks: WatermarkMap,
    /// Rendered feed, present only when a commit happened
    #[serde(skip)]
    pub feed: Option<String>,
    /// Whether the feed and watermarks were persisted
    pub committed: bool,
}

impl CrawlReport {
    /// True if at least one source failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
