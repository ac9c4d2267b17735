//! Storage abstractions for the feed and its watermark state.
//!
//! Two objects live in the store:
//! - the rendered feed document (`merged.xml` by default)
//! - the watermark snapshot (`db.json` by default)
//!
//! ## Layout
//!
//! ```text
//! {root or bucket/prefix}/
//! ├── merged.xml   # last published feed
//! └── db.json      # {"channel": last_emitted_sequence, ...}
//! ```
//!
//! Both objects are written together by [`FeedStore::commit`]. The feed is
//! always published before the watermark snapshot.

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::WatermarkMap;

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Metadata about a commit.
#[derive(Debug, Clone)]
pub struct CommitMetadata {
    /// Where the feed document was written
    pub feed_location: String,
    /// Where the watermark snapshot was written
    pub state_location: String,
    /// Size of the feed document in bytes
    pub feed_bytes: usize,
    /// Number of sources in the snapshot
    pub source_count: usize,
}

/// Trait for feed/watermark storage backends.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Load the watermark snapshot. A missing snapshot is an empty map;
    /// an unreadable one is an error.
    async fn load_watermarks(&self) -> Result<WatermarkMap>;

    /// Load the last published feed document, if any.
    async fn load_feed(&self) -> Result<Option<String>>;

    /// Persist the feed document and the watermark snapshot as one commit.
    async fn commit(&self, feed: &str, watermarks: &WatermarkMap) -> Result<CommitMetadata>;
}
