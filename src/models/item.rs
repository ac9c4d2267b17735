//! Item record data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One post extracted from a source page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemRecord {
    /// Source (channel) the post belongs to
    pub source_id: String,

    /// Native post number; orders and deduplicates posts within one source
    pub sequence: u64,

    /// Plain-text content, possibly empty
    pub body: String,

    /// Attachment locator, if the post carries a renderable one
    pub media_ref: Option<String>,

    /// Publication time, or the observation time when the page had none
    pub published_at: DateTime<Utc>,

    /// Canonical external link to the post
    pub permalink: String,
}

impl ItemRecord {
    /// Build the canonical link for a native post identifier (`source/123`).
    pub fn permalink_for(base_url: &str, native_post: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), native_post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permalink_for() {
        assert_eq!(
            ItemRecord::permalink_for("https://t.me/", "durov/42"),
            "https://t.me/durov/42"
        );
        assert_eq!(
            ItemRecord::permalink_for("https://t.me", "durov/42"),
            "https://t.me/durov/42"
        );
    }
}
