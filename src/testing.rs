//! Test doubles shared by the unit tests.
//!
//! `FakeChannels` serves rendered channel pages from memory and records every
//! request; `MemoryStore` keeps the feed and watermark pair in memory.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::{AppError, Result};
use crate::models::WatermarkMap;
use crate::services::PageFetcher;
use crate::storage::{CommitMetadata, FeedStore};

/// One post as rendered on a channel preview page.
#[derive(Debug, Clone)]
pub struct PostFixture {
    pub id: u64,
    pub text: String,
    pub photo: Option<String>,
}

impl PostFixture {
    pub fn text(id: u64, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            photo: None,
        }
    }

    pub fn with_photo(mut self, url: &str) -> Self {
        self.photo = Some(url.to_string());
        self
    }

    /// Publication time rendered for a post: one minute per id after a fixed epoch.
    pub fn time_for(id: u64) -> DateTime<Utc> {
        let epoch = Utc
            .with_ymd_and_hms(2024, 5, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        epoch + Duration::minutes(id as i64)
    }
}

/// Render posts the way the public channel preview does.
pub fn render_page(source: &str, posts: &[PostFixture]) -> String {
    let mut html = String::from("<html><body><section class=\"tgme_channel_history\">");
    for post in posts {
        let photo = post
            .photo
            .as_ref()
            .map(|url| {
                format!(
                    "<a class=\"tgme_widget_message_photo_wrap\" href=\"https://t.me/{source}/{id}\" \
                     style=\"width:800px;background-image:url('{url}')\"></a>",
                    id = post.id
                )
            })
            .unwrap_or_default();

        html.push_str(&format!(
            "<div class=\"tgme_widget_message_wrap\">\
             <div class=\"tgme_widget_message js-widget_message\" data-post=\"{source}/{id}\">\
             {photo}\
             <div class=\"tgme_widget_message_text js-message_text\">{text}</div>\
             <div class=\"tgme_widget_message_footer\">\
             <a class=\"tgme_widget_message_date\" href=\"https://t.me/{source}/{id}\">\
             <time datetime=\"{time}\" class=\"time\">00:00</time></a>\
             </div></div></div>",
            id = post.id,
            text = post.text,
            time = PostFixture::time_for(post.id).to_rfc3339(),
        ));
    }
    html.push_str("</section></body></html>");
    html
}

#[derive(Debug, Clone)]
struct FakeChannel {
    posts: Vec<u64>,
    page_size: usize,
    inclusive: bool,
    raw: Option<String>,
    fail_after: Option<usize>,
}

impl FakeChannel {
    fn page(&self, cursor: Option<u64>) -> Vec<u64> {
        let visible: Vec<u64> = self
            .posts
            .iter()
            .copied()
            .filter(|id| match cursor {
                None => true,
                Some(before) if self.inclusive => *id <= before,
                Some(before) => *id < before,
            })
            .collect();
        let start = visible.len().saturating_sub(self.page_size);
        visible[start..].to_vec()
    }
}

/// In-memory channel pages with a request log.
#[derive(Debug, Default)]
pub struct FakeChannels {
    channels: Mutex<HashMap<String, FakeChannel>>,
    calls: Mutex<Vec<(String, Option<u64>)>>,
    latency: StdDuration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose `before` cursor excludes the cursor post.
    pub fn with_channel(self, name: &str, ids: RangeInclusive<u64>, page_size: usize) -> Self {
        self.insert(name, ids, page_size, false)
    }

    /// A channel whose `before` cursor includes the cursor post.
    pub fn with_inclusive_channel(
        self,
        name: &str,
        ids: RangeInclusive<u64>,
        page_size: usize,
    ) -> Self {
        self.insert(name, ids, page_size, true)
    }

    /// A channel that always serves the given markup.
    pub fn with_raw_page(self, name: &str, page: &str) -> Self {
        self.lock_channels().insert(
            name.to_string(),
            FakeChannel {
                posts: Vec::new(),
                page_size: 0,
                inclusive: false,
                raw: Some(page.to_string()),
                fail_after: None,
            },
        );
        self
    }

    /// Fail every request to `name` after `successes` successful ones.
    pub fn failing_after(self, name: &str, successes: usize) -> Self {
        if let Some(channel) = self.lock_channels().get_mut(name) {
            channel.fail_after = Some(successes);
        }
        self
    }

    /// Append newly published posts to a channel.
    pub fn publish(&self, name: &str, ids: RangeInclusive<u64>) {
        if let Some(channel) = self.lock_channels().get_mut(name) {
            channel.posts.extend(ids);
        }
    }

    /// Hold every request open for `latency` before answering.
    pub fn with_latency(mut self, latency: StdDuration) -> Self {
        self.latency = latency;
        self
    }

    /// Highest number of requests that were open at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Every request made so far, in order.
    pub fn calls(&self) -> Vec<(String, Option<u64>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn insert(self, name: &str, ids: RangeInclusive<u64>, page_size: usize, inclusive: bool) -> Self {
        self.lock_channels().insert(
            name.to_string(),
            FakeChannel {
                posts: ids.collect(),
                page_size,
                inclusive,
                raw: None,
                fail_after: None,
            },
        );
        self
    }

    fn lock_channels(&self) -> std::sync::MutexGuard<'_, HashMap<String, FakeChannel>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PageFetcher for FakeChannels {
    async fn fetch_page(&self, source_id: &str, cursor: Option<u64>) -> Result<String> {
        let previous = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            let previous = calls.iter().filter(|(s, _)| s == source_id).count();
            calls.push((source_id.to_string(), cursor));
            previous
        };

        let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(open, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let channel = self
            .lock_channels()
            .get(source_id)
            .cloned()
            .ok_or_else(|| AppError::fetch(source_id, "HTTP 404 Not Found"))?;

        if channel.fail_after.is_some_and(|limit| previous >= limit) {
            return Err(AppError::fetch(source_id, "HTTP 502 Bad Gateway"));
        }
        if let Some(raw) = channel.raw {
            return Ok(raw);
        }

        let posts: Vec<PostFixture> = channel
            .page(cursor)
            .into_iter()
            .map(|id| PostFixture::text(id, &format!("post {id} of {source_id}")))
            .collect();
        Ok(render_page(source_id, &posts))
    }
}

/// Feed store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    feed: Mutex<Option<String>>,
    state: Mutex<Option<WatermarkMap>>,
    commits: AtomicUsize,
    fail_load: bool,
    fail_commit: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watermarks(watermarks: WatermarkMap) -> Self {
        let store = Self::default();
        *store.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(watermarks);
        store
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn feed(&self) -> Option<String> {
        self.feed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn watermarks(&self) -> Option<WatermarkMap> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn load_watermarks(&self) -> Result<WatermarkMap> {
        if self.fail_load {
            return Err(AppError::storage("db.json: corrupt watermark snapshot"));
        }
        Ok(self.watermarks().unwrap_or_default())
    }

    async fn load_feed(&self) -> Result<Option<String>> {
        Ok(self.feed())
    }

    async fn commit(&self, feed: &str, watermarks: &WatermarkMap) -> Result<CommitMetadata> {
        if self.fail_commit {
            return Err(AppError::storage("bucket unavailable"));
        }
        *self.feed.lock().unwrap_or_else(|e| e.into_inner()) = Some(feed.to_string());
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(watermarks.clone());
        self.commits.fetch_add(1, Ordering::SeqCst);

        Ok(CommitMetadata {
            feed_location: "memory://merged.xml".to_string(),
            state_location: "memory://db.json".to_string(),
            feed_bytes: feed.len(),
            source_count: watermarks.len(),
        })
    }
}
