//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Channel names to crawl
    #[serde(default)]
    pub sources: Vec<String>,

    /// Optional newline-separated channel list merged into `sources`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_file: Option<String>,

    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Per-source pagination limits
    #[serde(default)]
    pub paginator: PaginatorConfig,

    /// Output feed settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Object store layout
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Append sources from a channel list, keeping first-seen order.
    pub fn merge_sources(&mut self, extra: impl IntoIterator<Item = String>) {
        self.sources.extend(extra);
        self.sources = dedup_sources(std::mem::take(&mut self.sources));
    }

    /// The configured sources, trimmed and deduplicated.
    pub fn source_ids(&self) -> Vec<String> {
        dedup_sources(self.sources.clone())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        url::Url::parse(&self.crawler.base_url).map_err(|e| {
            AppError::validation(format!(
                "crawler.base_url '{}' is invalid: {e}",
                self.crawler.base_url
            ))
        })?;
        if self.paginator.item_budget == 0 {
            return Err(AppError::validation("paginator.item_budget must be > 0"));
        }
        if self.paginator.max_pages == 0 {
            return Err(AppError::validation("paginator.max_pages must be > 0"));
        }
        if self.feed.title_max_chars == 0 {
            return Err(AppError::validation("feed.title_max_chars must be > 0"));
        }
        if self.storage.feed_key.trim().is_empty() || self.storage.state_key.trim().is_empty() {
            return Err(AppError::validation("storage keys must not be empty"));
        }
        if self.storage.feed_key == self.storage.state_key {
            return Err(AppError::validation(
                "storage.feed_key and storage.state_key must differ",
            ));
        }
        if self.source_ids().is_empty() {
            return Err(AppError::validation("No sources defined"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            sources_file: None,
            crawler: CrawlerConfig::default(),
            paginator: PaginatorConfig::default(),
            feed: FeedConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Parse a channel list: whitespace or newline separated, `#` starts a comment.
pub fn parse_source_list(text: &str) -> Vec<String> {
    let names = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(str::split_whitespace)
        .map(str::to_string);
    dedup_sources(names)
}

fn dedup_sources(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().trim_start_matches('@').to_string())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Origin serving the channel preview pages
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between page requests of one source in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum sources crawled at the same time
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Pagination limits applied to every source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatorConfig {
    /// Target number of new items per source and run (may be overshot by one page)
    #[serde(default = "defaults::item_budget")]
    pub item_budget: usize,

    /// Maximum pages fetched per source and run, newest page included
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            item_budget: defaults::item_budget(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// Output feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "defaults::feed_title")]
    pub title: String,

    #[serde(default = "defaults::feed_link")]
    pub link: String,

    #[serde(default = "defaults::feed_description")]
    pub description: String,

    #[serde(default = "defaults::feed_language")]
    pub language: String,

    /// Characters of the body kept in an entry title
    #[serde(default = "defaults::title_max_chars")]
    pub title_max_chars: usize,

    /// Appended to a title that was cut
    #[serde(default = "defaults::truncation_marker")]
    pub truncation_marker: String,

    /// Title used for posts without text
    #[serde(default = "defaults::untitled")]
    pub untitled: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: defaults::feed_title(),
            link: defaults::feed_link(),
            description: defaults::feed_description(),
            language: defaults::feed_language(),
            title_max_chars: defaults::title_max_chars(),
            truncation_marker: defaults::truncation_marker(),
            untitled: defaults::untitled(),
        }
    }
}

/// Object store layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the local backend
    #[serde(default = "defaults::storage_root")]
    pub root: String,

    /// Key of the rendered feed document
    #[serde(default = "defaults::feed_key")]
    pub feed_key: String,

    /// Key of the watermark snapshot
    #[serde(default = "defaults::state_key")]
    pub state_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: defaults::storage_root(),
            feed_key: defaults::feed_key(),
            state_key: defaults::state_key(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn base_url() -> String {
        "https://t.me".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        250
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Paginator defaults
    pub fn item_budget() -> usize {
        50
    }
    pub fn max_pages() -> usize {
        20
    }

    // Feed defaults
    pub fn feed_title() -> String {
        "Merged channel feed".into()
    }
    pub fn feed_link() -> String {
        "https://t.me".into()
    }
    pub fn feed_description() -> String {
        "New posts merged from all configured channels".into()
    }
    pub fn feed_language() -> String {
        "en".into()
    }
    pub fn title_max_chars() -> usize {
        60
    }
    pub fn truncation_marker() -> String {
        "…".into()
    }
    pub fn untitled() -> String {
        "Untitled".into()
    }

    // Storage defaults
    pub fn storage_root() -> String {
        "storage".into()
    }
    pub fn feed_key() -> String {
        "merged.xml".into()
    }
    pub fn state_key() -> String {
        "db.json".into()
    }
}
