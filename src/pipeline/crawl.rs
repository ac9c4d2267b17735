// src/pipeline/crawl.rs

//! Crawl orchestration.
//!
//! One invocation loads the watermark snapshot, paginates every source with
//! bounded concurrency, folds the per-source results together on a single
//! task, and commits the rendered feed with the advanced watermarks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Config, CrawlReport, ItemRecord, SourceFailure};
use crate::pipeline::FeedBuilder;
use crate::services::{ChannelPageParser, HttpFetcher, PageFetcher, PageParser, Paginator};
use crate::storage::FeedStore;

/// Runs crawl invocations over the configured sources.
pub struct Crawler {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn PageParser>,
    store: Arc<dyn FeedStore>,
}

impl Crawler {
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn PageParser>,
        store: Arc<dyn FeedStore>,
    ) -> Self {
        Self {
            config,
            fetcher,
            parser,
            store,
        }
    }

    /// Build a crawler with the HTTP transport and channel page parser.
    pub fn from_config(config: Arc<Config>, store: Arc<dyn FeedStore>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler)?);
        let parser = Arc::new(ChannelPageParser::new(&config.crawler.base_url)?);
        Ok(Self::new(config, fetcher, parser, store))
    }

    /// The last published feed document, if any.
    pub async fn last_feed(&self) -> Result<Option<String>> {
        self.store.load_feed().await
    }

    /// Run one crawl invocation.
    ///
    /// Per-source failures are reported in the returned [`CrawlReport`] and
    /// leave that source's watermark untouched. An unreadable watermark
    /// snapshot or a failed commit is returned as an error; in both cases the
    /// stored feed and watermarks are unchanged.
    pub async fn run_crawl(&self) -> Result<CrawlReport> {
        let started_at = Utc::now();
        let sources = self.config.source_ids();
        let baseline = self.store.load_watermarks().await?;

        log::info!(
            "Crawling {} source(s) with up to {} in parallel",
            sources.len(),
            self.config.crawler.max_concurrent.max(1)
        );

        let paginator = Paginator::new(
            self.fetcher.as_ref(),
            self.parser.as_ref(),
            &self.config.paginator,
        )
        .with_delay(Duration::from_millis(self.config.crawler.request_delay_ms));

        let outcomes: Vec<_> = stream::iter(&sources)
            .map(|source| {
                let paginator = &paginator;
                let watermark = baseline.get(source);
                async move { (source, paginator.collect(source, watermark).await) }
            })
            .buffered(self.config.crawler.max_concurrent.max(1))
            .collect()
            .await;

        let mut staged = baseline.clone();
        let mut result_set: Vec<ItemRecord> = Vec::new();
        let mut failures = Vec::new();
        let mut sources_with_items = 0;

        for (source, outcome) in outcomes {
            match outcome {
                Ok(page) => match page.max_sequence() {
                    Some(max) => {
                        log::info!(
                            "{source}: {} new item(s) from {} page(s), watermark {} -> {max} ({:?})",
                            page.items.len(),
                            page.pages_fetched,
                            baseline.get(source),
                            page.stop
                        );
                        staged.advance(source, max);
                        sources_with_items += 1;
                        result_set.extend(page.items);
                    }
                    None => log::debug!("{source}: no new items"),
                },
                Err(error) => {
                    if error.is_source_local() {
                        log::warn!("{source}: crawl failed: {error}");
                    } else {
                        log::error!("{source}: crawl failed: {error}");
                    }
                    failures.push(SourceFailure {
                        source_id: source.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }

        let items_emitted = result_set.len();
        let (feed, watermarks, committed) = if result_set.is_empty() {
            log::info!("No new items; keeping the previously published feed");
            (None, baseline, false)
        } else {
            let feed = FeedBuilder::new(&self.config.feed).render(result_set, Utc::now())?;
            let meta = self.store.commit(&feed, &staged).await?;
            log::info!(
                "Published {items_emitted} item(s) to {} ({} bytes), watermarks in {}",
                meta.feed_location,
                meta.feed_bytes,
                meta.state_location
            );
            (Some(feed), staged, true)
        };

        Ok(CrawlReport {
            started_at,
            finished_at: Utc::now(),
            sources_total: sources.len(),
            sources_with_items,
            items_emitted,
            failures,
            watermarks,
            feed,
            committed,
        })
    }
}
