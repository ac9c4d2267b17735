// src/services/paginator.rs

//! Backward pagination over one source.
//!
//! Starts at the newest page and walks toward older posts using the oldest
//! unseen sequence as the `before` cursor, until the item budget is met or a
//! page brings nothing new.

use std::time::Duration;

use crate::error::Result;
use crate::models::{ItemRecord, PaginatorConfig};
use crate::services::{PageFetcher, PageParser};

/// Why pagination of a source ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The newest page had nothing above the watermark
    NoNewItems,
    /// At least `item_budget` new items were collected
    BudgetMet,
    /// An older page had nothing new, or the cursor reached the watermark
    SourceExhausted,
    /// `max_pages` pages were fetched
    PageBudget,
}

/// Unseen items of one source, oldest first.
#[derive(Debug, Clone)]
pub struct PaginatedItems {
    pub items: Vec<ItemRecord>,
    pub pages_fetched: usize,
    pub stop: StopReason,
}

impl PaginatedItems {
    /// Highest sequence collected, if any.
    pub fn max_sequence(&self) -> Option<u64> {
        self.items.last().map(|item| item.sequence)
    }
}

/// Walks one source backward from its newest page.
pub struct Paginator<'a> {
    fetcher: &'a dyn PageFetcher,
    parser: &'a dyn PageParser,
    config: &'a PaginatorConfig,
    delay: Duration,
}

impl<'a> Paginator<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        parser: &'a dyn PageParser,
        config: &'a PaginatorConfig,
    ) -> Self {
        Self {
            fetcher,
            parser,
            config,
            delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive pages of the same source.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Collect every item of `source_id` with `sequence > watermark`.
    ///
    /// The budget is a target: the page that crosses it is kept whole. Any
    /// fetch or parse failure aborts the source and discards what was
    /// collected so far.
    pub async fn collect(&self, source_id: &str, watermark: u64) -> Result<PaginatedItems> {
        let mut items = self.fetch_batch(source_id, None, watermark).await?;
        let mut pages_fetched = 1;

        if items.is_empty() {
            log::debug!("{source_id}: nothing above watermark {watermark}");
            return Ok(PaginatedItems {
                items,
                pages_fetched,
                stop: StopReason::NoNewItems,
            });
        }

        let mut cursor = items[0].sequence;
        let stop = loop {
            if items.len() >= self.config.item_budget {
                break StopReason::BudgetMet;
            }
            if pages_fetched >= self.config.max_pages {
                log::warn!(
                    "{source_id}: page budget of {} reached with {} new items",
                    self.config.max_pages,
                    items.len()
                );
                break StopReason::PageBudget;
            }
            // Nothing can sit strictly between the watermark and the cursor.
            if cursor <= watermark.saturating_add(1) {
                break StopReason::SourceExhausted;
            }

            self.pause().await;
            let mut batch = self.fetch_batch(source_id, Some(cursor), watermark).await?;
            pages_fetched += 1;

            let Some(oldest) = batch.first().map(|item| item.sequence) else {
                break StopReason::SourceExhausted;
            };
            log::debug!(
                "{source_id}: page before {cursor} gave {} new items",
                batch.len()
            );

            batch.append(&mut items);
            items = batch;
            cursor = oldest;
        };

        log::debug!(
            "{source_id}: {} new items from {pages_fetched} page(s), stop: {stop:?}",
            items.len()
        );
        Ok(PaginatedItems {
            items,
            pages_fetched,
            stop,
        })
    }

    /// Fetch and parse one page, keeping only unseen items older than the cursor.
    ///
    /// The `sequence < cursor` filter makes inclusive and exclusive `before`
    /// semantics equivalent, so the cursor item is never collected twice.
    async fn fetch_batch(
        &self,
        source_id: &str,
        cursor: Option<u64>,
        watermark: u64,
    ) -> Result<Vec<ItemRecord>> {
        let page = self.fetcher.fetch_page(source_id, cursor).await?;
        let mut batch = self.parser.parse(&page, source_id)?;
        batch.retain(|item| {
            item.sequence > watermark && cursor.is_none_or(|before| item.sequence < before)
        });
        batch.sort_by_key(|item| item.sequence);
        Ok(batch)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
