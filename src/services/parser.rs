// src/services/parser.rs

//! Channel page parser.
//!
//! Turns the markup of a public channel preview page into item records,
//! ordered oldest to newest.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ItemRecord;
use crate::utils::{extract_css_url, resolve_url};

/// Transform from raw page markup to item records.
pub trait PageParser: Send + Sync {
    /// Parse a page of `source_id`. Records come back in ascending `sequence`.
    fn parse(&self, page: &str, source_id: &str) -> Result<Vec<ItemRecord>>;
}

const MESSAGE: &str = ".tgme_widget_message";
const TEXT: &str = ".tgme_widget_message_text";
const MEDIA: &str = "a.tgme_widget_message_photo_wrap, a.tgme_widget_message_video_player";
const TIME: &str = "time[datetime]";
const STICKER: &str = ".tgme_widget_message_sticker, .tgme_widget_message_sticker_wrap";

const STICKER_CLASS: &str = "tgme_widget_message_sticker";
const REPLY_TEXT_CLASS: &str = "js-message_reply_text";

/// Parser for `tgme_widget_message` channel preview markup.
pub struct ChannelPageParser {
    base_url: Url,
    message: Selector,
    text: Selector,
    media: Selector,
    time: Selector,
    sticker: Selector,
}

impl ChannelPageParser {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            message: parse_selector(MESSAGE)?,
            text: parse_selector(TEXT)?,
            media: parse_selector(MEDIA)?,
            time: parse_selector(TIME)?,
            sticker: parse_selector(STICKER)?,
        })
    }

    /// Parse with an explicit observation time for posts lacking a timestamp.
    pub fn parse_at(
        &self,
        page: &str,
        source_id: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<Vec<ItemRecord>> {
        let document = Html::parse_document(page);
        let mut items = Vec::new();

        for message in document.select(&self.message) {
            if self.is_sticker(&message) {
                log::debug!("{source_id}: skipping sticker entry");
                continue;
            }
            let Some(native_post) = message.value().attr("data-post") else {
                log::debug!("{source_id}: skipping entry without data-post");
                continue;
            };
            items.push(self.parse_message(&message, native_post, source_id, observed_at)?);
        }

        items.sort_by_key(|item| item.sequence);
        items.dedup_by_key(|item| item.sequence);
        Ok(items)
    }

    fn parse_message(
        &self,
        message: &ElementRef,
        native_post: &str,
        source_id: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<ItemRecord> {
        let sequence = native_post
            .rsplit('/')
            .next()
            .and_then(|id| id.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                AppError::parse(source_id, format!("unreadable post id '{native_post}'"))
            })?;

        let body = message
            .select(&self.text)
            .find(|el| !el.value().classes().any(|c| c == REPLY_TEXT_CLASS))
            .map(|el| element_text(&el))
            .unwrap_or_default();

        let media_ref = message.select(&self.media).next().and_then(|el| {
            el.value()
                .attr("style")
                .and_then(extract_css_url)
                .or_else(|| el.value().attr("href").map(str::to_string))
                .map(|href| resolve_url(&self.base_url, &href))
        });

        let published_at = message
            .select(&self.time)
            .next()
            .and_then(|el| el.value().attr("datetime"))
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(observed_at);

        Ok(ItemRecord {
            source_id: source_id.to_string(),
            sequence,
            body,
            media_ref,
            published_at,
            permalink: ItemRecord::permalink_for(self.base_url.as_str(), native_post),
        })
    }

    fn is_sticker(&self, message: &ElementRef) -> bool {
        message.value().classes().any(|c| c == STICKER_CLASS)
            || message.select(&self.sticker).next().is_some()
    }
}

impl PageParser for ChannelPageParser {
    fn parse(&self, page: &str, source_id: &str) -> Result<Vec<ItemRecord>> {
        self.parse_at(page, source_id, Utc::now())
    }
}

/// Visible text of an element, with `<br>` kept as line breaks.
fn element_text(element: &ElementRef) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(&t.text),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {}
        }
    }
    text.trim().to_string()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
