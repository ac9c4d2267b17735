// src/pipeline/feed.rs

//! Feed merging and RSS rendering.
//!
//! Items from all sources are ordered newest first by publication time,
//! across sources, and rendered as one RSS 2.0 document.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::models::{FeedConfig, ItemRecord};

/// RFC 822 timestamp as used by RSS `pubDate` / `lastBuildDate`.
pub fn rss_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Order items newest first by publication time. Ties keep no particular order.
pub fn merge_items(mut items: Vec<ItemRecord>) -> Vec<ItemRecord> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items
}

/// Renders merged items into an RSS document.
pub struct FeedBuilder<'a> {
    config: &'a FeedConfig,
}

impl<'a> FeedBuilder<'a> {
    pub fn new(config: &'a FeedConfig) -> Self {
        Self { config }
    }

    /// Entry title: the first `title_max_chars` characters of the body.
    pub fn entry_title(&self, body: &str) -> String {
        let body = body.trim();
        if body.is_empty() {
            return self.config.untitled.clone();
        }

        let graphemes: Vec<&str> = body.graphemes(true).collect();
        if graphemes.len() <= self.config.title_max_chars {
            return body.to_string();
        }

        let mut title = graphemes[..self.config.title_max_chars].concat();
        title.push_str(&self.config.truncation_marker);
        title
    }

    /// Entry description as HTML: the body plus an inline image for media.
    pub fn entry_description(&self, item: &ItemRecord) -> String {
        let mut html = escape(item.body.as_str()).replace('\n', "<br>");
        if let Some(media) = &item.media_ref {
            html.push_str(&format!("<br><img src=\"{}\">", escape(media.as_str())));
        }
        html
    }

    /// Merge and render the crawl result set.
    pub fn render(&self, items: Vec<ItemRecord>, built_at: DateTime<Utc>) -> Result<String> {
        let items = merge_items(items);
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(
            BytesStart::new("rss").with_attributes([("version", "2.0")]),
        ))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;

        write_text_element(&mut writer, "title", &self.config.title)?;
        write_text_element(&mut writer, "link", &self.config.link)?;
        write_text_element(&mut writer, "description", &self.config.description)?;
        write_text_element(&mut writer, "language", &self.config.language)?;
        write_text_element(&mut writer, "lastBuildDate", &rss_timestamp(&built_at))?;

        for item in &items {
            self.write_item(&mut writer, item)?;
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| AppError::validation(format!("rendered feed is not UTF-8: {e}")))
    }

    fn write_item(&self, writer: &mut Writer<Vec<u8>>, item: &ItemRecord) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("item")))?;

        write_text_element(writer, "title", &self.entry_title(&item.body))?;
        write_text_element(writer, "link", &item.permalink)?;

        writer.write_event(Event::Start(
            BytesStart::new("guid").with_attributes([("isPermaLink", "true")]),
        ))?;
        writer.write_event(Event::Text(BytesText::new(&xml_safe(&item.permalink))))?;
        writer.write_event(Event::End(BytesEnd::new("guid")))?;

        write_text_element(writer, "description", &self.entry_description(item))?;
        write_text_element(writer, "pubDate", &rss_timestamp(&item.published_at))?;
        write_text_element(writer, "category", &item.source_id)?;

        writer.write_event(Event::End(BytesEnd::new("item")))?;
        Ok(())
    }
}

/// Drop characters XML 1.0 does not allow in a document.
fn xml_safe(text: &str) -> Cow<'_, str> {
    fn allowed(c: char) -> bool {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    }

    if text.chars().all(allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&c| allowed(c)).collect())
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&xml_safe(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
