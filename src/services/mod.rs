//! Service layer for the feed crawler.
//!
//! This module contains the per-source business logic:
//! - Page transport (`PageFetcher`, `HttpFetcher`)
//! - Page parsing (`PageParser`, `ChannelPageParser`)
//! - Backward pagination (`Paginator`)

mod paginator;
mod parser;
mod transport;

pub use paginator::{PaginatedItems, Paginator, StopReason};
pub use parser::{ChannelPageParser, PageParser};
pub use transport::{HttpFetcher, PageFetcher};
