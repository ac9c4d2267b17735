// src/lambda.rs

//! AWS Lambda handler for the crawler.
//!
//! One handler serves both triggers:
//! 1. The scheduled trigger (any payload without `action`) runs a crawl
//!    against S3 and publishes new items.
//! 2. `{"action": "feed"}` returns the last published feed document.
//!
//! Configuration is read from `config.toml` under `CONFIG_S3_PREFIX`. Without
//! it the defaults are used, with channels taken from the `SOURCES` variable.

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::config::{LambdaConfigLoader, apply_env_overrides, sources_from_env};
use crate::error::{AppError, Result};
use crate::models::{Config, CrawlReport, SourceFailure, StorageConfig};
use crate::pipeline::Crawler;
use crate::storage::{FeedStore, S3Storage};

/// What an invocation should do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Crawl all sources and publish new items
    #[default]
    Update,
    /// Return the last published feed
    Feed,
}

/// Lambda invocation payload.
#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    #[serde(default)]
    pub action: Action,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct CrawlResponse {
    /// Whether the invocation succeeded (per-source failures do not count)
    pub success: bool,

    pub action: Action,

    /// Sources attempted in this crawl
    pub sources_total: usize,

    /// New items published in this crawl
    pub items_emitted: usize,

    /// Whether a new feed was published
    pub committed: bool,

    /// Sources that failed and kept their previous watermark
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SourceFailure>,

    /// Feed document, for the `feed` action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<String>,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl CrawlResponse {
    fn from_report(report: CrawlReport) -> Self {
        Self {
            success: true,
            action: Action::Update,
            sources_total: report.sources_total,
            items_emitted: report.items_emitted,
            committed: report.committed,
            failures: report.failures,
            ..Default::default()
        }
    }

    fn from_feed(feed: String) -> Self {
        Self {
            success: true,
            action: Action::Feed,
            feed: Some(feed),
            ..Default::default()
        }
    }
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<CrawlRequest>,
) -> std::result::Result<CrawlResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();

    info!("Invocation started: action={:?}", request.action);

    match run(request.action).await {
        Ok(mut response) => {
            response.execution_time_ms = start.elapsed().as_millis() as u64;
            info!(
                "Invocation completed: {} new item(s), committed={}, {} failure(s) in {}ms",
                response.items_emitted,
                response.committed,
                response.failures.len(),
                response.execution_time_ms
            );
            Ok(response)
        }
        Err(e) => {
            error!("Invocation failed: {}", e);
            Ok(CrawlResponse {
                success: false,
                action: request.action,
                error: Some(e.to_string()),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}

async fn run(action: Action) -> Result<CrawlResponse> {
    let (config, store) = load_runtime().await?;

    match action {
        Action::Update => {
            config.validate()?;
            let crawler = Crawler::from_config(config, Arc::new(store))?;
            let report = crawler.run_crawl().await?;
            for failure in &report.failures {
                warn!("{}: {}", failure.source_id, failure.error);
            }
            Ok(CrawlResponse::from_report(report))
        }
        Action::Feed => store
            .load_feed()
            .await?
            .map(CrawlResponse::from_feed)
            .ok_or_else(|| AppError::storage("No feed has been published yet")),
    }
}

/// Load configuration and the S3 store it describes.
async fn load_runtime() -> Result<(Arc<Config>, S3Storage)> {
    let base = S3Storage::from_env(&StorageConfig::default()).await?;
    let prefix = std::env::var("CONFIG_S3_PREFIX").unwrap_or_else(|_| "config".to_string());

    let loader = LambdaConfigLoader::new(base.clone(), &prefix);
    let mut config = match loader.load_config().await? {
        Some(config) => config,
        None => {
            info!("No config.toml under '{}', using defaults", prefix);
            Config::default()
        }
    };

    if let Some(sources) = sources_from_env() {
        config.merge_sources(sources);
    }
    apply_env_overrides(&mut config);

    let store = base.with_keys(&config.storage);
    Ok((Arc::new(config), store))
}
