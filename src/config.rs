// src/config.rs

//! Configuration loading utilities.
//!
//! This module provides convenience functions for loading the configuration
//! file and the channel lists it refers to, locally or from S3.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, parse_source_list};

#[cfg(feature = "s3")]
pub use s3_loader::LambdaConfigLoader;

/// Load configuration from a TOML file and merge its `sources_file`.
///
/// A missing config file falls back to defaults. A relative `sources_file`
/// is resolved against the config file's directory.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        log::warn!("Config file {path:?} not found, using default configuration");
        Config::default()
    };

    if let Some(file) = config.sources_file.clone() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let sources = load_sources_file(&base.join(file))?;
        log::debug!("Loaded {} source(s) from sources_file", sources.len());
        config.merge_sources(sources);
    }

    Ok(config)
}

/// Load a whitespace/newline separated channel list.
pub fn load_sources_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("Cannot read sources file {}: {e}", path.display()))
    })?;
    Ok(parse_source_list(&text))
}

/// Channel names from the `SOURCES` environment variable, if set.
pub fn sources_from_env() -> Option<Vec<String>> {
    std::env::var("SOURCES")
        .ok()
        .map(|raw| parse_source_list(&raw.replace(',', " ")))
}

/// Apply `CRAWL_TIMEOUT_SECS`, `MAX_CONCURRENT`, `REQUEST_DELAY_MS`,
/// `ITEM_BUDGET` and `MAX_PAGES` from the environment.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

    if let Some(secs) = parsed("CRAWL_TIMEOUT_SECS") {
        config.crawler.timeout_secs = secs;
    }
    if let Some(n) = parsed("MAX_CONCURRENT") {
        config.crawler.max_concurrent = n as usize;
    }
    if let Some(ms) = parsed("REQUEST_DELAY_MS") {
        config.crawler.request_delay_ms = ms;
    }
    if let Some(n) = parsed("ITEM_BUDGET") {
        config.paginator.item_budget = n as usize;
    }
    if let Some(n) = parsed("MAX_PAGES") {
        config.paginator.max_pages = n as usize;
    }
}

#[cfg(feature = "s3")]
mod s3_loader {
    use crate::error::{AppError, Result};
    use crate::models::{Config, parse_source_list};
    use crate::storage::S3Storage;

    /// Config loader for Lambda environment.
    pub struct LambdaConfigLoader {
        storage: S3Storage,
        prefix: String,
    }

    impl LambdaConfigLoader {
        pub fn new(storage: S3Storage, config_prefix: &str) -> Self {
            Self {
                storage,
                prefix: config_prefix.trim_matches('/').to_string(),
            }
        }

        fn key(&self, file_name: &str) -> String {
            if self.prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{}/{}", self.prefix, file_name)
            }
        }

        async fn load_text(&self, file_name: &str) -> Result<Option<String>> {
            let key = self.key(file_name);
            log::info!("Loading config file from S3: {key}");
            match self.storage.read_bytes_optional(&key).await? {
                Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                    AppError::config(format!("Config file {key} is not valid UTF-8: {e}"))
                }),
                None => Ok(None),
            }
        }

        /// Load `config.toml` and its `sources_file`, or None if absent.
        pub async fn load_config(&self) -> Result<Option<Config>> {
            let Some(text) = self.load_text("config.toml").await? else {
                return Ok(None);
            };
            let mut config = Config::from_toml(&text)?;

            if let Some(file) = config.sources_file.clone() {
                let text = self.load_text(&file).await?.ok_or_else(|| {
                    AppError::config(format!("Sources file not found in S3: {}", self.key(&file)))
                })?;
                config.merge_sources(parse_source_list(&text));
            }

            Ok(Some(config))
        }
    }
}
