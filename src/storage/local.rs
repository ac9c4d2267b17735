//! Local filesystem storage implementation.
//!
//! Used by the CLI and for development. Production deployments use
//! `S3Storage`.
//!
//! ## Commit protocol
//!
//! 1. Stage both objects as `{key}.tmp` files. A failure here removes the
//!    staged files and leaves the published pair untouched.
//! 2. Rename the feed into place.
//! 3. Rename the watermark snapshot into place.
//!
//! A crash between 2 and 3 leaves the watermark behind the feed, so the next
//! run re-reads those items instead of losing them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{StorageConfig, WatermarkMap};
use crate::storage::{CommitMetadata, FeedStore};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    feed_key: String,
    state_key: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory, with default keys.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_keys(root_dir, &StorageConfig::default())
    }

    /// Create a LocalStorage using the keys of a storage config.
    pub fn with_keys(root_dir: impl Into<PathBuf>, config: &StorageConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            feed_key: config.feed_key.clone(),
            state_key: config.state_key.clone(),
        }
    }

    /// Create a LocalStorage from a storage config, rooted at `config.root`.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::with_keys(&config.root, config)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn staging_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!("{name}.tmp"))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes next to the key's final path and return the staged path.
    async fn stage_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = Self::staging_path(&path);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        Ok(tmp)
    }

    /// Write bytes atomically (write to temp, then rename).
    #[cfg(test)]
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let tmp = self.stage_bytes(key, bytes).await?;
        tokio::fs::rename(&tmp, self.path(key)).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn discard(paths: &[&Path]) {
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                log::debug!("Could not remove staged file {}: {}", path.display(), e);
            }
        }
    }
}

#[async_trait]
impl FeedStore for LocalStorage {
    async fn load_watermarks(&self) -> Result<WatermarkMap> {
        match self.read_json::<WatermarkMap>(&self.state_key).await? {
            Some(map) => Ok(map),
            None => {
                log::info!("No {} found, starting from empty watermarks", self.state_key);
                Ok(WatermarkMap::new())
            }
        }
    }

    async fn load_feed(&self) -> Result<Option<String>> {
        match self.read_bytes(&self.feed_key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| AppError::storage(format!("{} is not UTF-8: {e}", self.feed_key))),
            None => Ok(None),
        }
    }

    async fn commit(&self, feed: &str, watermarks: &WatermarkMap) -> Result<CommitMetadata> {
        let state = serde_json::to_vec_pretty(watermarks)?;
        let feed_path = self.path(&self.feed_key);
        let state_path = self.path(&self.state_key);

        let feed_tmp = self.stage_bytes(&self.feed_key, feed.as_bytes()).await?;
        let state_tmp = match self.stage_bytes(&self.state_key, &state).await {
            Ok(tmp) => tmp,
            Err(e) => {
                Self::discard(&[&feed_tmp]).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&feed_tmp, &feed_path).await {
            Self::discard(&[&feed_tmp, &state_tmp]).await;
            return Err(AppError::Io(e));
        }
        if let Err(e) = tokio::fs::rename(&state_tmp, &state_path).await {
            Self::discard(&[&state_tmp]).await;
            return Err(AppError::Io(e));
        }

        log::info!(
            "Committed {} ({} bytes) and {} ({} sources)",
            feed_path.display(),
            feed.len(),
            state_path.display(),
            watermarks.len()
        );

        Ok(CommitMetadata {
            feed_location: feed_path.display().to_string(),
            state_location: state_path.display().to_string(),
            feed_bytes: feed.len(),
            source_count: watermarks.len(),
        })
    }
}
