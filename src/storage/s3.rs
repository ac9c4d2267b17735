//! AWS S3 storage implementation.
//!
//! Keys live under `{bucket}/{prefix}/`. A commit puts the feed first and the
//! watermark snapshot second; if the second put fails, the watermark stays
//! behind the published feed and the next run re-reads those items.

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::{StorageConfig, WatermarkMap};
use crate::storage::{CommitMetadata, FeedStore};

const FEED_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";
const STATE_CONTENT_TYPE: &str = "application/json";

/// S3-based feed storage.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
    feed_key: String,
    state_key: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
            feed_key: config.feed_key.clone(),
            state_key: config.state_key.clone(),
        }
    }

    /// Create S3 storage from environment configuration.
    ///
    /// Reads `S3_BUCKET` (default `chanfeed`) and `S3_PREFIX` (default empty).
    pub async fn from_env(config: &StorageConfig) -> Result<Self> {
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&aws);

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "chanfeed".to_string());
        let prefix = std::env::var("S3_PREFIX").unwrap_or_default();

        Ok(Self::new(client, bucket, prefix, config))
    }

    /// Same bucket and prefix, with the keys of another storage config.
    pub fn with_keys(&self, config: &StorageConfig) -> Self {
        Self::new(
            self.client.clone(),
            self.bucket.clone(),
            self.prefix.clone(),
            config,
        )
    }

    /// Full object key for a relative key.
    fn key(&self, key: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}/{key}")
        }
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.key(key))
    }

    /// Read an object, returning None if it does not exist.
    pub async fn read_bytes_optional(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let full_key = self.key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output.body.collect().await.map_err(AppError::storage)?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::info!("No existing object at s3://{}/{}", self.bucket, full_key);
                    Ok(None)
                } else {
                    Err(AppError::storage(service_err))
                }
            }
        }
    }

    /// Read JSON from S3, returning None if the object does not exist.
    pub async fn read_json_optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes_optional(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Put an object.
    async fn write_bytes(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let full_key = self.key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::storage(e.into_service_error()))?;

        log::info!("Wrote s3://{}/{}", self.bucket, full_key);
        Ok(())
    }
}

#[async_trait::async_trait]
impl FeedStore for S3Storage {
    async fn load_watermarks(&self) -> Result<WatermarkMap> {
        Ok(self
            .read_json_optional::<WatermarkMap>(&self.state_key)
            .await?
            .unwrap_or_default())
    }

    async fn load_feed(&self) -> Result<Option<String>> {
        match self.read_bytes_optional(&self.feed_key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| AppError::storage(format!("{} is not UTF-8: {e}", self.feed_key))),
            None => Ok(None),
        }
    }

    async fn commit(&self, feed: &str, watermarks: &WatermarkMap) -> Result<CommitMetadata> {
        let state = serde_json::to_vec_pretty(watermarks)?;

        self.write_bytes(&self.feed_key, feed.as_bytes().to_vec(), FEED_CONTENT_TYPE)
            .await?;
        self.write_bytes(&self.state_key, state, STATE_CONTENT_TYPE)
            .await?;

        Ok(CommitMetadata {
            feed_location: self.location(&self.feed_key),
            state_location: self.location(&self.state_key),
            feed_bytes: feed.len(),
            source_count: watermarks.len(),
        })
    }
}
