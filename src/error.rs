// src/error.rs

//! Unified error handling for the feed crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A page of a source could not be fetched
    #[error("Fetch error for {source_id}: {message}")]
    Fetch { source_id: String, message: String },

    /// A page of a source could not be read
    #[error("Parse error for {source_id}: {message}")]
    Parse { source_id: String, message: String },

    /// Object store failure (local or S3)
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a fetch error for a source.
    pub fn fetch(source_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error for a source.
    pub fn parse(source_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error is confined to a single source.
    ///
    /// Such errors stop that source's pagination but never the whole crawl.
    pub fn is_source_local(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Parse { .. } | Self::Http(_) | Self::Url(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_and_parse_errors_are_source_local() {
        assert!(AppError::fetch("durov", "503").is_source_local());
        assert!(AppError::parse("durov", "bad post id").is_source_local());
        assert!(!AppError::storage("bucket gone").is_source_local());
        assert!(!AppError::config("no sources").is_source_local());
    }

    #[test]
    fn display_names_the_source() {
        let err = AppError::fetch("durov", "HTTP 502");
        assert_eq!(err.to_string(), "Fetch error for durov: HTTP 502");
    }
}
