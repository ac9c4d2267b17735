// src/services/transport.rs

//! Page transport.
//!
//! Fetches the public preview page of a channel, either the newest page or
//! the page of posts older than a `before` cursor.

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::create_async_client;

/// Source of raw page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page of a source. `cursor = None` means the newest page.
    async fn fetch_page(&self, source_id: &str, cursor: Option<u64>) -> Result<String>;
}

/// Fetcher for `{base_url}/s/{source}` channel preview pages.
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
}

impl HttpFetcher {
    /// Create a fetcher with a client built from the crawler settings.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = create_async_client(config)?;
        Self::with_client(client, &config.base_url)
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    /// URL of a source page, optionally anchored before a cursor.
    pub fn page_url(&self, source_id: &str, cursor: Option<u64>) -> Result<Url> {
        let mut url = self.base_url.join(&format!("s/{source_id}"))?;
        if let Some(before) = cursor {
            url.query_pairs_mut()
                .append_pair("before", &before.to_string());
        }
        Ok(url)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, source_id: &str, cursor: Option<u64>) -> Result<String> {
        let url = self.page_url(source_id, cursor)?;
        log::debug!("GET {url}");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::fetch(source_id, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(source_id, format!("HTTP {status} for {url}")));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::fetch(source_id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(base: &str) -> HttpFetcher {
        HttpFetcher::with_client(Client::new(), base).unwrap()
    }

    #[test]
    fn newest_page_has_no_cursor() {
        let url = fetcher("https://t.me").page_url("durov", None).unwrap();
        assert_eq!(url.as_str(), "https://t.me/s/durov");
    }

    #[test]
    fn older_page_carries_before_cursor() {
        let url = fetcher("https://t.me").page_url("durov", Some(312)).unwrap();
        assert_eq!(url.as_str(), "https://t.me/s/durov?before=312");
    }

    #[test]
    fn base_path_is_preserved() {
        let url = fetcher("https://mirror.example.com/tg")
            .page_url("durov", Some(5))
            .unwrap();
        assert_eq!(url.as_str(), "https://mirror.example.com/tg/s/durov?before=5");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpFetcher::with_client(Client::new(), "not a url").is_err());
    }

    /// Serve one canned response per connection on a local port.
    async fn serve(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn successful_page_returns_body() {
        let base = serve("200 OK", "<html>channel</html>").await;
        let page = fetcher(&base).fetch_page("durov", Some(10)).await.unwrap();
        assert_eq!(page, "<html>channel</html>");
    }

    #[tokio::test]
    async fn error_status_is_a_fetch_error() {
        let base = serve("502 Bad Gateway", "upstream down").await;
        let err = fetcher(&base).fetch_page("durov", None).await.unwrap_err();

        match &err {
            AppError::Fetch { source_id, message } => {
                assert_eq!(source_id, "durov");
                assert!(message.contains("502"));
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
        assert!(err.is_source_local());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher(&format!("http://{addr}"))
            .fetch_page("durov", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
    }
}
