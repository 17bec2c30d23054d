//! HTTP client for photo pages and image downloads
//!
//! [`PageFetcher`] is the seam between the pipeline and the network; the
//! reqwest-backed [`HttpClient`] is the production implementation. Pacing is
//! not done here but by the rate governor the callers acquire first.

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT},
};
use std::time::Duration;

use super::config::HttpConfig;
use super::harvest_error::FetchError;

/// A fetched text document and where the request finally landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub requested_url: String,
    pub final_url: String,
    pub body: String,
}

/// Fetched binary content and where the request finally landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBytes {
    pub requested_url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Network access used by the harvest pipeline.
///
/// Non-success statuses are reported as [`FetchError::Status`]; redirects are
/// followed and the final URL is returned so callers can detect login walls.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError>;

    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, FetchError>;
}

/// reqwest-based fetcher with browser-like default headers
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(config.page_timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    async fn send(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        tracing::debug!("Fetching page: {}", url);
        let response = self
            .send(url, Duration::from_secs(self.config.page_timeout_seconds))
            .await?;
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| FetchError::from_reqwest(url, &e))?;

        tracing::debug!("Fetched page: {} ({} chars)", final_url, body.len());
        Ok(FetchedPage {
            requested_url: url.to_string(),
            final_url,
            body,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, FetchError> {
        tracing::debug!("Downloading: {}", url);
        let response = self
            .send(url, Duration::from_secs(self.config.download_timeout_seconds))
            .await?;
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| FetchError::from_reqwest(url, &e))?;

        tracing::debug!("Downloaded: {} ({} bytes)", final_url, bytes.len());
        Ok(FetchedBytes {
            requested_url: url.to_string(),
            final_url,
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = HttpClient::new(HttpConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_user_agent_is_rejected() {
        let config = HttpConfig {
            user_agent: "bad\nagent".to_string(),
            ..HttpConfig::default()
        };
        assert!(HttpClient::new(config).is_err());
    }
}
