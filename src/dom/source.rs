//! Page sources
//!
//! A page source hands the capture step the raw markup of one document.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CaptureError;

use super::capture::capture_html;
use super::types::PageSnapshot;

/// Raw markup of a loaded page
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    pub html: String,
}

/// Something a snapshot can be captured from
#[async_trait]
pub trait PageSource: Send + Sync {
    /// URL the snapshot will be attributed to
    fn url(&self) -> &str;

    /// Load the page markup
    async fn load(&self) -> Result<RawPage, CaptureError>;
}

/// Load a page and capture its snapshot
pub async fn capture(source: &dyn PageSource) -> Result<PageSnapshot, CaptureError> {
    let page = source.load().await?;
    tracing::debug!(url = %page.url, bytes = page.html.len(), "Page loaded");
    capture_html(&page.url, &page.html)
}

/// Markup already held in memory
pub struct StaticPage {
    url: String,
    html: String,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

#[async_trait]
impl PageSource for StaticPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn load(&self) -> Result<RawPage, CaptureError> {
        Ok(RawPage {
            url: self.url.clone(),
            html: self.html.clone(),
        })
    }
}

/// Markup saved to a local file
pub struct FilePage {
    url: String,
    path: PathBuf,
}

impl FilePage {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl PageSource for FilePage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn load(&self) -> Result<RawPage, CaptureError> {
        let html = tokio::fs::read_to_string(&self.path).await?;
        Ok(RawPage {
            url: self.url.clone(),
            html,
        })
    }
}

/// Live page fetched over HTTP
pub struct HttpPage {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpPage {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PageSource for HttpPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn load(&self) -> Result<RawPage, CaptureError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CaptureError::Timeout(self.timeout.as_secs())
                } else {
                    CaptureError::Unavailable(format!("Failed to fetch {}: {}", self.url, e))
                }
            })?;

        if !response.status().is_success() {
            return Err(CaptureError::Unavailable(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        // Redirects may land somewhere else; attribute the snapshot to the final URL
        let url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| CaptureError::Unavailable(format!("Failed to read body: {}", e)))?;

        Ok(RawPage { url, html })
    }
}
