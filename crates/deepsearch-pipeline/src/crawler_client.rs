//! Client for the opaque crawler collaborator used by the scrape stage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use deepsearch_core::{CoreError, Result};

#[derive(Clone, Debug, Serialize)]
pub struct CrawlRequest {
    pub url: String,
    pub extraction_strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CrawlResponse {
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub extracted_data: Option<serde_json::Value>,
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Abstraction over the crawler so the scrape stage can be tested against a
/// fake without a network call.
#[async_trait]
pub trait CrawlerClient: Send + Sync {
    async fn crawl(&self, request: CrawlRequest, timeout: Duration) -> Result<CrawlResponse>;
}

/// HTTP client for the crawler's `POST /crawl` endpoint.
pub struct HttpCrawlerClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCrawlerClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl CrawlerClient for HttpCrawlerClient {
    async fn crawl(&self, request: CrawlRequest, timeout: Duration) -> Result<CrawlResponse> {
        let url = format!("{}/crawl", self.base_url.trim_end_matches('/'));
        let send = self.client.post(url).json(&request).send();

        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| CoreError::ProviderTimeout("crawler".into()))?
            .map_err(|e| CoreError::UpstreamDependencyDown(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::UpstreamDependencyDown(format!("crawler status {}", response.status())));
        }

        response.json().await.map_err(|e| CoreError::ProviderProtocolError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawl_request_serializes_without_selector() {
        let request = CrawlRequest {
            url: "https://example.com".into(),
            extraction_strategy: "markdown".into(),
            css_selector: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("css_selector").is_none());
    }
}
