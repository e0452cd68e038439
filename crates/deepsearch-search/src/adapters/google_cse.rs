//! Google Programmable Search Engine adapter (`googleapis.com/customsearch/v1`).
//! Key-gated: only registered when both an API key and a search engine ID
//! (`cx`) are configured.

use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::CoreError;
use reqwest::Client;

use super::get_json;
use crate::registry::SearchProviderAdapter;

const WEIGHT: f64 = 1.3;

pub struct GoogleCseAdapter {
    api_key: String,
    cx: String,
    client: Client,
}

impl GoogleCseAdapter {
    #[must_use]
    pub fn new(api_key: impl Into<String>, cx: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            cx: cx.into(),
            client: Client::new(),
        }
    }

    fn parse_results(body: &serde_json::Value) -> Vec<SearchResult> {
        body.get("items")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|item| {
                let url = item.get("link")?.as_str()?.to_string();
                if url.is_empty() {
                    return None;
                }
                let title = item.get("title").and_then(|v| v.as_str()).unwrap_or_default();
                let description = item.get("snippet").and_then(|v| v.as_str()).unwrap_or_default();
                Some(SearchResult::new(title, url, description, "google_cse"))
            })
            .collect()
    }
}

#[async_trait]
impl SearchProviderAdapter for GoogleCseAdapter {
    fn provider(&self) -> SearchProvider {
        SearchProvider::GoogleCse
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
        let url = reqwest::Url::parse_with_params(
            "https://www.googleapis.com/customsearch/v1",
            [("q", query), ("key", self.api_key.as_str()), ("cx", self.cx.as_str())],
        )
        .map_err(|e| CoreError::ProviderProtocolError(e.to_string()))?;

        let body = get_json(&self.client, url, timeout).await?;
        Ok(Self::parse_results(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_item_list() {
        let body = serde_json::json!({
            "items": [
                { "title": "Rust", "link": "https://rust-lang.org", "snippet": "A systems language" },
                { "title": "No link" }
            ]
        });
        let results = GoogleCseAdapter::parse_results(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "google_cse");
    }
}
