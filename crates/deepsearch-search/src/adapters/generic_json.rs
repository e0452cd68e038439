//! Generic JSON meta-search adapter: covers Whoogle and SearXNG, which both
//! expose a `?q=...&format=json` endpoint returning an array of results with
//! `title`/`url`/`content` (SearXNG) or `title`/`url`/`description` (Whoogle).

use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::CoreError;
use reqwest::Client;

use super::get_json;
use crate::registry::SearchProviderAdapter;

pub struct GenericJsonAdapter {
    provider: SearchProvider,
    base_url: String,
    weight: f64,
    client: Client,
}

impl GenericJsonAdapter {
    #[must_use]
    pub fn new(provider: SearchProvider, base_url: impl Into<String>, weight: f64) -> Self {
        Self {
            provider,
            base_url: base_url.into(),
            weight,
            client: Client::new(),
        }
    }

    fn parse_results(&self, body: &serde_json::Value) -> Vec<SearchResult> {
        let entries = body
            .get("results")
            .and_then(|v| v.as_array())
            .or_else(|| body.as_array())
            .cloned()
            .unwrap_or_default();

        entries
            .iter()
            .filter_map(|entry| {
                let url = entry.get("url")?.as_str()?.to_string();
                if url.is_empty() {
                    return None;
                }
                let title = entry.get("title").and_then(|v| v.as_str()).unwrap_or_default();
                let description = entry
                    .get("content")
                    .or_else(|| entry.get("description"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                Some(SearchResult::new(title, url, description, self.provider.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl SearchProviderAdapter for GenericJsonAdapter {
    fn provider(&self) -> SearchProvider {
        self.provider
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search", self.base_url.trim_end_matches('/')),
            [("q", query), ("format", "json")],
        )
        .map_err(|e| CoreError::ProviderProtocolError(e.to_string()))?;

        let body = get_json(&self.client, url, timeout).await?;
        Ok(self.parse_results(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_searxng_style_payload() {
        let adapter = GenericJsonAdapter::new(SearchProvider::Searxng, "http://localhost:8080", 1.0);
        let body = serde_json::json!({
            "results": [
                { "title": "Rust", "url": "https://rust-lang.org", "content": "A systems language" },
                { "title": "No URL", "content": "dropped" },
            ]
        });
        let results = adapter.parse_results(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://rust-lang.org");
    }
}
