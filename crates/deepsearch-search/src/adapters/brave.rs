//! Brave Search adapter (`api.search.brave.com/res/v1/web/search`). Key-gated:
//! only registered when an API key is configured.

use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::CoreError;
use reqwest::Client;

use super::get_json_with_header;
use crate::registry::SearchProviderAdapter;

const WEIGHT: f64 = 1.2;

pub struct BraveAdapter {
    api_key: String,
    client: Client,
}

impl BraveAdapter {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn parse_results(body: &serde_json::Value) -> Vec<SearchResult> {
        body.get("web")
            .and_then(|v| v.get("results"))
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|item| {
                let url = item.get("url")?.as_str()?.to_string();
                if url.is_empty() {
                    return None;
                }
                let title = item.get("title").and_then(|v| v.as_str()).unwrap_or_default();
                let description = item.get("description").and_then(|v| v.as_str()).unwrap_or_default();
                Some(SearchResult::new(title, url, description, "brave"))
            })
            .collect()
    }
}

#[async_trait]
impl SearchProviderAdapter for BraveAdapter {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Brave
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
        let url = reqwest::Url::parse_with_params(
            "https://api.search.brave.com/res/v1/web/search",
            [("q", query)],
        )
        .map_err(|e| CoreError::ProviderProtocolError(e.to_string()))?;

        let body = get_json_with_header(&self.client, url, timeout, "X-Subscription-Token", &self.api_key).await?;
        Ok(Self::parse_results(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_web_results() {
        let body = serde_json::json!({
            "web": { "results": [
                { "title": "Rust", "url": "https://rust-lang.org", "description": "A systems language" },
                { "title": "No URL" }
            ] }
        });
        let results = BraveAdapter::parse_results(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "brave");
    }
}
