//! YaCy adapter: a self-hosted distributed P2P search index exposing
//! `/yacysearch.json`. Gated behind an explicit enable flag at registration
//! time since most deployments won't run a YaCy node.

use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::CoreError;
use reqwest::Client;

use super::get_json;
use crate::registry::SearchProviderAdapter;

const WEIGHT: f64 = 0.8;

pub struct YacyAdapter {
    base_url: String,
    client: Client,
}

impl YacyAdapter {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn parse_results(body: &serde_json::Value) -> Vec<SearchResult> {
        body.get("channels")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|channel| channel.get("items").and_then(|v| v.as_array()))
            .flatten()
            .filter_map(|item| {
                let url = item.get("link")?.as_str()?.to_string();
                if url.is_empty() {
                    return None;
                }
                let title = item.get("title").and_then(|v| v.as_str()).unwrap_or_default();
                let description = item.get("description").and_then(|v| v.as_str()).unwrap_or_default();
                Some(SearchResult::new(title, url, description, "yacy"))
            })
            .collect()
    }
}

#[async_trait]
impl SearchProviderAdapter for YacyAdapter {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Yacy
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/yacysearch.json", self.base_url.trim_end_matches('/')),
            [("query", query), ("maximumRecords", "10")],
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
    fn parses_channel_items() {
        let body = serde_json::json!({
            "channels": [
                { "items": [
                    { "title": "Rust lang", "link": "https://rust-lang.org", "description": "systems language" }
                ] }
            ]
        });
        let results = YacyAdapter::parse_results(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "yacy");
    }
}
