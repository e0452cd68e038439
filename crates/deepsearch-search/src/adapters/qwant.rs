//! Qwant adapter (`api.qwant.com/v3/search/web`). Key-gated: only
//! registered when an API key is configured.

use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::CoreError;
use reqwest::Client;

use super::get_json_with_header;
use crate::registry::SearchProviderAdapter;

const WEIGHT: f64 = 0.9;

pub struct QwantAdapter {
    client: Client,
}

impl QwantAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    fn parse_results(body: &serde_json::Value) -> Vec<SearchResult> {
        body.get("data")
            .and_then(|v| v.get("result"))
            .and_then(|v| v.get("items"))
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
                Some(SearchResult::new(title, url, description, "qwant"))
            })
            .collect()
    }
}

#[async_trait]
impl SearchProviderAdapter for QwantAdapter {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Qwant
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
        let url = reqwest::Url::parse_with_params(
            "https://api.qwant.com/v3/search/web",
            [("q", query), ("count", "20"), ("offset", "0")],
        )
        .map_err(|e| CoreError::ProviderProtocolError(e.to_string()))?;

        let body = get_json_with_header(&self.client, url, timeout, "User-Agent", "SearxNG").await?;
        Ok(Self::parse_results(&body))
    }
}

impl Default for QwantAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_items() {
        let body = serde_json::json!({
            "data": { "result": { "items": [
                { "title": "Rust", "url": "https://rust-lang.org", "description": "A systems language" },
                { "title": "No URL" }
            ] } }
        });
        let results = QwantAdapter::parse_results(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "qwant");
    }
}
