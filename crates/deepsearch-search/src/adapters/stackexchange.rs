//! StackExchange search adapter (`/2.3/search/advanced`).

use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::CoreError;
use reqwest::Client;

use super::get_json;
use crate::registry::SearchProviderAdapter;

const WEIGHT: f64 = 0.85;

pub struct StackExchangeAdapter {
    site: String,
    client: Client,
}

impl StackExchangeAdapter {
    #[must_use]
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
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
                let mut result = SearchResult::new(title, url, String::new(), "stackexchange");
                if let Some(score) = item.get("score").and_then(serde_json::Value::as_i64) {
                    result.description = format!("score: {score}");
                }
                Some(result)
            })
            .collect()
    }
}

#[async_trait]
impl SearchProviderAdapter for StackExchangeAdapter {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Stackexchange
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
        let url = reqwest::Url::parse_with_params(
            "https://api.stackexchange.com/2.3/search/advanced",
            [("q", query), ("site", self.site.as_str()), ("order", "desc"), ("sort", "relevance")],
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
    fn parses_search_items() {
        let body = serde_json::json!({
            "items": [
                { "title": "How to use async/await", "link": "https://stackoverflow.com/q/1", "score": 42 }
            ]
        });
        let results = StackExchangeAdapter::parse_results(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].description, "score: 42");
    }
}
