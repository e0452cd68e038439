//! DuckDuckGo instant-answer adapter (`/?q=...&format=json&no_html=1`).
//!
//! The instant-answer API has no notion of ranked web results; it returns a
//! single `AbstractText`/`AbstractURL` plus a `RelatedTopics` list, which we
//! flatten into the common result schema.

use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::CoreError;
use reqwest::Client;

use super::get_json;
use crate::registry::SearchProviderAdapter;

const WEIGHT: f64 = 0.9;

pub struct DuckDuckGoAdapter {
    client: Client,
}

impl DuckDuckGoAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    fn parse_results(body: &serde_json::Value) -> Vec<SearchResult> {
        let mut results = Vec::new();

        if let (Some(text), Some(url)) = (
            body.get("AbstractText").and_then(|v| v.as_str()),
            body.get("AbstractURL").and_then(|v| v.as_str()),
        ) {
            if !text.is_empty() && !url.is_empty() {
                let heading = body.get("Heading").and_then(|v| v.as_str()).unwrap_or(text);
                results.push(SearchResult::new(heading, url, text, "duckduckgo"));
            }
        }

        if let Some(topics) = body.get("RelatedTopics").and_then(|v| v.as_array()) {
            for topic in topics {
                let Some(url) = topic.get("FirstURL").and_then(|v| v.as_str()) else {
                    continue;
                };
                if url.is_empty() {
                    continue;
                }
                let text = topic.get("Text").and_then(|v| v.as_str()).unwrap_or_default();
                let title = text.split(" - ").next().unwrap_or(text);
                results.push(SearchResult::new(title, url, text, "duckduckgo"));
            }
        }

        results
    }
}

impl Default for DuckDuckGoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProviderAdapter for DuckDuckGoAdapter {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Duckduckgo
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
        let url = reqwest::Url::parse_with_params(
            "https://api.duckduckgo.com/",
            [("q", query), ("format", "json"), ("no_html", "1")],
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
    fn parses_abstract_and_related_topics() {
        let body = serde_json::json!({
            "Heading": "Rust",
            "AbstractText": "A systems programming language",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "RelatedTopics": [
                { "Text": "Rust (disambiguation) - other uses", "FirstURL": "https://duckduckgo.com/Rust" },
                { "Text": "no url here" }
            ]
        });
        let results = DuckDuckGoAdapter::parse_results(&body);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "duckduckgo");
    }
}
