//! Wikipedia REST search adapter (`/w/rest.php/v1/search/page`).

use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::CoreError;
use reqwest::Client;

use super::get_json;
use crate::registry::SearchProviderAdapter;

const WEIGHT: f64 = 1.1;

pub struct WikipediaAdapter {
    base_url: String,
    client: Client,
}

impl WikipediaAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: "https://en.wikipedia.org".to_string(),
            client: Client::new(),
        }
    }

    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn parse_results(&self, body: &serde_json::Value) -> Vec<SearchResult> {
        body.get("pages")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|page| {
                let key = page.get("key")?.as_str()?;
                let title = page.get("title").and_then(|v| v.as_str()).unwrap_or(key);
                let description = page
                    .get("description")
                    .and_then(|v| v.as_str())
                    .or_else(|| page.get("excerpt").and_then(|v| v.as_str()))
                    .unwrap_or_default();
                let url = format!("https://en.wikipedia.org/wiki/{key}");
                Some(SearchResult::new(title, url, strip_html(description), "wikipedia"))
            })
            .collect()
    }
}

impl Default for WikipediaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[async_trait]
impl SearchProviderAdapter for WikipediaAdapter {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Wikipedia
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/w/rest.php/v1/search/page", self.base_url),
            [("q", query), ("limit", "10")],
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
    fn parses_search_page_response() {
        let adapter = WikipediaAdapter::new();
        let body = serde_json::json!({
            "pages": [
                { "key": "France", "title": "France", "excerpt": "Country in <b>Western</b> Europe" }
            ]
        });
        let results = adapter.parse_results(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://en.wikipedia.org/wiki/France");
        assert_eq!(results[0].description, "Country in Western Europe");
    }
}
