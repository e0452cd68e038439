//! arXiv adapter: the `export.arxiv.org/api/query` Atom feed. Parsed with
//! `quick-xml`'s event reader rather than a typed deserializer, stripping
//! namespace prefixes so `atom:entry`/`entry` are treated identically.

use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::CoreError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;

use super::get_text;
use crate::registry::SearchProviderAdapter;

const WEIGHT: f64 = 0.85;

pub struct ArxivAdapter {
    client: Client,
}

impl ArxivAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    fn local_name(tag: &[u8]) -> &str {
        let tag = std::str::from_utf8(tag).unwrap_or_default();
        tag.split(':').next_back().unwrap_or(tag)
    }

    fn parse_feed(xml: &str) -> Vec<SearchResult> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut results = Vec::new();
        let mut buf = Vec::new();

        let mut in_entry = false;
        let mut current_tag = String::new();
        let mut title = String::new();
        let mut summary = String::new();
        let mut id_url = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = Self::local_name(e.name().as_ref()).to_string();
                    if name == "entry" {
                        in_entry = true;
                        title.clear();
                        summary.clear();
                        id_url.clear();
                    }
                    current_tag = name;
                }
                Ok(Event::Text(e)) if in_entry => {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    match current_tag.as_str() {
                        "title" => title.push_str(&text),
                        "summary" => summary.push_str(&text),
                        "id" => id_url.push_str(&text),
                        _ => {}
                    }
                }
                Ok(Event::End(e)) => {
                    if Self::local_name(e.name().as_ref()) == "entry" && in_entry {
                        if !id_url.is_empty() {
                            results.push(SearchResult::new(
                                title.trim(),
                                id_url.trim(),
                                summary.trim().chars().take(500).collect::<String>(),
                                "arxiv",
                            ));
                        }
                        in_entry = false;
                    }
                }
                Ok(Event::Eof) => break,
                Err(_) => break,
                _ => {}
            }
            buf.clear();
        }

        results
    }
}

impl Default for ArxivAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProviderAdapter for ArxivAdapter {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Arxiv
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
        let url = reqwest::Url::parse_with_params(
            "http://export.arxiv.org/api/query",
            [("search_query", format!("all:{query}").as_str()), ("max_results", "10")],
        )
        .map_err(|e| CoreError::ProviderProtocolError(e.to_string()))?;

        let xml = get_text(&self.client, url, timeout).await?;
        Ok(Self::parse_feed(&xml))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_atom_feed_entries() {
        let xml = r#"<?xml version="1.0"?>
            <feed xmlns="http://www.w3.org/2005/Atom">
              <entry>
                <id>http://arxiv.org/abs/1234.5678</id>
                <title>Attention Is All You Need</title>
                <summary>We propose a new simple network architecture.</summary>
              </entry>
            </feed>"#;
        let results = ArxivAdapter::parse_feed(xml);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Attention Is All You Need");
        assert_eq!(results[0].url, "http://arxiv.org/abs/1234.5678");
    }

    #[test]
    fn entry_without_id_is_dropped() {
        let xml = r#"<feed><entry><title>No id here</title></entry></feed>"#;
        let results = ArxivAdapter::parse_feed(xml);
        assert!(results.is_empty());
    }
}
