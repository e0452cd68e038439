//! Chunker + Embed Stage
//!
//! Splits scraped text into fixed-size overlapping windows and bulk-ingests
//! them into the vector store. Non-fatal on ingest failure: the pipeline
//! proceeds without RAG chunks.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use deepsearch_core::model::ScrapedContent;

use crate::vector_store_client::{EmbedDocument, EmbedRequest, VectorStoreClient};

#[derive(Clone, Debug)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub store_scraped_content: bool,
    pub timeout: Duration,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200, store_scraped_content: true, timeout: Duration::from_secs(10) }
    }
}

impl ChunkConfig {
    #[must_use]
    pub fn from_config(config: &deepsearch_core::Config) -> Self {
        Self {
            chunk_size: config.rag_chunk_size,
            chunk_overlap: config.rag_chunk_overlap,
            store_scraped_content: config.rag_store_scraped_content,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Deterministic chunk id: a pure function of `url` and `index`, so
/// re-embedding the same URL reproduces identical ids.
#[must_use]
pub fn chunk_id(url: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"_");
    hasher.update(index.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn split_windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut windows = Vec::new();
    let mut start = 0usize;
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    windows
}

/// Chunks every scraped document and bulk-ingests them, unless disabled by
/// config. Returns the chunk count actually sent (0 if disabled or if
/// ingest failed, logged but not propagated).
pub async fn chunk_and_embed(
    store: Arc<dyn VectorStoreClient>,
    scraped: &[ScrapedContent],
    query: &str,
    config: &ChunkConfig,
) -> usize {
    if !config.store_scraped_content {
        return 0;
    }

    let mut documents = Vec::new();
    for content in scraped {
        if !content.success {
            continue;
        }
        let windows = split_windows(&content.content, config.chunk_size, config.chunk_overlap);
        for (index, text) in windows.into_iter().enumerate() {
            documents.push(EmbedDocument {
                id: chunk_id(&content.url, index),
                text,
                metadata: serde_json::json!({
                    "url": content.url,
                    "title": content.title,
                    "chunk_index": index,
                    "query": query,
                }),
            });
        }
    }

    if documents.is_empty() {
        return 0;
    }

    let count = documents.len();
    match store.embed(EmbedRequest { documents }, config.timeout).await {
        Ok(()) => count,
        Err(e) => {
            tracing::warn!(error = %e, "embed ingest failed, continuing without rag chunks");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic() {
        assert_eq!(chunk_id("https://a", 2), chunk_id("https://a", 2));
        assert_ne!(chunk_id("https://a", 2), chunk_id("https://a", 3));
    }

    #[test]
    fn split_windows_overlaps_by_configured_amount() {
        let text = "a".repeat(25);
        let windows = split_windows(&text, 10, 3);
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].len(), 10);
        assert_eq!(windows.last().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn disabled_config_skips_ingest_entirely() {
        let store: Arc<dyn VectorStoreClient> = Arc::new(crate::vector_store_client::InMemoryVectorStore::new());
        let scraped = vec![ScrapedContent {
            url: "https://a".into(),
            title: "A".into(),
            content: "x".repeat(500),
            markdown: None,
            extracted_data: None,
            word_count: 500,
            success: true,
            error_message: None,
        }];
        let config = ChunkConfig { store_scraped_content: false, ..Default::default() };
        let count = chunk_and_embed(store, &scraped, "query", &config).await;
        assert_eq!(count, 0);
    }
}
