//! Retrieve Stage
//!
//! Queries the vector store's nearest-neighbour endpoint and normalises the
//! hits into `VectorChunk`s. Degrades to an empty result (and the
//! orchestrator falls back to search+scrape context) on any store error.

use std::sync::Arc;
use std::time::Duration;

use deepsearch_core::model::VectorChunk;

use crate::vector_store_client::{QueryRequest, VectorStoreClient};

#[derive(Clone, Debug)]
pub struct RetrieveConfig {
    pub enabled: bool,
    pub top_k: usize,
    pub timeout: Duration,
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self { enabled: true, top_k: 5, timeout: Duration::from_secs(10) }
    }
}

impl RetrieveConfig {
    #[must_use]
    pub fn from_config(config: &deepsearch_core::Config) -> Self {
        Self { enabled: config.rag_enabled, top_k: config.rag_top_k, timeout: Duration::from_secs(10) }
    }
}

/// Retrieves the top-k nearest chunks for `query`. Returns an empty vec if
/// retrieval is disabled or the store errors.
pub async fn retrieve_chunks(store: Arc<dyn VectorStoreClient>, query: &str, config: &RetrieveConfig) -> Vec<VectorChunk> {
    if !config.enabled {
        return Vec::new();
    }

    let request = QueryRequest { query_text: query.to_string(), n_results: config.top_k };
    let response = match store.query(request, config.timeout).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "vector store retrieve failed, falling back to search context");
            return Vec::new();
        }
    };

    let Some(ids) = response.ids.first() else { return Vec::new() };
    let empty_docs = Vec::new();
    let empty_metas = Vec::new();
    let empty_dists = Vec::new();
    let docs = response.documents.first().unwrap_or(&empty_docs);
    let metas = response.metadatas.first().unwrap_or(&empty_metas);
    let dists = response.distances.first().unwrap_or(&empty_dists);

    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let metadata = metas.get(i).cloned();
            let (url, title) = metadata
                .as_ref()
                .map(|m| {
                    (
                        m.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        m.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    )
                })
                .unwrap_or_default();
            let distance = dists.get(i).copied().unwrap_or(1.0);
            VectorChunk {
                chunk_id: id.clone(),
                content: docs.get(i).cloned().unwrap_or_default(),
                url,
                title,
                similarity_score: Some((1.0 - distance).clamp(0.0, 1.0)),
                metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store_client::{EmbedDocument, EmbedRequest, InMemoryVectorStore};

    #[tokio::test]
    async fn disabled_config_returns_empty() {
        let store: Arc<dyn VectorStoreClient> = Arc::new(InMemoryVectorStore::new());
        let config = RetrieveConfig { enabled: false, ..Default::default() };
        let chunks = retrieve_chunks(store, "anything", &config).await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn similarity_score_is_clamped_into_unit_range() {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .embed(
                EmbedRequest {
                    documents: vec![EmbedDocument {
                        id: "c1".into(),
                        text: "rust async runtime".into(),
                        metadata: serde_json::json!({"url": "https://a", "title": "A"}),
                    }],
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        let chunks = retrieve_chunks(store, "rust runtime", &RetrieveConfig::default()).await;
        assert_eq!(chunks.len(), 1);
        let score = chunks[0].similarity_score.unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
}
