//! Client for the opaque vector store collaborator used by the chunk/embed
//! and retrieve stages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

use deepsearch_core::{CoreError, Result};

#[derive(Clone, Debug, Serialize)]
pub struct EmbedDocument {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
}

#[derive(Clone, Debug, Serialize)]
pub struct EmbedRequest {
    pub documents: Vec<EmbedDocument>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryRequest {
    pub query_text: String,
    pub n_results: usize,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QueryResponse {
    #[serde(default)]
    pub documents: Vec<Vec<String>>,
    #[serde(default)]
    pub metadatas: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub distances: Vec<Vec<f64>>,
    #[serde(default)]
    pub ids: Vec<Vec<String>>,
}

/// Abstraction over the vector store so the chunk/retrieve stages can be
/// tested against an in-memory fake.
#[async_trait]
pub trait VectorStoreClient: Send + Sync {
    async fn embed(&self, request: EmbedRequest, timeout: Duration) -> Result<()>;
    async fn query(&self, request: QueryRequest, timeout: Duration) -> Result<QueryResponse>;
}

/// HTTP client for the vector store's `/embed` and `/query` endpoints.
pub struct HttpVectorStoreClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpVectorStoreClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl VectorStoreClient for HttpVectorStoreClient {
    async fn embed(&self, request: EmbedRequest, timeout: Duration) -> Result<()> {
        let url = format!("{}/embed", self.base_url.trim_end_matches('/'));
        let send = self.client.post(url).json(&request).send();

        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| CoreError::ProviderTimeout("vector_store".into()))?
            .map_err(|e| CoreError::UpstreamDependencyDown(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::UpstreamDependencyDown(format!("vector store status {}", response.status())));
        }
        Ok(())
    }

    async fn query(&self, request: QueryRequest, timeout: Duration) -> Result<QueryResponse> {
        let url = format!("{}/query", self.base_url.trim_end_matches('/'));
        let send = self.client.post(url).json(&request).send();

        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| CoreError::ProviderTimeout("vector_store".into()))?
            .map_err(|e| CoreError::UpstreamDependencyDown(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::UpstreamDependencyDown(format!("vector store status {}", response.status())));
        }

        response.json().await.map_err(|e| CoreError::ProviderProtocolError(e.to_string()))
    }
}

/// In-process vector store for tests and for running without a real
/// collaborator configured; stores documents and ranks by naive token
/// overlap rather than real embeddings.
#[derive(Default)]
pub struct InMemoryVectorStore {
    documents: Mutex<Vec<EmbedDocument>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStoreClient for InMemoryVectorStore {
    async fn embed(&self, request: EmbedRequest, _timeout: Duration) -> Result<()> {
        self.documents.lock().unwrap().extend(request.documents);
        Ok(())
    }

    async fn query(&self, request: QueryRequest, _timeout: Duration) -> Result<QueryResponse> {
        let query_tokens: std::collections::HashSet<String> =
            request.query_text.to_lowercase().split_whitespace().map(str::to_string).collect();

        let documents = self.documents.lock().unwrap();
        let mut scored: Vec<(f64, &EmbedDocument)> = documents
            .iter()
            .map(|doc| {
                let doc_tokens: std::collections::HashSet<String> =
                    doc.text.to_lowercase().split_whitespace().map(str::to_string).collect();
                let overlap = query_tokens.intersection(&doc_tokens).count();
                #[allow(clippy::cast_precision_loss)]
                let score = overlap as f64 / (query_tokens.len().max(1) as f64);
                (score, doc)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(request.n_results);

        let mut response = QueryResponse::default();
        let mut docs = Vec::new();
        let mut metas = Vec::new();
        let mut dists = Vec::new();
        let mut ids = Vec::new();
        for (score, doc) in scored {
            docs.push(doc.text.clone());
            metas.push(doc.metadata.clone());
            dists.push(1.0 - score);
            ids.push(doc.id.clone());
        }
        response.documents.push(docs);
        response.metadatas.push(metas);
        response.distances.push(dists);
        response.ids.push(ids);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_returns_embedded_document_on_overlap() {
        let store = InMemoryVectorStore::new();
        store
            .embed(
                EmbedRequest {
                    documents: vec![EmbedDocument {
                        id: "doc_0".into(),
                        text: "rust programming language".into(),
                        metadata: serde_json::json!({}),
                    }],
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        let response =
            store.query(QueryRequest { query_text: "rust language".into(), n_results: 5 }, Duration::from_secs(1)).await.unwrap();
        assert_eq!(response.ids[0], vec!["doc_0".to_string()]);
    }
}
