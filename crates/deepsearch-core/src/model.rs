//! Shared data model for the DeepSearch pipeline.
//!
//! One canonical `SearchResult`/`ScrapedContent`/`VectorChunk` schema that
//! every adapter and stage targets — the source had several overlapping
//! variants of each; this collapses them to one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search provider identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    Whoogle,
    Searxng,
    Yacy,
    Wikipedia,
    Duckduckgo,
    Stackexchange,
    Arxiv,
    Brave,
    Qwant,
    GoogleCse,
}

impl std::fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", s.as_str().unwrap_or("unknown"))
    }
}

/// Result ordering requested by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortMethod {
    #[default]
    Relevance,
    Date,
    SourceQuality,
}

/// LLM back-end identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderId {
    Ollama,
    Groq,
    Gemini,
    OpenaiCompatible,
}

/// Individual search result from a provider, normalized to one schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub description: String,
    pub source: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_authority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
}

fn default_confidence() -> f64 {
    1.0
}

impl SearchResult {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            description: description.into(),
            source: source.into(),
            confidence: default_confidence(),
            domain_authority: None,
            rank: None,
            published_date: None,
        }
    }
}

/// Scraped and extracted content from a single URL.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub url: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<serde_json::Value>,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ScrapedContent {
    #[must_use]
    pub fn failed(url: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            content: String::new(),
            markdown: None,
            extracted_data: None,
            word_count: 0,
            success: false,
            error_message: Some(error_message.into()),
        }
    }
}

/// A document chunk with embedding metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorChunk {
    pub chunk_id: String,
    pub content: String,
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Main DeepSearch API request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeepSearchRequest {
    pub query: String,

    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub providers: Option<Vec<SearchProvider>>,
    #[serde(default)]
    pub sort_by: SortMethod,

    #[serde(default = "default_true")]
    pub enable_scraping: bool,
    #[serde(default)]
    pub max_scrape_urls: Option<usize>,

    #[serde(default = "default_true")]
    pub enable_rag: bool,
    #[serde(default)]
    pub rag_top_k: Option<usize>,

    #[serde(default = "default_true")]
    pub enable_synthesis: bool,
    #[serde(default)]
    pub llm_provider: Option<LlmProviderId>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_true")]
    pub stream: bool,

    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub include_history: bool,

    #[serde(default)]
    pub enable_multi_hop: bool,
    #[serde(default)]
    pub enable_fact_checking: bool,

    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default)]
    pub cache_ttl: Option<u64>,
}

/// Simplified non-streaming search request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuickSearchRequest {
    pub query: String,
    #[serde(default = "default_quick_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_quick_max_results() -> usize {
    10
}

/// Pipeline progress stage tags, in strictly forward order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Searching,
    Scraping,
    Embedding,
    Retrieving,
    Synthesizing,
    Complete,
    Error,
}

/// Tagged-union pipeline event, framed over SSE.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PipelineEvent {
    Progress(ProgressPayload),
    Content(ContentPayload),
    Sources(SourcesPayload),
    Complete(DeepSearchResponse),
    Error(ErrorPayload),
}

#[derive(Clone, Debug, Serialize)]
pub struct ProgressPayload {
    pub stage: Stage,
    pub message: String,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ContentPayload {
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SourcesPayload {
    pub sources: Vec<SearchResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Complete DeepSearch response, the `complete` event payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeepSearchResponse {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scraped_content: Option<Vec<ScrapedContent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_chunks: Option<Vec<VectorChunk>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub execution_time: f64,
    pub provider_used: String,
    #[serde(default)]
    pub cache_hit: bool,

    pub total_results: usize,
    #[serde(default)]
    pub results_scraped: usize,
    #[serde(default)]
    pub chunks_retrieved: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
}

/// Role within an LLM chat-style request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

/// Request to the LLM gateway (`/completion`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub preferred_provider: Option<LlmProviderId>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default = "default_true")]
    pub fallback: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tracking_id: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}

/// Live status for one provider (search or LLM), surfaced at `/providers`.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderStatus {
    pub available: bool,
    pub healthy: bool,
    pub average_latency_ms: f64,
    pub error_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<DateTime<Utc>>,
    pub circuit_breaker_open: bool,
    pub active_requests: u32,
}

/// Overall service health, surfaced at `/health`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: f64,
    pub dependencies: HashMap<String, bool>,
    pub cache_enabled: bool,
    pub rag_enabled: bool,
    pub metrics: ServiceMetrics,
}

/// Aggregate service performance metrics, rolled into `/health`.
#[derive(Clone, Debug, Serialize)]
pub struct ServiceMetrics {
    pub total_requests: u64,
    pub average_latency_ms: f64,
    pub cache_hit_rate: f64,
    pub provider_latencies: HashMap<String, f64>,
    pub error_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_result_round_trips_over_json() {
        let mut result = SearchResult::new("France", "https://en.wikipedia.org/wiki/France", "desc", "wikipedia");
        result.rank = Some(1);
        result.domain_authority = Some(0.95);

        let json = serde_json::to_string(&result).unwrap();
        let back: SearchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.url, result.url);
        assert_eq!(back.rank, result.rank);
        assert_eq!(back.domain_authority, result.domain_authority);
    }

    #[test]
    fn deepsearch_request_defaults_match_spec() {
        let json = serde_json::json!({ "query": "capital of france" });
        let request: DeepSearchRequest = serde_json::from_value(json).unwrap();
        assert!(request.enable_scraping);
        assert!(request.enable_rag);
        assert!(request.enable_synthesis);
        assert!(request.use_cache);
        assert!(!request.include_history);
        assert!(!request.enable_multi_hop);
        assert_eq!(request.sort_by, SortMethod::Relevance);
    }
}
