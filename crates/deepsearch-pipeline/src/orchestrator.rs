//! Pipeline Orchestrator
//!
//! Drives every stage in order, emitting one `Progress` event per stage
//! transition, `Content` events as synthesis streams, a `Sources` event once
//! synthesis finishes, and a terminal `Complete` or `Error` event. A cache
//! hit short-circuits straight to `Complete`, skipping every intermediate
//! stage and its progress events. A search fan-out that yields no results
//! terminates the pipeline with an `Error` event instead of continuing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use deepsearch_core::model::{
    ContentPayload, DeepSearchRequest, DeepSearchResponse, ErrorPayload, PipelineEvent, ProgressPayload,
    SearchProvider, SessionMessage, SortMethod, SourcesPayload, Stage, TurnRole,
};
use deepsearch_core::session::SessionStore;
use deepsearch_core::{CoreError, MetricsRecorder, Result};

use deepsearch_llm::{LlmRouter, SelectionStrategy};
use deepsearch_search::{fan_out, rank, SearchProviderRegistry};

use crate::cache::{cache_key, ResponseCache};
use crate::chunk::{chunk_and_embed, ChunkConfig};
use crate::crawler_client::CrawlerClient;
use crate::retrieve::{retrieve_chunks, RetrieveConfig};
use crate::scrape::{scrape_results, ScrapeConfig};
use crate::synthesis::{build_context, synthesize, synthesize_stream, SynthesisConfig};
use crate::vector_store_client::VectorStoreClient;

const DEFAULT_MAX_RESULTS: usize = 10;
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Fixed stage-entry progress fractions, in the order the orchestrator
/// visits them.
const PROGRESS_SEARCH: f64 = 0.1;
const PROGRESS_SCRAPE: f64 = 0.3;
const PROGRESS_EMBED: f64 = 0.5;
const PROGRESS_RETRIEVE: f64 = 0.6;
const PROGRESS_SYNTHESIZE: f64 = 0.7;
const PROGRESS_DONE: f64 = 1.0;

/// Wires every stage crate together behind one entry point.
pub struct PipelineOrchestrator {
    search_registry: Arc<SearchProviderRegistry>,
    llm_router: Arc<LlmRouter>,
    crawler: Arc<dyn CrawlerClient>,
    vector_store: Arc<dyn VectorStoreClient>,
    session_store: Option<Arc<dyn SessionStore>>,
    metrics: Arc<MetricsRecorder>,
    cache: Arc<ResponseCache>,
    default_strategy: SelectionStrategy,
    base_scrape_config: ScrapeConfig,
    base_chunk_config: ChunkConfig,
    base_retrieve_config: RetrieveConfig,
    base_synthesis_config: SynthesisConfig,
    default_max_results: usize,
    default_providers: Vec<String>,
    search_timeout: Duration,
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn new(
        search_registry: Arc<SearchProviderRegistry>,
        llm_router: Arc<LlmRouter>,
        crawler: Arc<dyn CrawlerClient>,
        vector_store: Arc<dyn VectorStoreClient>,
        metrics: Arc<MetricsRecorder>,
        cache: Arc<ResponseCache>,
        default_strategy: SelectionStrategy,
    ) -> Self {
        Self {
            search_registry,
            llm_router,
            crawler,
            vector_store,
            session_store: None,
            metrics,
            cache,
            default_strategy,
            base_scrape_config: ScrapeConfig::default(),
            base_chunk_config: ChunkConfig::default(),
            base_retrieve_config: RetrieveConfig::default(),
            base_synthesis_config: SynthesisConfig::default(),
            default_max_results: DEFAULT_MAX_RESULTS,
            default_providers: Vec::new(),
            search_timeout: SEARCH_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Overrides the per-stage defaults derived from `::default()` with
    /// values sourced from the running service's configuration. Per-request
    /// fields (e.g. `max_scrape_urls`) still take priority over these.
    #[must_use]
    pub fn with_config(mut self, config: &deepsearch_core::Config) -> Self {
        self.base_scrape_config = ScrapeConfig::from_config(config);
        self.base_chunk_config = ChunkConfig::from_config(config);
        self.base_retrieve_config = RetrieveConfig::from_config(config);
        self.base_synthesis_config = SynthesisConfig::from_config(config);
        self.default_max_results = config.search_max_results;
        self.default_providers = config.search_default_providers.clone();
        self.search_timeout = config.search_timeout;
        self
    }

    fn strategy_for(&self, request: &DeepSearchRequest) -> SelectionStrategy {
        match request.llm_provider {
            Some(id) => SelectionStrategy::Preferred(id),
            None => self.default_strategy.clone(),
        }
    }

    /// Runs the full pipeline and returns only the terminal response,
    /// swallowing intermediate progress. Used by the non-streaming HTTP path.
    pub async fn run(&self, request: DeepSearchRequest) -> Result<DeepSearchResponse> {
        let mut stream = self.run_stream(request);
        let mut last_error: Option<String> = None;
        while let Some(event) = stream.next().await {
            match event {
                PipelineEvent::Complete(response) => return Ok(response),
                PipelineEvent::Error(payload) => last_error = Some(payload.message),
                _ => {}
            }
        }
        Err(CoreError::Fatal(last_error.unwrap_or_else(|| "pipeline ended without a terminal event".into())))
    }

    /// Runs the full pipeline, yielding every intermediate event. Used by
    /// the SSE streaming HTTP path.
    #[must_use]
    pub fn run_stream(&self, request: DeepSearchRequest) -> impl tokio_stream::Stream<Item = PipelineEvent> + Send {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let search_registry = self.search_registry.clone();
        let llm_router = self.llm_router.clone();
        let crawler = self.crawler.clone();
        let vector_store = self.vector_store.clone();
        let session_store = self.session_store.clone();
        let metrics = self.metrics.clone();
        let cache = self.cache.clone();
        let strategy = self.strategy_for(&request);
        let base_scrape_config = self.base_scrape_config.clone();
        let base_chunk_config = self.base_chunk_config.clone();
        let base_retrieve_config = self.base_retrieve_config.clone();
        let base_synthesis_config = self.base_synthesis_config.clone();
        let default_max_results = self.default_max_results;
        let default_providers = self.default_providers.clone();
        let search_timeout = self.search_timeout;

        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = run_pipeline(
                &search_registry,
                &llm_router,
                &crawler,
                &vector_store,
                &session_store,
                &metrics,
                &cache,
                &strategy,
                &base_scrape_config,
                &base_chunk_config,
                &base_retrieve_config,
                &base_synthesis_config,
                default_max_results,
                &default_providers,
                search_timeout,
                request,
                started,
                &tx,
            )
            .await;

            if let Err(e) = outcome {
                let _ = tx.send(PipelineEvent::Error(ErrorPayload { message: e.user_message() })).await;
            }
        });

        ReceiverStream::new(rx)
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline(
    search_registry: &SearchProviderRegistry,
    llm_router: &LlmRouter,
    crawler: &Arc<dyn CrawlerClient>,
    vector_store: &Arc<dyn VectorStoreClient>,
    session_store: &Option<Arc<dyn SessionStore>>,
    metrics: &MetricsRecorder,
    cache: &ResponseCache,
    strategy: &SelectionStrategy,
    base_scrape_config: &ScrapeConfig,
    base_chunk_config: &ChunkConfig,
    base_retrieve_config: &RetrieveConfig,
    base_synthesis_config: &SynthesisConfig,
    default_max_results: usize,
    default_providers: &[String],
    search_timeout: Duration,
    request: DeepSearchRequest,
    started: Instant,
    tx: &mpsc::Sender<PipelineEvent>,
) -> Result<()> {
    let providers: Vec<String> = request
        .providers
        .clone()
        .unwrap_or_default()
        .iter()
        .map(SearchProvider::to_string)
        .collect();
    let key = cache_key(&request.query, &providers, request.max_results);

    if request.use_cache {
        if let Some(mut cached) = cache.get(&key) {
            cached.cache_hit = true;
            tx.send(PipelineEvent::Complete(cached)).await.ok();
            return Ok(());
        }
    }

    progress(tx, Stage::Searching, PROGRESS_SEARCH, "searching providers").await;

    let max_results = request.max_results.unwrap_or(default_max_results);
    let providers_to_query = request.providers.clone().unwrap_or_else(|| {
        let available = search_registry.available_providers();
        if default_providers.is_empty() {
            available
        } else {
            available
                .into_iter()
                .filter(|p| default_providers.iter().any(|name| name.eq_ignore_ascii_case(&p.to_string())))
                .collect()
        }
    });
    let outcome = fan_out(search_registry, metrics, &providers_to_query, &request.query, search_timeout).await;

    let mut results = outcome.results;
    let sort_by = if request.sort_by == SortMethod::Relevance && deepsearch_core::QueryUnderstandingEngine::analyze_query(&request.query).time_sensitive {
        SortMethod::Date
    } else {
        request.sort_by
    };
    rank(&mut results, &request.query, sort_by);
    results.truncate(max_results);

    if results.is_empty() {
        tx.send(PipelineEvent::Error(ErrorPayload { message: "No search results".into() })).await.ok();
        return Ok(());
    }

    let mut scraped = Vec::new();
    if request.enable_scraping {
        progress(tx, Stage::Scraping, PROGRESS_SCRAPE, "scraping top results").await;
        let mut scrape_config = base_scrape_config.clone();
        if let Some(max) = request.max_scrape_urls {
            scrape_config.max_scrape_urls = max;
        }
        scraped = scrape_results(crawler.clone(), &results, &scrape_config).await;
    }

    let mut chunks = Vec::new();
    if request.enable_rag && !scraped.is_empty() {
        progress(tx, Stage::Embedding, PROGRESS_EMBED, "embedding scraped content").await;
        chunk_and_embed(vector_store.clone(), &scraped, &request.query, base_chunk_config).await;

        progress(tx, Stage::Retrieving, PROGRESS_RETRIEVE, "retrieving relevant chunks").await;
        let mut retrieve_config = base_retrieve_config.clone();
        if let Some(top_k) = request.rag_top_k {
            retrieve_config.top_k = top_k;
        }
        chunks = retrieve_chunks(vector_store.clone(), &request.query, &retrieve_config).await;
    }

    let context = build_context(&results, &scraped, &chunks);
    let synthesis_config = SynthesisConfig {
        enabled: request.enable_synthesis,
        temperature: request.temperature.unwrap_or(base_synthesis_config.temperature),
        ..base_synthesis_config.clone()
    };

    progress(tx, Stage::Synthesizing, PROGRESS_SYNTHESIZE, "synthesizing answer").await;

    let answer = if request.enable_synthesis && request.stream {
        let mut text_stream =
            Box::pin(synthesize_stream(llm_router, strategy, &request.query, &context, &synthesis_config).await?);
        let mut full = String::new();
        while let Some(chunk) = text_stream.next().await {
            let delta = chunk?;
            full.push_str(&delta);
            tx.send(PipelineEvent::Content(ContentPayload { content: delta })).await.ok();
        }
        full
    } else {
        synthesize(llm_router, strategy, &request.query, &context, &synthesis_config).await?
    };

    if let (Some(store), Some(session_id)) = (session_store.as_ref(), request.session_id.as_ref()) {
        store.append_message(session_id, SessionMessage::new(TurnRole::User, request.query.clone())).await.ok();
        store.append_message(session_id, SessionMessage::new(TurnRole::Assistant, answer.clone())).await.ok();
    }

    let response = DeepSearchResponse {
        query: request.query,
        answer,
        total_results: results.len(),
        results_scraped: scraped.len(),
        chunks_retrieved: chunks.len(),
        sources: results,
        scraped_content: (!scraped.is_empty()).then_some(scraped),
        rag_chunks: (!chunks.is_empty()).then_some(chunks),
        session_id: request.session_id,
        execution_time: started.elapsed().as_secs_f64(),
        provider_used: strategy_label(strategy),
        cache_hit: false,
        tokens_used: None,
    };

    if request.use_cache {
        cache.put(key, response.clone(), request.cache_ttl.map(Duration::from_secs));
    }

    tx.send(PipelineEvent::Sources(SourcesPayload { sources: response.sources.clone() })).await.ok();
    progress(tx, Stage::Complete, PROGRESS_DONE, "done").await;
    tx.send(PipelineEvent::Complete(response)).await.ok();
    Ok(())
}

async fn progress(tx: &mpsc::Sender<PipelineEvent>, stage: Stage, progress: f64, message: &str) {
    tx.send(PipelineEvent::Progress(ProgressPayload { stage, message: message.to_string(), progress, details: None }))
        .await
        .ok();
}

fn strategy_label(strategy: &SelectionStrategy) -> String {
    match strategy {
        SelectionStrategy::Preferred(id) => format!("{id:?}").to_lowercase(),
        SelectionStrategy::Failover(ids) => ids.first().map(|id| format!("{id:?}").to_lowercase()).unwrap_or_default(),
        other => format!("{other:?}").to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store_client::InMemoryVectorStore;
    use async_trait::async_trait;
    use deepsearch_core::model::LlmProviderId;
    use deepsearch_llm::registry::{LlmProviderRegistry, ProviderOrdinals};
    use deepsearch_llm::{Completion, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo};
    use deepsearch_search::SearchProviderAdapter;
    use std::time::Duration;

    struct NoResultsAdapter;

    #[async_trait]
    impl SearchProviderAdapter for NoResultsAdapter {
        fn provider(&self) -> SearchProvider {
            SearchProvider::Whoogle
        }
        fn weight(&self) -> f64 {
            1.0
        }
        async fn query(&self, _query: &str, _timeout: Duration) -> Result<Vec<deepsearch_core::model::SearchResult>> {
            Ok(vec![])
        }
    }

    struct OneResultAdapter;

    #[async_trait]
    impl SearchProviderAdapter for OneResultAdapter {
        fn provider(&self) -> SearchProvider {
            SearchProvider::Whoogle
        }
        fn weight(&self) -> f64 {
            1.0
        }
        async fn query(&self, _query: &str, _timeout: Duration) -> Result<Vec<deepsearch_core::model::SearchResult>> {
            Ok(vec![deepsearch_core::model::SearchResult::new(
                "Rust async runtimes",
                "https://example.com/rust-async",
                "a comparison of async runtimes",
                "whoogle",
            )])
        }
    }

    struct StubLlm;

    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo { name: "stub".into(), version: None, models: vec![], supports_streaming: false, supports_tools: false })
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        async fn complete(&self, _messages: &[deepsearch_core::model::LlmMessage], options: &GenerationOptions) -> Result<Completion> {
            Ok(Completion { content: "stub answer".into(), model: options.model.clone(), usage: None, truncated: false, finish_reason: None })
        }
        async fn complete_stream(
            &self,
            _messages: &[deepsearch_core::model::LlmMessage],
            _options: &GenerationOptions,
        ) -> Result<deepsearch_llm::CompletionStream> {
            Err(CoreError::ProviderProtocolError("not needed in this test".into()))
        }
        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    fn test_orchestrator_with(adapter: Arc<dyn SearchProviderAdapter>) -> PipelineOrchestrator {
        let mut search_registry = SearchProviderRegistry::new();
        search_registry.register(adapter, true);

        let mut llm_registry = LlmProviderRegistry::new();
        llm_registry.register(LlmProviderId::Ollama, Arc::new(StubLlm), ProviderOrdinals { cost: 0, quality: 1 });
        let llm_router = Arc::new(LlmRouter::new(llm_registry, Arc::new(MetricsRecorder::new(24))));

        PipelineOrchestrator::new(
            Arc::new(search_registry),
            llm_router,
            Arc::new(crate::crawler_client::HttpCrawlerClient::new("http://localhost:1".into())),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(MetricsRecorder::new(24)),
            Arc::new(ResponseCache::new(Duration::from_secs(60))),
            SelectionStrategy::Preferred(LlmProviderId::Ollama),
        )
    }

    #[tokio::test]
    async fn run_errors_out_with_no_search_results() {
        let orchestrator = test_orchestrator_with(Arc::new(NoResultsAdapter));
        let request = DeepSearchRequest {
            query: "rust async runtimes".into(),
            max_results: None,
            providers: None,
            sort_by: SortMethod::Relevance,
            enable_scraping: false,
            max_scrape_urls: None,
            enable_rag: false,
            rag_top_k: None,
            enable_synthesis: true,
            llm_provider: None,
            temperature: None,
            stream: false,
            session_id: None,
            include_history: false,
            enable_multi_hop: false,
            enable_fact_checking: false,
            use_cache: false,
            cache_ttl: None,
        };

        let err = orchestrator.run(request).await.unwrap_err();
        assert!(err.user_message().contains("No search results"));
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_to_complete() {
        let orchestrator = test_orchestrator_with(Arc::new(OneResultAdapter));
        let base_request = DeepSearchRequest {
            query: "cached query".into(),
            max_results: None,
            providers: None,
            sort_by: SortMethod::Relevance,
            enable_scraping: false,
            max_scrape_urls: None,
            enable_rag: false,
            rag_top_k: None,
            enable_synthesis: true,
            llm_provider: None,
            temperature: None,
            stream: false,
            session_id: None,
            include_history: false,
            enable_multi_hop: false,
            enable_fact_checking: false,
            use_cache: true,
            cache_ttl: None,
        };

        let first = orchestrator.run(base_request.clone()).await.unwrap();
        assert!(!first.cache_hit);

        let second = orchestrator.run(base_request).await.unwrap();
        assert!(second.cache_hit);
    }
}
