//! DeepSearch HTTP server
//!
//! Wires every stage crate together behind an axum app: search providers,
//! LLM providers, the crawler/vector-store collaborators, sessions, and the
//! pipeline orchestrator.

mod handlers;
mod providers_list;
mod sse;
mod state;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deepsearch_core::model::LlmProviderId;
use deepsearch_core::session::{MemorySessionStore, SessionStore, SqliteSessionStore};
use deepsearch_core::{Config, MetricsRecorder, RateLimiter};
use deepsearch_llm::registry::{LlmProviderRegistry, ProviderOrdinals};
use deepsearch_llm::router::SelectionStrategy;
use deepsearch_llm::LlmRouter;
use deepsearch_pipeline::{HttpCrawlerClient, HttpVectorStoreClient, InMemoryVectorStore, PipelineOrchestrator, ResponseCache};
use deepsearch_search::adapters::{
    arxiv::ArxivAdapter, brave::BraveAdapter, duckduckgo::DuckDuckGoAdapter, generic_json::GenericJsonAdapter,
    google_cse::GoogleCseAdapter, qwant::QwantAdapter, stackexchange::StackExchangeAdapter, wikipedia::WikipediaAdapter,
    yacy::YacyAdapter,
};
use deepsearch_search::SearchProviderRegistry;

use crate::handlers::{completion, deepsearch, health, providers, sessions};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".into());
    let config = Arc::new(Config::load_or_default(config_path));

    let search_registry = build_search_registry(&config);
    let llm_registry = build_llm_registry();

    let metrics = Arc::new(MetricsRecorder::new(config.metrics_retention_hours));
    let llm_router = Arc::new(LlmRouter::new(llm_registry, metrics.clone()));

    let crawler = build_crawler(&config);
    let vector_store = build_vector_store(&config);
    let session_store = build_session_store(&config);

    let cache = Arc::new(ResponseCache::new(config.cache_default_ttl));
    let rate_limiter = Arc::new(RateLimiter::new());
    spawn_rate_limiter_cleanup(rate_limiter.clone());

    let orchestrator = Arc::new(
        PipelineOrchestrator::new(
            Arc::new(search_registry),
            llm_router.clone(),
            crawler,
            vector_store,
            metrics.clone(),
            cache,
            SelectionStrategy::LeastLatency,
        )
        .with_config(&config)
        .with_session_store(session_store.clone()),
    );

    let state = AppState {
        orchestrator,
        llm_router,
        session_store,
        metrics,
        config: config.clone(),
        rate_limiter,
        started_at: Instant::now(),
    };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/deepsearch", post(deepsearch::run_deepsearch))
        .route("/deepsearch/quick", post(deepsearch::quick_search))
        .route("/sessions", post(sessions::create_session).get(sessions::list_sessions))
        .route("/sessions/{id}", get(sessions::get_session).delete(sessions::delete_session))
        .route("/health", get(health::health_check))
        .route("/completion", post(completion::complete))
        .route("/providers", get(providers::list_providers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("deepsearch server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;

    Ok(())
}

const RATE_LIMITER_CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(600);

fn spawn_rate_limiter_cleanup(rate_limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            rate_limiter.cleanup_idle_buckets();
        }
    });
}

fn build_search_registry(config: &Config) -> SearchProviderRegistry {
    let mut registry = SearchProviderRegistry::new();
    registry.register(Arc::new(WikipediaAdapter::new()), true);
    registry.register(Arc::new(DuckDuckGoAdapter::new()), true);
    registry.register(Arc::new(ArxivAdapter::new()), true);
    registry.register(Arc::new(StackExchangeAdapter::new("stackoverflow")), true);

    if let Some(url) = config.service_urls.get("whoogle") {
        registry.register(
            Arc::new(GenericJsonAdapter::new(deepsearch_core::model::SearchProvider::Whoogle, url.clone(), 0.6)),
            true,
        );
    }
    if let Some(url) = config.service_urls.get("searxng") {
        registry.register(
            Arc::new(GenericJsonAdapter::new(deepsearch_core::model::SearchProvider::Searxng, url.clone(), 0.6)),
            true,
        );
    }
    if let Some(url) = config.service_urls.get("yacy") {
        registry.register(Arc::new(YacyAdapter::new(url.clone())), true);
    }

    if let Ok(key) = std::env::var("BRAVE_API_KEY") {
        registry.register(Arc::new(BraveAdapter::new(key)), true);
    }
    if std::env::var("QWANT_API_KEY").is_ok() {
        registry.register(Arc::new(QwantAdapter::new()), true);
    }
    if let (Ok(key), Ok(cx)) = (std::env::var("GOOGLE_CSE_KEY"), std::env::var("GOOGLE_CSE_CX")) {
        registry.register(Arc::new(GoogleCseAdapter::new(key, cx)), true);
    }

    registry
}

fn build_llm_registry() -> LlmProviderRegistry {
    let mut registry = LlmProviderRegistry::new();

    #[cfg(feature = "ollama")]
    registry.register(
        LlmProviderId::Ollama,
        Arc::new(deepsearch_llm::providers::ollama::OllamaProvider::from_env()),
        ProviderOrdinals { cost: 0, quality: 2 },
    );

    registry.register(
        LlmProviderId::Groq,
        Arc::new(deepsearch_llm::providers::groq::groq_provider_from_env()),
        ProviderOrdinals { cost: 1, quality: 3 },
    );
    registry.register(
        LlmProviderId::Gemini,
        Arc::new(deepsearch_llm::providers::gemini::gemini_provider_from_env()),
        ProviderOrdinals { cost: 2, quality: 5 },
    );

    if let Ok(base_url) = std::env::var("OPENAI_COMPATIBLE_BASE_URL") {
        let api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY").ok();
        registry.register(
            LlmProviderId::OpenaiCompatible,
            Arc::new(deepsearch_llm::providers::openai_compat::OpenAiCompatProvider::new(
                "OpenAI-Compatible",
                base_url,
                api_key,
                vec![],
            )),
            ProviderOrdinals { cost: 1, quality: 3 },
        );
    }

    registry
}

fn build_crawler(config: &Config) -> Arc<HttpCrawlerClient> {
    let base_url = config.service_urls.get("crawler").cloned().unwrap_or_else(|| "http://localhost:8001".into());
    Arc::new(HttpCrawlerClient::new(base_url))
}

fn build_vector_store(config: &Config) -> Arc<dyn deepsearch_pipeline::VectorStoreClient> {
    match config.service_urls.get("vector-store") {
        Some(url) => Arc::new(HttpVectorStoreClient::new(url.clone())),
        None => {
            tracing::warn!("no vector-store service url configured, falling back to the in-memory store");
            Arc::new(InMemoryVectorStore::new())
        }
    }
}

const SESSION_REAP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);

fn build_session_store(config: &Config) -> Arc<dyn SessionStore> {
    if config.sessions_storage == "sqlite" {
        let path = std::env::var("SESSIONS_DB_PATH").unwrap_or_else(|_| "sessions.db".into());
        match SqliteSessionStore::open(&path) {
            Ok(store) => return Arc::new(store),
            Err(e) => tracing::warn!(error = %e, "failed to open sqlite session store, falling back to in-memory"),
        }
    }

    let store = Arc::new(MemorySessionStore::new(config.session_ttl));
    let reaper = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_REAP_INTERVAL);
        loop {
            interval.tick().await;
            reaper.reap_expired();
        }
    });
    store
}
