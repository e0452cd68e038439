//! The streaming and non-streaming DeepSearch endpoints.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use deepsearch_core::model::{DeepSearchRequest, DeepSearchResponse, QuickSearchRequest, SortMethod};
use deepsearch_core::rate_limiter::UserTier;

use crate::sse::pipeline_sse;
use crate::state::AppState;

fn rate_limited() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, Json(serde_json::json!({ "message": "rate limit exceeded" }))).into_response()
}

/// `POST /deepsearch`: SSE stream when `request.stream` is set, otherwise a
/// single buffered JSON response built from the same pipeline run.
pub async fn run_deepsearch(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<DeepSearchRequest>,
) -> Response {
    if !state.rate_limiter.is_allowed(&addr.ip().to_string(), None, UserTier::Default) {
        return rate_limited();
    }

    if request.stream {
        let stream = state.orchestrator.run_stream(request);
        return pipeline_sse(stream).into_response();
    }

    match state.orchestrator.run(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "message": e.user_message() }))).into_response(),
    }
}

/// `POST /deepsearch/quick`: search and rank only, no scrape/RAG/synthesis
/// round trip; `answer` carries the fixed disabled-synthesis string.
pub async fn quick_search(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<QuickSearchRequest>,
) -> Result<Json<DeepSearchResponse>, (StatusCode, Json<serde_json::Value>)> {
    if !state.rate_limiter.is_allowed(&addr.ip().to_string(), None, UserTier::Default) {
        return Err((StatusCode::TOO_MANY_REQUESTS, Json(serde_json::json!({ "message": "rate limit exceeded" }))));
    }

    let deep_request = DeepSearchRequest {
        query: request.query,
        max_results: Some(request.max_results),
        providers: None,
        sort_by: SortMethod::Relevance,
        enable_scraping: false,
        max_scrape_urls: None,
        enable_rag: false,
        rag_top_k: None,
        enable_synthesis: false,
        llm_provider: None,
        temperature: None,
        stream: false,
        session_id: request.session_id,
        include_history: false,
        enable_multi_hop: false,
        enable_fact_checking: false,
        use_cache: true,
        cache_ttl: None,
    };

    state
        .orchestrator
        .run(deep_request)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "message": e.user_message() }))))
}
