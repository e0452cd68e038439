//! Completion endpoint (`/completion`): a thin pass-through to the LLM
//! router, JSON or SSE depending on `stream`.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Serialize;

use deepsearch_core::model::LlmRequest;
use deepsearch_core::rate_limiter::UserTier;
use deepsearch_llm::{GenerationOptions, SelectionStrategy};

use crate::state::AppState;

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

fn select_strategy(request: &LlmRequest) -> SelectionStrategy {
    if let Some(id) = request.preferred_provider {
        return SelectionStrategy::Preferred(id);
    }
    match request.strategy.as_deref() {
        Some("round_robin") => SelectionStrategy::RoundRobin,
        Some("lowest_cost") => SelectionStrategy::LowestCost,
        Some("highest_quality") => SelectionStrategy::HighestQuality,
        Some("random") => SelectionStrategy::Random,
        _ => SelectionStrategy::LeastLatency,
    }
}

pub async fn complete(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<LlmRequest>,
) -> Response {
    if !state.rate_limiter.is_allowed(&addr.ip().to_string(), None, UserTier::Default) {
        return (StatusCode::TOO_MANY_REQUESTS, Json(ErrorBody { message: "rate limit exceeded".into() })).into_response();
    }

    let strategy = select_strategy(&request);
    let options = GenerationOptions {
        temperature: request.temperature,
        max_tokens: request.max_tokens.unwrap_or(1024),
        ..Default::default()
    };

    if request.stream {
        let stream = match state.llm_router.complete_stream(&strategy, &request.messages, &options, request.fallback).await {
            Ok(stream) => stream,
            Err(e) => return (StatusCode::BAD_GATEWAY, Json(ErrorBody { message: e.user_message() })).into_response(),
        };

        let framed = stream.map(|chunk| -> Result<Event, Infallible> {
            let payload = match chunk {
                Ok(c) => serde_json::json!({ "delta": c.delta, "done": c.done }),
                Err(e) => serde_json::json!({ "error": e.user_message() }),
            };
            Ok(Event::default().data(payload.to_string()))
        });

        Sse::new(framed).keep_alive(KeepAlive::default()).into_response()
    } else {
        match state.llm_router.complete(&strategy, &request.messages, &options, request.fallback).await {
            Ok(completion) => Json(completion).into_response(),
            Err(e) => (StatusCode::BAD_GATEWAY, Json(ErrorBody { message: e.user_message() })).into_response(),
        }
    }
}
