//! Application State

use std::sync::Arc;
use std::time::Instant;

use deepsearch_core::session::SessionStore;
use deepsearch_core::{Config, MetricsRecorder, RateLimiter};
use deepsearch_llm::LlmRouter;
use deepsearch_pipeline::PipelineOrchestrator;

/// Shared application state, cloned cheaply into every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub llm_router: Arc<LlmRouter>,
    pub session_store: Arc<dyn SessionStore>,
    pub metrics: Arc<MetricsRecorder>,
    pub config: Arc<Config>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}
