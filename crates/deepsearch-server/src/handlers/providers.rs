//! Providers endpoint: the live `ProviderStatus` map for every registered
//! LLM provider.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::State;
use axum::Json;

use deepsearch_core::model::ProviderStatus;

use crate::providers_list::ALL_LLM_PROVIDER_IDS;
use crate::state::AppState;

const STATS_WINDOW: Duration = Duration::from_secs(15 * 60);

pub async fn list_providers(State(state): State<AppState>) -> Json<HashMap<String, ProviderStatus>> {
    let registry = state.llm_router.registry();
    let mut statuses = HashMap::new();

    for id in ALL_LLM_PROVIDER_IDS {
        let Some(breaker) = registry.breaker(id) else { continue };
        let label = format!("{id:?}").to_lowercase();
        let stats = state.metrics.provider_stats(&label, STATS_WINDOW);

        statuses.insert(
            label,
            ProviderStatus {
                available: registry.is_available(id),
                healthy: registry.error_streak(id) == 0,
                average_latency_ms: stats.as_ref().map_or(0.0, |s| s.avg_response_time_ms),
                error_rate: stats.as_ref().map_or(0.0, |s| s.error_rate),
                last_success: None,
                last_error: None,
                circuit_breaker_open: breaker.is_open(),
                active_requests: registry.in_flight(id),
            },
        );
    }

    Json(statuses)
}
