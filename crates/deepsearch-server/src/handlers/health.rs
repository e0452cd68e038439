//! Health endpoint: rolls up gateway stats into a `HealthReport`.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::State;
use axum::Json;

use deepsearch_core::model::{HealthReport, HealthStatus, ServiceMetrics};

use crate::providers_list::ALL_LLM_PROVIDER_IDS;
use crate::state::AppState;

const STATS_WINDOW: Duration = Duration::from_secs(15 * 60);

pub async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    let gateway = state.metrics.gateway_stats();

    let mut dependencies = HashMap::new();
    for id in ALL_LLM_PROVIDER_IDS {
        dependencies.insert(format!("{id:?}").to_lowercase(), state.llm_router.registry().is_available(id));
    }

    let status = if dependencies.values().all(|healthy| *healthy) {
        HealthStatus::Healthy
    } else if dependencies.values().any(|healthy| *healthy) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    };

    let mut provider_latencies = HashMap::new();
    for id in ALL_LLM_PROVIDER_IDS {
        let label = format!("{id:?}").to_lowercase();
        if let Some(stats) = state.metrics.provider_stats(&label, STATS_WINDOW) {
            provider_latencies.insert(label, stats.avg_response_time_ms);
        }
    }

    Json(HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs_f64(),
        dependencies,
        cache_enabled: state.config.cache_enabled,
        rag_enabled: state.config.rag_enabled,
        metrics: ServiceMetrics {
            total_requests: gateway.total_requests,
            average_latency_ms: gateway.average_latency_ms,
            cache_hit_rate: gateway.cache_hit_rate,
            provider_latencies,
            error_rate: gateway.error_rate,
        },
    })
}
