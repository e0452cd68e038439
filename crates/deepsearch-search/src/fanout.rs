//! Search Fan-out
//!
//! Concurrent dispatch across every enabled, non-breaker-open provider,
//! with independent success/failure gathering, per-provider metrics, and
//! first-occurrence-wins deduplication by canonical URL.

use std::collections::HashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::MetricsRecorder;

use crate::registry::SearchProviderRegistry;

/// Outcome of one fan-out round: deduplicated, weighted results plus any
/// per-provider failure reasons (not fatal — a failed provider simply
/// contributes nothing to `results`).
#[derive(Debug, Default)]
pub struct FanoutOutcome {
    pub results: Vec<SearchResult>,
    pub provider_errors: HashMap<SearchProvider, String>,
}

/// Run every provider in `providers` concurrently against `query`, bounded
/// by `timeout` per call. A provider returning zero results is recorded as
/// a success; only a transport/protocol/breaker-open failure counts as an
/// error. The orchestrator never waits past `timeout`: `tokio::time::timeout`
/// inside each adapter call ensures a straggler is abandoned, not awaited.
pub async fn fan_out(
    registry: &SearchProviderRegistry,
    metrics: &MetricsRecorder,
    providers: &[SearchProvider],
    query: &str,
    timeout: Duration,
) -> FanoutOutcome {
    let calls = providers.iter().map(|&provider| {
        let query = query.to_string();
        async move {
            let started = Instant::now();
            let outcome = registry.query_provider(provider, &query, timeout).await;
            (provider, outcome, started.elapsed())
        }
    });

    let completed = futures::future::join_all(calls).await;

    let mut outcome = FanoutOutcome::default();
    let mut seen_urls: HashSet<String> = HashSet::new();

    for (provider, result, elapsed) in completed {
        match result {
            Ok(results) => {
                metrics.record_request(provider.to_string(), elapsed, true, None, None, None);
                for r in results {
                    if r.url.is_empty() || !seen_urls.insert(r.url.clone()) {
                        continue;
                    }
                    outcome.results.push(r);
                }
            }
            Err(err) => {
                metrics.record_request(
                    provider.to_string(),
                    elapsed,
                    false,
                    Some(error_kind(&err)),
                    None,
                    None,
                );
                outcome.provider_errors.insert(provider, err.to_string());
            }
        }
    }

    outcome
}

fn error_kind(err: &deepsearch_core::CoreError) -> String {
    match err {
        deepsearch_core::CoreError::ProviderUnavailable(_) => "unavailable".to_string(),
        deepsearch_core::CoreError::ProviderTimeout(_) => "timeout".to_string(),
        deepsearch_core::CoreError::ProviderProtocolError(_) => "protocol".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SearchProviderAdapter;
    use async_trait::async_trait;
    use deepsearch_core::CoreError;
    use std::sync::Arc;

    struct Fixed {
        provider: SearchProvider,
        urls: Vec<&'static str>,
    }

    #[async_trait]
    impl SearchProviderAdapter for Fixed {
        fn provider(&self) -> SearchProvider {
            self.provider
        }
        fn weight(&self) -> f64 {
            1.0
        }
        async fn query(&self, _q: &str, _t: Duration) -> Result<Vec<SearchResult>, CoreError> {
            Ok(self
                .urls
                .iter()
                .map(|u| SearchResult::new("t", *u, "d", self.provider.to_string()))
                .collect())
        }
    }

    #[tokio::test]
    async fn deduplicates_by_url_keeping_first_occurrence() {
        let mut registry = SearchProviderRegistry::new();
        registry.register(
            Arc::new(Fixed {
                provider: SearchProvider::Wikipedia,
                urls: vec!["https://a.example", "https://b.example"],
            }),
            true,
        );
        registry.register(
            Arc::new(Fixed {
                provider: SearchProvider::Duckduckgo,
                urls: vec!["https://a.example", "https://c.example"],
            }),
            true,
        );

        let metrics = MetricsRecorder::new(24);
        let outcome = fan_out(
            &registry,
            &metrics,
            &[SearchProvider::Wikipedia, SearchProvider::Duckduckgo],
            "q",
            Duration::from_secs(1),
        )
        .await;

        let urls: Vec<&str> = outcome.results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls.iter().filter(|u| **u == "https://a.example").count(), 1);
        assert_eq!(outcome.results.len(), 3);
    }
}
