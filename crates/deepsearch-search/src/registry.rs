//! Search Provider Registry & Adapters
//!
//! Each adapter is a record of base URL, optional credentials, and the
//! request/response shape translation for one back-end, collapsed behind a
//! single trait so the fan-out stage never special-cases a provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deepsearch_core::model::{SearchProvider, SearchResult};
use deepsearch_core::{CircuitBreaker, CircuitBreakerConfig, CoreError};

/// Uniform contract for a single search back-end.
///
/// Implementations MUST be total with respect to upstream failure: a
/// malformed or unreachable back-end is surfaced as `Err`, never a panic,
/// so the fan-out stage can always record a clean pass/fail outcome.
#[async_trait]
pub trait SearchProviderAdapter: Send + Sync {
    fn provider(&self) -> SearchProvider;

    /// Static per-provider confidence weight, folded into each result's
    /// `confidence` field before ranking.
    fn weight(&self) -> f64;

    async fn query(&self, query: &str, timeout: Duration) -> Result<Vec<SearchResult>, CoreError>;
}

struct RegisteredAdapter {
    adapter: Arc<dyn SearchProviderAdapter>,
    breaker: CircuitBreaker,
    enabled: bool,
}

/// Holds every configured adapter plus its own circuit breaker, so one
/// flaky provider never degrades another's availability.
pub struct SearchProviderRegistry {
    adapters: HashMap<SearchProvider, RegisteredAdapter>,
}

impl SearchProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn SearchProviderAdapter>, enabled: bool) {
        let provider = adapter.provider();
        self.adapters.insert(
            provider,
            RegisteredAdapter {
                adapter,
                breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
                enabled,
            },
        );
    }

    #[must_use]
    pub fn is_available(&self, provider: SearchProvider) -> bool {
        self.adapters
            .get(&provider)
            .is_some_and(|entry| entry.enabled && !entry.breaker.is_open())
    }

    #[must_use]
    pub fn available_providers(&self) -> Vec<SearchProvider> {
        self.adapters
            .iter()
            .filter(|(_, entry)| entry.enabled && !entry.breaker.is_open())
            .map(|(provider, _)| *provider)
            .collect()
    }

    #[must_use]
    pub fn breaker(&self, provider: SearchProvider) -> Option<&CircuitBreaker> {
        self.adapters.get(&provider).map(|entry| &entry.breaker)
    }

    #[must_use]
    pub fn adapter(&self, provider: SearchProvider) -> Option<Arc<dyn SearchProviderAdapter>> {
        self.adapters.get(&provider).map(|entry| entry.adapter.clone())
    }

    /// Query a single provider through its circuit breaker, attaching the
    /// adapter's static weight to every returned result's confidence.
    pub async fn query_provider(
        &self,
        provider: SearchProvider,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>, CoreError> {
        let entry = self
            .adapters
            .get(&provider)
            .ok_or_else(|| CoreError::ProviderUnavailable(provider.to_string()))?;

        if !entry.enabled {
            return Err(CoreError::ProviderUnavailable(format!("{provider} disabled")));
        }

        let adapter = entry.adapter.clone();
        let weight = adapter.weight();
        let result = entry
            .breaker
            .call(|| async move { adapter.query(query, timeout).await })
            .await;

        match result {
            Ok(mut results) => {
                for r in &mut results {
                    r.confidence *= weight;
                }
                Ok(results)
            }
            Err(deepsearch_core::CallError::BreakerOpen) => {
                Err(CoreError::ProviderUnavailable(format!("{provider} circuit open")))
            }
            Err(deepsearch_core::CallError::Inner(err)) => Err(err),
        }
    }
}

impl Default for SearchProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysEmpty;

    #[async_trait]
    impl SearchProviderAdapter for AlwaysEmpty {
        fn provider(&self) -> SearchProvider {
            SearchProvider::Wikipedia
        }
        fn weight(&self) -> f64 {
            1.1
        }
        async fn query(&self, _query: &str, _timeout: Duration) -> Result<Vec<SearchResult>, CoreError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn disabled_provider_is_unavailable() {
        let mut registry = SearchProviderRegistry::new();
        registry.register(Arc::new(AlwaysEmpty), false);
        assert!(!registry.is_available(SearchProvider::Wikipedia));
    }

    #[tokio::test]
    async fn weight_is_applied_to_results() {
        struct OneResult;
        #[async_trait]
        impl SearchProviderAdapter for OneResult {
            fn provider(&self) -> SearchProvider {
                SearchProvider::Wikipedia
            }
            fn weight(&self) -> f64 {
                1.1
            }
            async fn query(&self, _q: &str, _t: Duration) -> Result<Vec<SearchResult>, CoreError> {
                Ok(vec![SearchResult::new("t", "https://en.wikipedia.org/wiki/T", "d", "wikipedia")])
            }
        }

        let mut registry = SearchProviderRegistry::new();
        registry.register(Arc::new(OneResult), true);
        let results = registry
            .query_provider(SearchProvider::Wikipedia, "q", Duration::from_secs(1))
            .await
            .unwrap();
        assert!((results[0].confidence - 1.1).abs() < f64::EPSILON);
    }
}
