//! LLM Provider Registry
//!
//! Holds every configured adapter behind its own circuit breaker, in-flight
//! counter, and static cost/quality ordinal so the router can select among
//! them without touching any provider-specific code.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use deepsearch_core::model::LlmProviderId;
use deepsearch_core::{CircuitBreaker, CircuitBreakerConfig};

use crate::provider::LlmProvider;

/// Lower is cheaper / lower quality; ordinals are relative, not absolute units.
#[derive(Clone, Copy, Debug)]
pub struct ProviderOrdinals {
    pub cost: u8,
    pub quality: u8,
}

struct Entry {
    provider: Arc<dyn LlmProvider>,
    breaker: CircuitBreaker,
    ordinals: ProviderOrdinals,
    in_flight: AtomicU32,
    error_streak: AtomicU32,
}

/// Holds every configured LLM adapter.
pub struct LlmProviderRegistry {
    entries: HashMap<LlmProviderId, Entry>,
}

impl LlmProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn register(&mut self, id: LlmProviderId, provider: Arc<dyn LlmProvider>, ordinals: ProviderOrdinals) {
        self.entries.insert(
            id,
            Entry {
                provider,
                breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
                ordinals,
                in_flight: AtomicU32::new(0),
                error_streak: AtomicU32::new(0),
            },
        );
    }

    #[must_use]
    pub fn provider(&self, id: LlmProviderId) -> Option<Arc<dyn LlmProvider>> {
        self.entries.get(&id).map(|e| e.provider.clone())
    }

    #[must_use]
    pub fn ordinals(&self, id: LlmProviderId) -> Option<ProviderOrdinals> {
        self.entries.get(&id).map(|e| e.ordinals)
    }

    #[must_use]
    pub fn is_available(&self, id: LlmProviderId) -> bool {
        self.entries.get(&id).is_some_and(|e| !e.breaker.is_open())
    }

    #[must_use]
    pub fn available_ids(&self) -> Vec<LlmProviderId> {
        self.entries.iter().filter(|(_, e)| !e.breaker.is_open()).map(|(id, _)| *id).collect()
    }

    #[must_use]
    pub fn breaker(&self, id: LlmProviderId) -> Option<&CircuitBreaker> {
        self.entries.get(&id).map(|e| &e.breaker)
    }

    #[must_use]
    pub fn error_streak(&self, id: LlmProviderId) -> u32 {
        self.entries.get(&id).map_or(0, |e| e.error_streak.load(Ordering::Relaxed))
    }

    /// Increment the in-flight counter; callers MUST pair this with
    /// `release_in_flight` on every exit path (success, error, or panic
    /// unwind via a guard), per the router's concurrency invariant.
    pub fn acquire_in_flight(&self, id: LlmProviderId) {
        if let Some(e) = self.entries.get(&id) {
            e.in_flight.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn release_in_flight(&self, id: LlmProviderId) {
        if let Some(e) = self.entries.get(&id) {
            e.in_flight.fetch_sub(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn in_flight(&self, id: LlmProviderId) -> u32 {
        self.entries.get(&id).map_or(0, |e| e.in_flight.load(Ordering::Relaxed))
    }

    pub fn record_success(&self, id: LlmProviderId) {
        if let Some(e) = self.entries.get(&id) {
            e.error_streak.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self, id: LlmProviderId) {
        if let Some(e) = self.entries.get(&id) {
            e.error_streak.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for LlmProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepsearch_core::model::LlmMessage;
    use deepsearch_core::Result;

    struct Stub;

    #[async_trait]
    impl LlmProvider for Stub {
        async fn info(&self) -> Result<crate::provider::ProviderInfo> {
            unimplemented!()
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        async fn complete(&self, _: &[LlmMessage], _: &crate::provider::GenerationOptions) -> Result<crate::provider::Completion> {
            unimplemented!()
        }
        async fn complete_stream(
            &self,
            _: &[LlmMessage],
            _: &crate::provider::GenerationOptions,
        ) -> Result<crate::provider::CompletionStream> {
            unimplemented!()
        }
        async fn list_models(&self) -> Result<Vec<crate::provider::ModelInfo>> {
            Ok(vec![])
        }
    }

    #[test]
    fn in_flight_counter_tracks_acquire_and_release() {
        let mut registry = LlmProviderRegistry::new();
        registry.register(LlmProviderId::Ollama, Arc::new(Stub), ProviderOrdinals { cost: 0, quality: 2 });

        registry.acquire_in_flight(LlmProviderId::Ollama);
        registry.acquire_in_flight(LlmProviderId::Ollama);
        assert_eq!(registry.in_flight(LlmProviderId::Ollama), 2);

        registry.release_in_flight(LlmProviderId::Ollama);
        assert_eq!(registry.in_flight(LlmProviderId::Ollama), 1);
    }

    #[test]
    fn error_streak_resets_on_success() {
        let mut registry = LlmProviderRegistry::new();
        registry.register(LlmProviderId::Groq, Arc::new(Stub), ProviderOrdinals { cost: 1, quality: 1 });

        registry.record_failure(LlmProviderId::Groq);
        registry.record_failure(LlmProviderId::Groq);
        assert_eq!(registry.error_streak(LlmProviderId::Groq), 2);

        registry.record_success(LlmProviderId::Groq);
        assert_eq!(registry.error_streak(LlmProviderId::Groq), 0);
    }
}
