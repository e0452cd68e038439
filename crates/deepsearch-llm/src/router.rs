//! LLM Router
//!
//! Picks a provider from the registry according to a selection strategy,
//! drives the call, and retries once on a different provider when the
//! failed one still has headroom in its error streak.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::Stream;

use deepsearch_core::model::LlmMessage;
use deepsearch_core::{CallError, CoreError, MetricsRecorder, Result};

use crate::provider::{Completion, CompletionStream, GenerationOptions, StreamChunk};
use crate::registry::LlmProviderRegistry;
use deepsearch_core::model::LlmProviderId;

const MAX_RETRYABLE_ERROR_STREAK: u32 = 3;
const LATENCY_WINDOW: Duration = Duration::from_secs(15 * 60);

/// How the router picks among the currently-available providers.
#[derive(Clone, Debug)]
pub enum SelectionStrategy {
    Random,
    RoundRobin,
    LeastLatency,
    LowestCost,
    HighestQuality,
    Failover(Vec<LlmProviderId>),
    Preferred(LlmProviderId),
}

/// Drives provider selection and retry over an [`LlmProviderRegistry`].
pub struct LlmRouter {
    registry: Arc<LlmProviderRegistry>,
    metrics: Arc<MetricsRecorder>,
    round_robin_cursor: AtomicUsize,
}

impl LlmRouter {
    #[must_use]
    pub fn new(registry: LlmProviderRegistry, metrics: Arc<MetricsRecorder>) -> Self {
        Self { registry: Arc::new(registry), metrics, round_robin_cursor: AtomicUsize::new(0) }
    }

    #[must_use]
    pub fn registry(&self) -> &LlmProviderRegistry {
        &self.registry
    }

    fn select(&self, strategy: &SelectionStrategy, available: &[LlmProviderId]) -> Option<LlmProviderId> {
        if available.is_empty() {
            return None;
        }
        match strategy {
            SelectionStrategy::Random => {
                #[allow(clippy::cast_possible_truncation)]
                let idx = (rand::random::<u32>() as usize) % available.len();
                Some(available[idx])
            }
            SelectionStrategy::RoundRobin => {
                let idx = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed) % available.len();
                Some(available[idx])
            }
            SelectionStrategy::LeastLatency => available
                .iter()
                .copied()
                .min_by(|a, b| self.avg_latency_ms(*a).total_cmp(&self.avg_latency_ms(*b))),
            SelectionStrategy::LowestCost => available
                .iter()
                .copied()
                .min_by_key(|id| self.registry.ordinals(*id).map_or(u8::MAX, |o| o.cost)),
            SelectionStrategy::HighestQuality => available
                .iter()
                .copied()
                .max_by_key(|id| self.registry.ordinals(*id).map_or(0, |o| o.quality)),
            SelectionStrategy::Failover(order) => order.iter().copied().find(|id| available.contains(id)),
            SelectionStrategy::Preferred(id) => available.contains(id).then_some(*id),
        }
    }

    fn avg_latency_ms(&self, id: LlmProviderId) -> f64 {
        self.metrics
            .provider_stats(&provider_label(id), LATENCY_WINDOW)
            .map_or(f64::MAX, |s| s.avg_response_time_ms)
    }

    /// Runs a non-streaming completion, retrying once on a different
    /// available provider when the original call fails and `fallback` is
    /// set and the failed provider's error streak still allows it.
    pub async fn complete(
        &self,
        strategy: &SelectionStrategy,
        messages: &[LlmMessage],
        options: &GenerationOptions,
        fallback: bool,
    ) -> Result<Completion> {
        let available = self.registry.available_ids();
        let Some(first) = self.select(strategy, &available) else {
            return Err(CoreError::ProviderUnavailable("no available llm provider".into()));
        };

        match self.call_once(first, messages, options).await {
            Ok(completion) => Ok(completion),
            Err(err) if fallback && self.registry.error_streak(first) < MAX_RETRYABLE_ERROR_STREAK => {
                let retry_pool: Vec<LlmProviderId> =
                    available.into_iter().filter(|id| *id != first).collect();
                match self.select(strategy, &retry_pool) {
                    Some(second) => self.call_once(second, messages, options).await,
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Runs a streaming completion, retrying once on a different provider
    /// only if establishing the stream itself fails. Once the stream has
    /// started yielding chunks downstream, no retry happens on a later
    /// chunk-level error — partial output is never retried.
    pub async fn complete_stream(
        &self,
        strategy: &SelectionStrategy,
        messages: &[LlmMessage],
        options: &GenerationOptions,
        fallback: bool,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        let available = self.registry.available_ids();
        let Some(first) = self.select(strategy, &available) else {
            return Err(CoreError::ProviderUnavailable("no available llm provider".into()));
        };

        match self.start_stream(first, messages, options).await {
            Ok(stream) => Ok(stream),
            Err(err) if fallback && self.registry.error_streak(first) < MAX_RETRYABLE_ERROR_STREAK => {
                let retry_pool: Vec<LlmProviderId> = available.into_iter().filter(|id| *id != first).collect();
                match self.select(strategy, &retry_pool) {
                    Some(second) => self.start_stream(second, messages, options).await,
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn start_stream(
        &self,
        id: LlmProviderId,
        messages: &[LlmMessage],
        options: &GenerationOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        let provider = self
            .registry
            .provider(id)
            .ok_or_else(|| CoreError::ProviderUnavailable(format!("{id:?} not registered")))?;
        let breaker = self
            .registry
            .breaker(id)
            .ok_or_else(|| CoreError::ProviderUnavailable(format!("{id:?} not registered")))?;

        self.registry.acquire_in_flight(id);
        let started = Instant::now();
        let result = breaker.call(|| async move { provider.complete_stream(messages, options).await }).await;
        let inner = match result {
            Ok(stream) => stream,
            Err(CallError::BreakerOpen) => {
                self.registry.release_in_flight(id);
                self.registry.record_failure(id);
                self.metrics.record_request(
                    provider_label(id),
                    started.elapsed(),
                    false,
                    Some("circuit_open".to_string()),
                    None,
                    Some(options.model.clone()),
                );
                return Err(CoreError::ProviderUnavailable(format!("{id:?} circuit open")));
            }
            Err(CallError::Inner(e)) => {
                self.registry.release_in_flight(id);
                self.registry.record_failure(id);
                self.metrics.record_request(
                    provider_label(id),
                    started.elapsed(),
                    false,
                    Some(error_kind(&e)),
                    None,
                    Some(options.model.clone()),
                );
                return Err(e);
            }
        };

        // Bookkeeping is finalized when the stream is fully drained or
        // dropped: a guard decrements in-flight and records the outcome on
        // drop so a client disconnect mid-stream still restores counters.
        Ok(Box::pin(GuardedStream {
            inner,
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            id,
            started,
            model: options.model.clone(),
            saw_error: false,
        }))
    }

    async fn call_once(
        &self,
        id: LlmProviderId,
        messages: &[LlmMessage],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let provider = self
            .registry
            .provider(id)
            .ok_or_else(|| CoreError::ProviderUnavailable(format!("{id:?} not registered")))?;
        let breaker = self
            .registry
            .breaker(id)
            .ok_or_else(|| CoreError::ProviderUnavailable(format!("{id:?} not registered")))?;

        self.registry.acquire_in_flight(id);
        let started = Instant::now();
        let result = breaker.call(|| async move { provider.complete(messages, options).await }).await;
        self.registry.release_in_flight(id);

        let label = provider_label(id);
        match &result {
            Ok(_) => {
                self.registry.record_success(id);
                self.metrics.record_request(label, started.elapsed(), true, None, None, Some(options.model.clone()));
            }
            Err(CallError::BreakerOpen) => {
                self.registry.record_failure(id);
                self.metrics.record_request(
                    label,
                    started.elapsed(),
                    false,
                    Some("circuit_open".to_string()),
                    None,
                    Some(options.model.clone()),
                );
            }
            Err(CallError::Inner(e)) => {
                self.registry.record_failure(id);
                self.metrics.record_request(
                    label,
                    started.elapsed(),
                    false,
                    Some(error_kind(e)),
                    None,
                    Some(options.model.clone()),
                );
            }
        }
        result.map_err(|e| match e {
            CallError::BreakerOpen => CoreError::ProviderUnavailable(format!("{id:?} circuit open")),
            CallError::Inner(e) => e,
        })
    }
}

/// Wraps a provider's [`CompletionStream`], decrementing the provider's
/// in-flight counter and recording a success/failure metric sample exactly
/// once when the stream finishes draining or is dropped early (client
/// disconnect or cancellation).
struct GuardedStream {
    inner: CompletionStream,
    registry: Arc<LlmProviderRegistry>,
    metrics: Arc<MetricsRecorder>,
    id: LlmProviderId,
    started: Instant,
    model: String,
    saw_error: bool,
}

impl Stream for GuardedStream {
    type Item = Result<StreamChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Err(e))) => {
                this.saw_error = true;
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl Drop for GuardedStream {
    fn drop(&mut self) {
        self.registry.release_in_flight(self.id);
        if self.saw_error {
            self.registry.record_failure(self.id);
        } else {
            self.registry.record_success(self.id);
        }
        self.metrics.record_request(
            provider_label(self.id),
            self.started.elapsed(),
            !self.saw_error,
            self.saw_error.then(|| "stream_error".to_string()),
            None,
            Some(self.model.clone()),
        );
    }
}

fn provider_label(id: LlmProviderId) -> String {
    format!("{id:?}").to_lowercase()
}

fn error_kind(err: &CoreError) -> String {
    match err {
        CoreError::ProviderUnavailable(_) => "provider_unavailable".into(),
        CoreError::ProviderTimeout(_) => "provider_timeout".into(),
        CoreError::ProviderProtocolError(_) => "provider_protocol_error".into(),
        CoreError::UpstreamDependencyDown(_) => "upstream_dependency_down".into(),
        CoreError::RateLimited(_) => "rate_limited".into(),
        _ => "other".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{LlmProvider, ModelInfo, ProviderInfo};
    use crate::registry::ProviderOrdinals;
    use async_trait::async_trait;

    struct Echo(&'static str);

    #[async_trait]
    impl LlmProvider for Echo {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo {
                name: self.0.into(),
                version: None,
                models: vec![],
                supports_streaming: false,
                supports_tools: false,
            })
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        async fn complete(&self, _: &[LlmMessage], options: &GenerationOptions) -> Result<Completion> {
            Ok(Completion {
                content: self.0.to_string(),
                model: options.model.clone(),
                usage: None,
                truncated: false,
                finish_reason: None,
            })
        }
        async fn complete_stream(
            &self,
            _: &[LlmMessage],
            _: &GenerationOptions,
        ) -> Result<crate::provider::CompletionStream> {
            Err(CoreError::ProviderProtocolError("streaming not supported by this stub".into()))
        }
        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    fn router_with_two_providers() -> LlmRouter {
        let mut registry = LlmProviderRegistry::new();
        registry.register(
            LlmProviderId::Ollama,
            std::sync::Arc::new(Echo("ollama")),
            ProviderOrdinals { cost: 0, quality: 1 },
        );
        registry.register(
            LlmProviderId::Gemini,
            std::sync::Arc::new(Echo("gemini")),
            ProviderOrdinals { cost: 3, quality: 5 },
        );
        LlmRouter::new(registry, std::sync::Arc::new(MetricsRecorder::new(24)))
    }

    #[tokio::test]
    async fn preferred_strategy_picks_named_provider() {
        let router = router_with_two_providers();
        let completion = router
            .complete(
                &SelectionStrategy::Preferred(LlmProviderId::Gemini),
                &[],
                &GenerationOptions::default(),
                false,
            )
            .await
            .unwrap();
        assert_eq!(completion.content, "gemini");
    }

    #[tokio::test]
    async fn lowest_cost_strategy_picks_cheaper_provider() {
        let router = router_with_two_providers();
        let completion = router
            .complete(&SelectionStrategy::LowestCost, &[], &GenerationOptions::default(), false)
            .await
            .unwrap();
        assert_eq!(completion.content, "ollama");
    }

    #[tokio::test]
    async fn highest_quality_strategy_picks_better_provider() {
        let router = router_with_two_providers();
        let completion = router
            .complete(&SelectionStrategy::HighestQuality, &[], &GenerationOptions::default(), false)
            .await
            .unwrap();
        assert_eq!(completion.content, "gemini");
    }

    #[tokio::test]
    async fn complete_stream_releases_in_flight_after_failed_establishment() {
        let router = router_with_two_providers();
        let result = router
            .complete_stream(&SelectionStrategy::Preferred(LlmProviderId::Gemini), &[], &GenerationOptions::default(), false)
            .await;
        assert!(result.is_err());
        assert_eq!(router.registry().in_flight(LlmProviderId::Gemini), 0);
    }

    struct AlwaysFails;

    #[async_trait]
    impl LlmProvider for AlwaysFails {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo { name: "always-fails".into(), version: None, models: vec![], supports_streaming: false, supports_tools: false })
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
        async fn complete(&self, _: &[LlmMessage], _: &GenerationOptions) -> Result<Completion> {
            Err(CoreError::ProviderProtocolError("boom".into()))
        }
        async fn complete_stream(&self, _: &[LlmMessage], _: &GenerationOptions) -> Result<crate::provider::CompletionStream> {
            Err(CoreError::ProviderProtocolError("boom".into()))
        }
        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn repeated_failures_trip_the_circuit_breaker_out_of_selection() {
        let mut registry = LlmProviderRegistry::new();
        registry.register(LlmProviderId::Ollama, std::sync::Arc::new(AlwaysFails), ProviderOrdinals { cost: 0, quality: 1 });
        let router = LlmRouter::new(registry, std::sync::Arc::new(MetricsRecorder::new(24)));

        for _ in 0..5 {
            let _ = router
                .complete(&SelectionStrategy::Preferred(LlmProviderId::Ollama), &[], &GenerationOptions::default(), false)
                .await;
        }
        assert!(!router.registry().is_available(LlmProviderId::Ollama));

        let err = router
            .complete(&SelectionStrategy::Preferred(LlmProviderId::Ollama), &[], &GenerationOptions::default(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no available llm provider"));
    }

    #[tokio::test]
    async fn failover_strategy_honors_preference_order() {
        let router = router_with_two_providers();
        let completion = router
            .complete(
                &SelectionStrategy::Failover(vec![LlmProviderId::Gemini, LlmProviderId::Ollama]),
                &[],
                &GenerationOptions::default(),
                false,
            )
            .await
            .unwrap();
        assert_eq!(completion.content, "gemini");
    }
}
