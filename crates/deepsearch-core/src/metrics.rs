//! Metrics Recorder
//!
//! Fixed-capacity ring buffers of recent requests plus per-provider
//! throughput samples, with percentile reporting.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

const REQUEST_HISTORY_CAPACITY: usize = 10_000;
const RESPONSE_TIME_SAMPLE_CAPACITY: usize = 1_000;

/// A single recorded request outcome.
#[derive(Clone, Debug)]
pub struct RequestSample {
    pub at: Instant,
    pub provider: String,
    pub response_time: Duration,
    pub success: bool,
    pub error_type: Option<String>,
    pub tokens_used: Option<u32>,
    pub model: Option<String>,
}

#[derive(Default)]
struct ProviderMetrics {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    response_times: VecDeque<Duration>,
    error_types: HashMap<String, u64>,
}

struct Inner {
    history: VecDeque<RequestSample>,
    per_provider: HashMap<String, ProviderMetrics>,
    cache_hits: u64,
    cache_misses: u64,
    rate_limit_hits: u64,
    circuit_breaker_triggers: u64,
    start: Instant,
    retention: Duration,
}

/// Percentile/aggregate report over a trailing window.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderStats {
    pub total_requests: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub avg_response_time_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub requests_per_minute: f64,
    pub error_breakdown: HashMap<String, u64>,
}

/// Gateway-wide rollup, surfaced at `/health`.
#[derive(Clone, Debug, Serialize)]
pub struct GatewayStats {
    pub total_requests: u64,
    pub total_errors: u64,
    pub uptime_seconds: f64,
    pub cache_hit_rate: f64,
    pub rate_limit_hits: u64,
    pub circuit_breaker_triggers: u64,
    pub average_latency_ms: f64,
    pub error_rate: f64,
}

/// Thread-safe metrics recorder with bounded memory.
pub struct MetricsRecorder {
    inner: Mutex<Inner>,
}

impl MetricsRecorder {
    #[must_use]
    pub fn new(retention_hours: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                history: VecDeque::with_capacity(REQUEST_HISTORY_CAPACITY),
                per_provider: HashMap::new(),
                cache_hits: 0,
                cache_misses: 0,
                rate_limit_hits: 0,
                circuit_breaker_triggers: 0,
                start: Instant::now(),
                retention: Duration::from_secs(retention_hours * 3600),
            }),
        }
    }

    pub fn record_request(
        &self,
        provider: impl Into<String>,
        response_time: Duration,
        success: bool,
        error_type: Option<String>,
        tokens_used: Option<u32>,
        model: Option<String>,
    ) {
        let provider = provider.into();
        let mut inner = self.inner.lock().unwrap();

        if inner.history.len() >= REQUEST_HISTORY_CAPACITY {
            inner.history.pop_front();
        }
        inner.history.push_back(RequestSample {
            at: Instant::now(),
            provider: provider.clone(),
            response_time,
            success,
            error_type: error_type.clone(),
            tokens_used,
            model,
        });

        let entry = inner.per_provider.entry(provider).or_default();
        entry.total_requests += 1;
        if success {
            entry.successful_requests += 1;
        } else {
            entry.failed_requests += 1;
            if let Some(kind) = error_type {
                *entry.error_types.entry(kind).or_insert(0) += 1;
            }
        }
        if entry.response_times.len() >= RESPONSE_TIME_SAMPLE_CAPACITY {
            entry.response_times.pop_front();
        }
        entry.response_times.push_back(response_time);
    }

    pub fn record_cache_hit(&self) {
        self.inner.lock().unwrap().cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.inner.lock().unwrap().cache_misses += 1;
    }

    pub fn record_rate_limit_hit(&self) {
        self.inner.lock().unwrap().rate_limit_hits += 1;
    }

    pub fn record_circuit_breaker_trigger(&self) {
        self.inner.lock().unwrap().circuit_breaker_triggers += 1;
    }

    /// Per-provider percentile report over the last `window` minutes.
    #[must_use]
    pub fn provider_stats(&self, provider: &str, window: Duration) -> Option<ProviderStats> {
        let inner = self.inner.lock().unwrap();
        let metrics = inner.per_provider.get(provider)?;
        let cutoff = Instant::now().checked_sub(window);
        let recent: Vec<Duration> = inner
            .history
            .iter()
            .filter(|s| s.provider == provider && cutoff.is_none_or(|c| s.at >= c))
            .map(|s| s.response_time)
            .collect();

        let total = metrics.total_requests;
        Some(ProviderStats {
            total_requests: total,
            success_rate: safe_divide(metrics.successful_requests, total),
            error_rate: safe_divide(metrics.failed_requests, total),
            avg_response_time_ms: mean_ms(&metrics.response_times),
            p50_ms: percentile_ms(&metrics.response_times, 0.50),
            p95_ms: percentile_ms(&metrics.response_times, 0.95),
            p99_ms: percentile_ms(&metrics.response_times, 0.99),
            requests_per_minute: requests_per_minute(&recent, window),
            error_breakdown: metrics.error_types.clone(),
        })
    }

    #[must_use]
    pub fn gateway_stats(&self) -> GatewayStats {
        let inner = self.inner.lock().unwrap();
        let total_requests: u64 = inner.per_provider.values().map(|p| p.total_requests).sum();
        let total_errors: u64 = inner.per_provider.values().map(|p| p.failed_requests).sum();
        let all_times: Vec<Duration> = inner
            .per_provider
            .values()
            .flat_map(|p| p.response_times.iter().copied())
            .collect();

        GatewayStats {
            total_requests,
            total_errors,
            uptime_seconds: inner.start.elapsed().as_secs_f64(),
            cache_hit_rate: safe_divide(inner.cache_hits, inner.cache_hits + inner.cache_misses),
            rate_limit_hits: inner.rate_limit_hits,
            circuit_breaker_triggers: inner.circuit_breaker_triggers,
            average_latency_ms: mean_ms(&all_times),
            error_rate: safe_divide(total_errors, total_requests),
        }
    }

    /// Drop history and per-provider samples older than the configured
    /// retention window. Intended to run on a periodic background task.
    pub fn cleanup_expired(&self) {
        let mut inner = self.inner.lock().unwrap();
        let retention = inner.retention;
        let cutoff = Instant::now().checked_sub(retention);
        if let Some(cutoff) = cutoff {
            inner.history.retain(|s| s.at >= cutoff);
        }
    }
}

fn safe_divide(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let ratio = numerator as f64 / denominator as f64;
        ratio
    }
}

fn mean_ms(samples: &VecDeque<Duration>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let total: f64 = samples.iter().map(Duration::as_secs_f64).sum::<f64>() * 1000.0;
    total / samples.len() as f64
}

fn percentile_ms(samples: &VecDeque<Duration>, p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let idx = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn requests_per_minute(recent: &[Duration], window: Duration) -> f64 {
    let minutes = window.as_secs_f64() / 60.0;
    if minutes <= 0.0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = recent.len() as f64;
    count / minutes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_divide_handles_zero_denominator() {
        assert_eq!(safe_divide(0, 0), 0.0);
        assert_eq!(safe_divide(5, 10), 0.5);
    }

    #[test]
    fn records_and_reports_provider_stats() {
        let recorder = MetricsRecorder::new(24);
        recorder.record_request("wikipedia", Duration::from_millis(100), true, None, None, None);
        recorder.record_request("wikipedia", Duration::from_millis(200), false, Some("timeout".into()), None, None);

        let stats = recorder.provider_stats("wikipedia", Duration::from_secs(60)).unwrap();
        assert_eq!(stats.total_requests, 2);
        assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.error_breakdown.get("timeout"), Some(&1));
    }

    #[test]
    fn gateway_stats_aggregate_across_providers() {
        let recorder = MetricsRecorder::new(24);
        recorder.record_request("a", Duration::from_millis(50), true, None, None, None);
        recorder.record_request("b", Duration::from_millis(150), false, Some("500".into()), None, None);
        let stats = recorder.gateway_stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_errors, 1);
    }
}
