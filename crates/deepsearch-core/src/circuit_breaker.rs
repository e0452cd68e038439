//! Circuit Breaker
//!
//! A three-state breaker (closed/open/half-open) guarding any fallible async
//! call. State transitions are guarded by a single short critical section per
//! breaker rather than a lock-free scheme — acceptable per the concurrency
//! model as long as no global lock is shared across breakers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Observable state of a circuit breaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Tunables for a single breaker.
#[derive(Clone, Copy, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `closed` before the breaker opens.
    pub failure_threshold: u32,
    /// Time since the last failure before an `open` breaker admits a probe.
    pub recovery_timeout: Duration,
    /// Consecutive successes in `half_open` before the breaker closes.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    last_failure_time: Option<Instant>,
    last_success_time: Option<Instant>,
}

/// Error returned when a call is rejected by an open breaker, or the
/// wrapped call's own error when it is allowed to run.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    #[error("circuit breaker open")]
    BreakerOpen,
    #[error(transparent)]
    Inner(E),
}

/// Point-in-time snapshot for diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    pub failure_rate: f64,
}

/// Three-state circuit breaker around any fallible async operation.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
}

enum Admission {
    Proceed,
    Reject,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_calls: 0,
                last_failure_time: None,
                last_success_time: None,
            }),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    fn admit(&self) -> Admission {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => Admission::Proceed,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map_or(Duration::MAX, |t| t.elapsed());
                if elapsed >= self.config.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_calls = 1;
                    inner.success_count = 0;
                    Admission::Proceed
                } else {
                    Admission::Reject
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_calls >= self.config.half_open_max_calls {
                    Admission::Reject
                } else {
                    inner.half_open_calls += 1;
                    Admission::Proceed
                }
            }
        }
    }

    fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().unwrap();
        inner.last_success_time = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.half_open_max_calls {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.half_open_calls = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().unwrap();
        inner.last_failure_time = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.half_open_calls = 0;
                inner.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Execute `f` iff the breaker currently admits calls. Any error `f`
    /// returns is recorded as a breaker failure and re-surfaced wrapped in
    /// `CallError::Inner`; a rejected call never invokes `f`.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        match self.admit() {
            Admission::Reject => Err(CallError::BreakerOpen),
            Admission::Proceed => match f().await {
                Ok(value) => {
                    self.record_success();
                    Ok(value)
                }
                Err(err) => {
                    self.record_failure();
                    Err(CallError::Inner(err))
                }
            },
        }
    }

    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock().unwrap();
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let total_failures = self.total_failures.load(Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss)]
        let failure_rate = if total_calls == 0 {
            0.0
        } else {
            total_failures as f64 / total_calls as f64
        };
        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_calls,
            total_failures,
            total_successes: self.total_successes.load(Ordering::Relaxed),
            failure_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, recovery: Duration) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: recovery,
            half_open_max_calls: 2,
        }
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(config(3, Duration::from_millis(50)));
        for _ in 0..3 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CallError::BreakerOpen)));
    }

    #[tokio::test]
    async fn half_open_probe_after_recovery_timeout() {
        let breaker = CircuitBreaker::new(config(1, Duration::from_millis(20)));
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;

        let result = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(config(1, Duration::from_millis(10)));
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        let _ = breaker.call(|| async { Err::<(), _>("boom again") }).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn closes_after_k_successes_in_half_open() {
        let breaker = CircuitBreaker::new(config(1, Duration::from_millis(10)));
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        tokio::time::sleep(Duration::from_millis(15)).await;

        let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        let _ = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
