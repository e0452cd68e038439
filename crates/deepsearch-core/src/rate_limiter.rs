//! Rate Limiter
//!
//! Two-layer admission control: global + per-provider sliding windows, plus a
//! per-user token bucket selected by tier.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// A continuously-refilling token bucket.
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    #[must_use]
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Attempt to consume `n` tokens; returns false (no mutation on the
    /// rejected path beyond the refill catch-up) if insufficient tokens.
    pub fn consume(&mut self, n: f64) -> bool {
        self.refill();
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn is_full(&mut self) -> bool {
        self.refill();
        self.tokens >= self.capacity - f64::EPSILON
    }

    #[must_use]
    pub fn idle_since(&self) -> Duration {
        self.last_refill.elapsed()
    }
}

/// Counts admissions within a trailing time window.
pub struct SlidingWindow {
    window: Duration,
    max_requests: usize,
    timestamps: VecDeque<Instant>,
}

impl SlidingWindow {
    #[must_use]
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            timestamps: VecDeque::new(),
        }
    }

    fn evict_old(&mut self, now: Instant) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit iff fewer than `max_requests` remain within the window.
    pub fn is_allowed(&mut self) -> bool {
        let now = Instant::now();
        self.evict_old(now);
        if self.timestamps.len() < self.max_requests {
            self.timestamps.push_back(now);
            true
        } else {
            false
        }
    }
}

/// User tier determining token bucket shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Default,
    Premium,
    Enterprise,
}

impl UserTier {
    #[must_use]
    pub fn capacity_and_rate(self) -> (f64, f64) {
        match self {
            UserTier::Default => (100.0, 1.0),
            UserTier::Premium => (500.0, 5.0),
            UserTier::Enterprise => (1000.0, 10.0),
        }
    }
}

struct UserBucketEntry {
    bucket: TokenBucket,
}

/// Combined global + per-provider + per-user admission control.
pub struct RateLimiter {
    global_per_second: Mutex<SlidingWindow>,
    global_per_minute: Mutex<SlidingWindow>,
    provider_windows: Mutex<HashMap<String, (SlidingWindow, SlidingWindow)>>,
    user_buckets: Mutex<HashMap<String, UserBucketEntry>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            global_per_second: Mutex::new(SlidingWindow::new(Duration::from_secs(1), 50)),
            global_per_minute: Mutex::new(SlidingWindow::new(Duration::from_secs(60), 1000)),
            provider_windows: Mutex::new(HashMap::new()),
            user_buckets: Mutex::new(HashMap::new()),
        }
    }

    fn provider_limits() -> (usize, usize) {
        // (requests_per_second, requests_per_minute)
        (10, 200)
    }

    /// Check all three layers in order: global, per-provider, per-user.
    /// Short-circuits on the first layer that denies.
    pub fn is_allowed(&self, user_id: &str, provider: Option<&str>, tier: UserTier) -> bool {
        if !self.global_per_second.lock().unwrap().is_allowed() {
            return false;
        }
        if !self.global_per_minute.lock().unwrap().is_allowed() {
            return false;
        }

        if let Some(provider) = provider {
            let mut providers = self.provider_windows.lock().unwrap();
            let (per_sec, per_min) = providers.entry(provider.to_string()).or_insert_with(|| {
                let (s, m) = Self::provider_limits();
                (
                    SlidingWindow::new(Duration::from_secs(1), s),
                    SlidingWindow::new(Duration::from_secs(60), m),
                )
            });
            if !per_sec.is_allowed() || !per_min.is_allowed() {
                return false;
            }
        }

        let mut buckets = self.user_buckets.lock().unwrap();
        let entry = buckets.entry(user_id.to_string()).or_insert_with(|| {
            let (capacity, rate) = tier.capacity_and_rate();
            UserBucketEntry {
                bucket: TokenBucket::new(capacity, rate),
            }
        });
        entry.bucket.consume(1.0)
    }

    /// Remove user buckets that have been idle and fully refilled for over
    /// an hour. Intended to run on a periodic background task.
    pub fn cleanup_idle_buckets(&self) {
        let mut buckets = self.user_buckets.lock().unwrap();
        buckets.retain(|_, entry| {
            !(entry.bucket.is_full() && entry.bucket.idle_since() > Duration::from_secs(3600))
        });
    }

    #[must_use]
    pub fn tracked_user_count(&self) -> usize {
        self.user_buckets.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_refills_up_to_capacity() {
        let mut bucket = TokenBucket::new(10.0, 100.0);
        assert!(bucket.consume(10.0));
        assert!(!bucket.consume(1.0));
        std::thread::sleep(Duration::from_millis(50));
        assert!(bucket.consume(1.0));
    }

    #[test]
    fn sliding_window_rejects_past_capacity() {
        let mut window = SlidingWindow::new(Duration::from_millis(50), 2);
        assert!(window.is_allowed());
        assert!(window.is_allowed());
        assert!(!window.is_allowed());
        std::thread::sleep(Duration::from_millis(60));
        assert!(window.is_allowed());
    }

    #[test]
    fn tier_capacities_increase_with_rank() {
        assert_eq!(UserTier::Default.capacity_and_rate(), (100.0, 1.0));
        assert_eq!(UserTier::Premium.capacity_and_rate(), (500.0, 5.0));
        assert_eq!(UserTier::Enterprise.capacity_and_rate(), (1000.0, 10.0));
    }

    #[test]
    fn user_bucket_denies_after_capacity_exhausted() {
        // Exercise the per-user bucket directly so this test is independent
        // of the global sliding windows' own request-per-second cap.
        let (capacity, rate) = UserTier::Default.capacity_and_rate();
        let mut bucket = TokenBucket::new(capacity, rate);
        for _ in 0..100 {
            assert!(bucket.consume(1.0));
        }
        assert!(!bucket.consume(1.0));
    }
}
