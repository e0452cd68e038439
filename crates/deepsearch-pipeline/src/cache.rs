//! Response cache
//!
//! Keyed by the normalized request, so the orchestrator can short-circuit
//! straight to `complete` with `cache_hit=true` and skip every intermediate
//! stage. Mirrors the TTL-bounded in-memory pattern already used by
//! `MemorySessionStore`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use deepsearch_core::model::DeepSearchResponse;

struct Entry {
    response: DeepSearchResponse,
    expires_at: Instant,
}

/// Normalizes a request into a cache key: lower-cased, whitespace-collapsed
/// query plus the fields that change the answer shape.
#[must_use]
pub fn cache_key(query: &str, providers: &[String], max_results: Option<usize>) -> String {
    let normalized_query = query.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let mut sorted_providers = providers.to_vec();
    sorted_providers.sort();
    format!("{normalized_query}|{}|{}", sorted_providers.join(","), max_results.unwrap_or(0))
}

/// TTL-bounded in-memory response cache.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Entry>>,
    default_ttl: Duration,
}

impl ResponseCache {
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), default_ttl }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<DeepSearchResponse> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.response.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, response: DeepSearchResponse, ttl: Option<Duration>) {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        self.entries.lock().unwrap().insert(key, Entry { response, expires_at });
    }

    /// Removes entries past their TTL. Intended for a periodic background task.
    pub fn reap_expired(&self) {
        let now = Instant::now();
        self.entries.lock().unwrap().retain(|_, entry| entry.expires_at > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> DeepSearchResponse {
        DeepSearchResponse {
            query: "q".into(),
            answer: "a".into(),
            sources: vec![],
            scraped_content: None,
            rag_chunks: None,
            session_id: None,
            execution_time: 0.1,
            provider_used: "groq".into(),
            cache_hit: false,
            total_results: 0,
            results_scraped: 0,
            chunks_retrieved: 0,
            tokens_used: None,
        }
    }

    #[test]
    fn cache_key_normalizes_whitespace_and_case() {
        let a = cache_key("  Rust  Async  ", &[], None);
        let b = cache_key("rust async", &[], None);
        assert_eq!(a, b);
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        cache.put("k".into(), sample_response(), None);
        assert!(cache.get("k").is_some());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("k").is_none());
    }
}
