//! # deepsearch-core
//!
//! Cross-cutting primitives shared by every stage of the DeepSearch
//! pipeline: the data model, resilience building blocks (circuit breaker,
//! rate limiter), metrics, session persistence, query classification, and
//! configuration loading.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        deepsearch-core                           │
//! │  ┌───────────────┐  ┌──────────────┐  ┌────────────────────────┐ │
//! │  │ CircuitBreaker│  │ RateLimiter  │  │  MetricsRecorder       │ │
//! │  └───────────────┘  └──────────────┘  └────────────────────────┘ │
//! │  ┌───────────────┐  ┌──────────────┐  ┌────────────────────────┐ │
//! │  │ SessionStore  │  │ QueryUnders. │  │  Config                │ │
//! │  └───────────────┘  └──────────────┘  └────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `deepsearch-search`, `deepsearch-llm`, and `deepsearch-pipeline` all
//! depend on this crate for their shared vocabulary and resilience
//! primitives; none of it is specific to search, LLM completion, or
//! orchestration.

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod query_understanding;
pub mod rate_limiter;
pub mod session;

pub use circuit_breaker::{CallError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use config::{Config, ConfigValue, RawConfig};
pub use error::{CoreError, Result};
pub use metrics::{GatewayStats, MetricsRecorder, ProviderStats};
pub use query_understanding::{QueryAnalysis, QueryIntent, QueryUnderstandingEngine};
pub use rate_limiter::{RateLimiter, SlidingWindow, TokenBucket, UserTier};
pub use session::{MemorySessionStore, Session, SessionMessage, SessionStore, SqliteSessionStore, TurnRole};
