//! Error Types

use thiserror::Error;

/// Result type alias for core pipeline operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error kinds shared across every stage of the pipeline.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Circuit open or health-check negative; recoverable by fan-out or router fallback.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Bounded by the per-call timeout.
    #[error("provider timed out: {0}")]
    ProviderTimeout(String),

    /// Malformed or unparseable upstream response.
    #[error("provider protocol error: {0}")]
    ProviderProtocolError(String),

    /// Crawler or vector store unreachable; stage degrades to skip.
    #[error("upstream dependency down: {0}")]
    UpstreamDependencyDown(String),

    /// User, provider, or global rate limit exceeded.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Malformed request.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Client disconnect or deadline elapsed.
    #[error("cancelled")]
    Cancelled,

    /// Invariant violated; logged with context and surfaced as a 5xx/SSE error.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Session store failure.
    #[error("session error: {0}")]
    Session(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(String),
}

impl CoreError {
    /// Whether a caller should retry this error against another provider.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::ProviderUnavailable(_)
                | CoreError::ProviderTimeout(_)
                | CoreError::ProviderProtocolError(_)
        )
    }

    /// A message safe to surface to an API caller.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            CoreError::ProviderUnavailable(_) => {
                "The upstream service is currently unavailable. Please try again.".into()
            }
            CoreError::ProviderTimeout(_) => "The upstream service timed out.".into(),
            CoreError::ProviderProtocolError(_) => "The upstream service returned an unexpected response.".into(),
            CoreError::UpstreamDependencyDown(_) => {
                "A supporting service is unreachable; results may be degraded.".into()
            }
            CoreError::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            CoreError::ValidationError(msg) => format!("Invalid request: {msg}"),
            CoreError::Cancelled => "Request cancelled.".into(),
            CoreError::Session(_) => "Session storage error.".into(),
            CoreError::Config(_) => "Server misconfiguration.".into(),
            CoreError::Json(_) | CoreError::Fatal(_) => "An unexpected error occurred.".into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Json(err.to_string())
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Fatal(err.to_string())
    }
}
