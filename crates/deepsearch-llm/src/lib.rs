//! # deepsearch-llm
//!
//! LLM provider adapters (Ollama, Groq, Gemini, generic OpenAI-compatible),
//! the provider registry, and the selection router sitting on top of it.

pub mod provider;
pub mod providers;
pub mod registry;
pub mod router;

pub use provider::{
    Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo, StreamChunk,
    TokenUsage,
};
pub use registry::{LlmProviderRegistry, ProviderOrdinals};
pub use router::{LlmRouter, SelectionStrategy};
