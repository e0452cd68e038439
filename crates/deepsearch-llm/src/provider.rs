//! LLM Provider Strategy Pattern
//!
//! Common interface for every LLM back-end (Ollama, Groq, Gemini, or any
//! OpenAI-compatible proxy) so the router and synthesis stage work with any
//! of them without provider-specific branching.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use deepsearch_core::model::LlmMessage;
use deepsearch_core::Result;

/// Configuration for LLM generation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
            system_prompt: None,
        }
    }
}

/// Response from an LLM completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub truncated: bool,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// A chunk from streaming completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamChunk {
    pub delta: String,
    pub done: bool,
    pub usage: Option<TokenUsage>,
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub version: Option<String>,
    pub models: Vec<ModelInfo>,
    pub supports_streaming: bool,
    pub supports_tools: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub context_length: Option<u32>,
    pub supports_vision: bool,
}

/// Strategy trait for LLM providers. Every back-end implements this and
/// nothing else; the router and synthesis stage depend only on it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn info(&self) -> Result<ProviderInfo>;

    /// Cheap health probe; callers may cache the result briefly.
    async fn health_check(&self) -> Result<bool>;

    async fn complete(&self, messages: &[LlmMessage], options: &GenerationOptions) -> Result<Completion>;

    async fn complete_stream(&self, messages: &[LlmMessage], options: &GenerationOptions) -> Result<CompletionStream>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Rough ~4-chars-per-token estimate; providers with exact tokenizers
    /// should override this.
    fn estimate_tokens(&self, text: &str) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let estimate = (text.len() / 4) as u32;
        estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_options_defaults_match_spec() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.temperature, 0.7);
        assert_eq!(opts.max_tokens, 2048);
    }
}
