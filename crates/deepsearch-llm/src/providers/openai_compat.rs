//! Generic OpenAI-compatible chat-completions adapter.
//!
//! Groq, Gemini's OpenAI-compatible endpoint, and any self-hosted
//! OpenAI-wire-format proxy all speak this exact shape, so one adapter
//! parameterized by base URL and API key covers all three.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use deepsearch_core::model::{LlmMessage, LlmRole};
use deepsearch_core::{CoreError, Result};

use crate::provider::{
    Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo, StreamChunk,
    TokenUsage,
};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

fn role_str(role: LlmRole) -> &'static str {
    match role {
        LlmRole::System => "system",
        LlmRole::User => "user",
        LlmRole::Assistant => "assistant",
    }
}

fn finish_reason(raw: Option<&str>) -> Option<FinishReason> {
    match raw {
        Some("stop") => Some(FinishReason::Stop),
        Some("length") => Some(FinishReason::Length),
        Some("tool_calls") | Some("function_call") => Some(FinishReason::ToolUse),
        Some("content_filter") => Some(FinishReason::ContentFilter),
        Some(_) => Some(FinishReason::Error),
        None => None,
    }
}

/// A generic OpenAI chat-completions-compatible HTTP provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
    default_models: Vec<ModelInfo>,
}

impl OpenAiCompatProvider {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_models: Vec<ModelInfo>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key,
            client: Client::new(),
            default_models,
        }
    }

    fn build_request(&self, messages: &[LlmMessage], options: &GenerationOptions, stream: bool) -> ChatRequest<'_> {
        let mut wire: Vec<WireMessage> = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &options.system_prompt {
            wire.push(WireMessage { role: "system".to_string(), content: system.clone() });
        }
        wire.extend(messages.iter().map(|m| WireMessage {
            role: role_str(m.role).to_string(),
            content: m.content.clone(),
        }));

        ChatRequest {
            model: &options.model,
            messages: wire,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stop: options.stop_sequences.clone(),
            stream,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        Ok(ProviderInfo {
            name: self.name.clone(),
            version: None,
            models: self.default_models.clone(),
            supports_streaming: true,
            supports_tools: false,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        let request = self.authed(self.client.get(url));
        match tokio::time::timeout(Duration::from_secs(5), request.send()).await {
            Ok(Ok(response)) => Ok(response.status().is_success()),
            _ => Ok(false),
        }
    }

    async fn complete(&self, messages: &[LlmMessage], options: &GenerationOptions) -> Result<Completion> {
        let body = self.build_request(messages, options, false);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .authed(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::ProviderProtocolError(format!("status {}", response.status())));
        }

        let parsed: ChatResponse =
            response.json().await.map_err(|e| CoreError::ProviderProtocolError(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::ProviderProtocolError("empty choices array".into()))?;

        Ok(Completion {
            content: choice.message.content,
            model: parsed.model.unwrap_or_else(|| options.model.clone()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            truncated: choice.finish_reason.as_deref() == Some("length"),
            finish_reason: finish_reason(choice.finish_reason.as_deref()),
        })
    }

    async fn complete_stream(&self, messages: &[LlmMessage], options: &GenerationOptions) -> Result<CompletionStream> {
        let body = self.build_request(messages, options, true);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .authed(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::ProviderProtocolError(format!("status {}", response.status())));
        }

        let byte_stream = response.bytes_stream();
        let chunk_stream = parse_sse_chat_stream(byte_stream);
        Ok(Box::pin(chunk_stream))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.default_models.clone())
    }
}

/// Transform a raw SSE byte stream of `data: {...}` frames into
/// `StreamChunk`s, terminating on the `data: [DONE]` sentinel.
fn parse_sse_chat_stream(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<StreamChunk>> + Send {
    let mut buffer = String::new();
    byte_stream
        .map(move |chunk| {
            let chunk = chunk.map_err(|e| CoreError::ProviderProtocolError(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            let mut events = Vec::new();
            while let Some(pos) = buffer.find("\n\n") {
                let frame: String = buffer.drain(..pos + 2).collect();
                for line in frame.lines() {
                    if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
                        let data = data.trim();
                        if data == "[DONE]" {
                            events.push(StreamChunk { delta: String::new(), done: true, usage: None });
                            continue;
                        }
                        match serde_json::from_str::<StreamResponse>(data) {
                            Ok(parsed) => {
                                let Some(choice) = parsed.choices.into_iter().next() else {
                                    continue;
                                };
                                events.push(StreamChunk {
                                    delta: choice.delta.content.unwrap_or_default(),
                                    done: choice.finish_reason.is_some(),
                                    usage: parsed.usage.map(|u| TokenUsage {
                                        prompt_tokens: u.prompt_tokens,
                                        completion_tokens: u.completion_tokens,
                                        total_tokens: u.total_tokens,
                                    }),
                                });
                            }
                            Err(e) => return Err(CoreError::ProviderProtocolError(e.to_string())),
                        }
                    }
                }
            }
            Ok(events)
        })
        .flat_map(|events| match events {
            Ok(events) => futures::stream::iter(events.into_iter().map(Ok)).left_stream(),
            Err(e) => futures::stream::iter(vec![Err(e)]).right_stream(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_maps_known_values() {
        assert_eq!(finish_reason(Some("stop")), Some(FinishReason::Stop));
        assert_eq!(finish_reason(Some("length")), Some(FinishReason::Length));
        assert_eq!(finish_reason(None), None);
    }

    #[test]
    fn role_str_maps_every_role() {
        assert_eq!(role_str(LlmRole::System), "system");
        assert_eq!(role_str(LlmRole::User), "user");
        assert_eq!(role_str(LlmRole::Assistant), "assistant");
    }
}
