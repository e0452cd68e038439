//! Ollama LLM Provider — the local-model pool adapter.

use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::{
    generation::{
        chat::{request::ChatMessageRequest, ChatMessage, ChatMessageResponse, MessageRole},
        options::GenerationOptions as OllamaOptions,
    },
    Ollama,
};

use deepsearch_core::model::{LlmMessage, LlmRole};
use deepsearch_core::{CoreError, Result};

use crate::provider::{
    Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo, StreamChunk,
    TokenUsage,
};

#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".into());
        let port = std::env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(11434);
        Self { host, port, ..Default::default() }
    }
}

pub struct OllamaProvider {
    client: Ollama,
    #[allow(dead_code)]
    config: OllamaConfig,
}

impl OllamaProvider {
    #[must_use]
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(&config.host, config.port),
            config,
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    fn convert_messages(messages: &[LlmMessage], system_prompt: Option<&str>) -> Vec<ChatMessage> {
        let mut converted = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_prompt {
            converted.push(ChatMessage::new(MessageRole::System, system.to_string()));
        }
        converted.extend(messages.iter().map(|m| {
            let role = match m.role {
                LlmRole::System => MessageRole::System,
                LlmRole::User => MessageRole::User,
                LlmRole::Assistant => MessageRole::Assistant,
            };
            ChatMessage::new(role, m.content.clone())
        }));
        converted
    }

    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        Completion {
            content: response.message.content,
            model: model.to_string(),
            usage: response.final_data.as_ref().map(|d| TokenUsage {
                prompt_tokens: d.prompt_eval_count.unwrap_or(0),
                completion_tokens: d.eval_count.unwrap_or(0),
                total_tokens: d.prompt_eval_count.unwrap_or(0) + d.eval_count.unwrap_or(0),
            }),
            truncated: false,
            finish_reason: Some(FinishReason::Stop),
        }
    }

    fn build_options(opts: &GenerationOptions) -> OllamaOptions {
        #[allow(clippy::cast_possible_wrap)]
        let num_predict = opts.max_tokens as i32;
        OllamaOptions::default().temperature(opts.temperature).top_p(opts.top_p).num_predict(num_predict)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();
        Ok(ProviderInfo {
            name: "Ollama".into(),
            version: None,
            models,
            supports_streaming: true,
            supports_tools: false,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "ollama health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(&self, messages: &[LlmMessage], options: &GenerationOptions) -> Result<Completion> {
        let ollama_messages = Self::convert_messages(messages, options.system_prompt.as_deref());
        let ollama_options = Self::build_options(options);
        let request = ChatMessageRequest::new(options.model.clone(), ollama_messages).options(ollama_options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

        Ok(Self::convert_completion(response, &options.model))
    }

    async fn complete_stream(&self, messages: &[LlmMessage], options: &GenerationOptions) -> Result<CompletionStream> {
        let ollama_messages = Self::convert_messages(messages, options.system_prompt.as_deref());
        let ollama_options = Self::build_options(options);
        let request = ChatMessageRequest::new(options.model.clone(), ollama_messages).options(ollama_options);

        let stream = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

        let mapped = stream.map(|result| {
            result
                .map(|chunk| StreamChunk {
                    delta: chunk.message.content,
                    done: chunk.done.unwrap_or(false),
                    usage: chunk.final_data.as_ref().map(|d| TokenUsage {
                        prompt_tokens: d.prompt_eval_count.unwrap_or(0),
                        completion_tokens: d.eval_count.unwrap_or(0),
                        total_tokens: d.prompt_eval_count.unwrap_or(0) + d.eval_count.unwrap_or(0),
                    }),
                })
                .map_err(|e| CoreError::ProviderProtocolError(e.to_string()))
        });

        Ok(Box::pin(mapped))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
                context_length: None,
                supports_vision: false,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
    }

    #[test]
    fn message_conversion_preserves_count() {
        let messages = vec![
            LlmMessage { role: LlmRole::System, content: "You are helpful.".into() },
            LlmMessage { role: LlmRole::User, content: "Hello".into() },
        ];
        let converted = OllamaProvider::convert_messages(&messages, None);
        assert_eq!(converted.len(), 2);
    }

    #[test]
    fn message_conversion_prepends_system_prompt() {
        let messages = vec![LlmMessage { role: LlmRole::User, content: "Hello".into() }];
        let converted = OllamaProvider::convert_messages(&messages, Some("Answer concisely."));
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, MessageRole::System);
        assert_eq!(converted[0].content, "Answer concisely.");
    }
}
