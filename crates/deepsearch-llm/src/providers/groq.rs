//! Groq adapter: the low-latency hosted provider, reusing the generic
//! OpenAI-compatible wire format against Groq's own endpoint.

use crate::provider::ModelInfo;
use crate::providers::openai_compat::OpenAiCompatProvider;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[must_use]
pub fn groq_provider(api_key: Option<String>) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(
        "Groq",
        GROQ_BASE_URL,
        api_key,
        vec![
            ModelInfo {
                id: "llama-3.3-70b-versatile".into(),
                name: "Llama 3.3 70B Versatile".into(),
                context_length: Some(128_000),
                supports_vision: false,
            },
            ModelInfo {
                id: "mixtral-8x7b-32768".into(),
                name: "Mixtral 8x7B".into(),
                context_length: Some(32_768),
                supports_vision: false,
            },
        ],
    )
}

#[must_use]
pub fn groq_provider_from_env() -> OpenAiCompatProvider {
    groq_provider(std::env::var("GROQ_API_KEY").ok())
}
