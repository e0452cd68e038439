//! Gemini adapter: the high-quality hosted provider, via Google's
//! OpenAI-compatible endpoint rather than the native Gemini wire format, so
//! it can share the same adapter implementation as Groq.

use crate::provider::ModelInfo;
use crate::providers::openai_compat::OpenAiCompatProvider;

const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

#[must_use]
pub fn gemini_provider(api_key: Option<String>) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(
        "Gemini",
        GEMINI_OPENAI_BASE_URL,
        api_key,
        vec![
            ModelInfo {
                id: "gemini-1.5-pro".into(),
                name: "Gemini 1.5 Pro".into(),
                context_length: Some(2_097_152),
                supports_vision: true,
            },
            ModelInfo {
                id: "gemini-1.5-flash".into(),
                name: "Gemini 1.5 Flash".into(),
                context_length: Some(1_048_576),
                supports_vision: true,
            },
        ],
    )
}

#[must_use]
pub fn gemini_provider_from_env() -> OpenAiCompatProvider {
    gemini_provider(std::env::var("GEMINI_API_KEY").ok())
}
