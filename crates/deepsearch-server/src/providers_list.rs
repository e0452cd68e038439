//! Fixed enumeration of the LLM provider ids the server knows how to wire
//! up, shared by the health and providers endpoints.

use deepsearch_core::model::LlmProviderId;

pub const ALL_LLM_PROVIDER_IDS: [LlmProviderId; 4] =
    [LlmProviderId::Ollama, LlmProviderId::Groq, LlmProviderId::Gemini, LlmProviderId::OpenaiCompatible];
