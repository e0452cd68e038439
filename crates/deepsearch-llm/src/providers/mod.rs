pub mod gemini;
pub mod groq;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod openai_compat;
