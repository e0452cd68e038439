//! Synthesis Stage
//!
//! Builds the synthesis prompt from either RAG chunks or ranked search
//! results enriched with scraped content, then streams the answer through
//! the LLM router.

use futures::{Stream, StreamExt};
use std::collections::HashMap;

use deepsearch_core::model::{LlmMessage, LlmRole, ScrapedContent, SearchResult, VectorChunk};
use deepsearch_core::Result;
use deepsearch_llm::{GenerationOptions, LlmRouter, SelectionStrategy};

const SOURCE_CHAR_BUDGET: usize = 2000;
const DISABLED_ANSWER: &str = "Search completed. Synthesis disabled.";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a research assistant. Answer the user's query using only the \
provided search context. Cite sources inline as [n] matching the numbered context entries.";

#[derive(Clone, Debug)]
pub struct SynthesisConfig {
    pub enabled: bool,
    pub system_prompt: String,
    pub temperature: f32,
    pub timeout: std::time::Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            timeout: std::time::Duration::from_secs(60),
        }
    }
}

impl SynthesisConfig {
    #[must_use]
    pub fn from_config(config: &deepsearch_core::Config) -> Self {
        Self {
            enabled: true,
            system_prompt: config.synthesis_system_prompt.clone(),
            temperature: config.synthesis_temperature,
            timeout: config.synthesis_timeout,
        }
    }
}

/// Builds the `Source [i]: {title}\nURL: {url}\nContent: {text}\n` context
/// block, preferring RAG chunks when present.
#[must_use]
pub fn build_context(results: &[SearchResult], scraped: &[ScrapedContent], chunks: &[VectorChunk]) -> String {
    if !chunks.is_empty() {
        return chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("Source [{}]: {}\nURL: {}\nContent: {}\n", i + 1, chunk.title, chunk.url, chunk.content))
            .collect::<Vec<_>>()
            .join("\n");
    }

    let scraped_by_url: HashMap<&str, &ScrapedContent> = scraped.iter().map(|s| (s.url.as_str(), s)).collect();

    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let text = scraped_by_url
                .get(result.url.as_str())
                .map(|s| truncate_chars(&s.content, SOURCE_CHAR_BUDGET))
                .unwrap_or_else(|| result.description.clone());
            format!("Source [{}]: {}\nURL: {}\nContent: {}\n", i + 1, result.title, result.url, text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Non-streaming synthesis: either the fixed disabled-answer string, or a
/// complete answer collected from the streaming LLM call.
pub async fn synthesize(
    router: &LlmRouter,
    strategy: &SelectionStrategy,
    query: &str,
    context: &str,
    config: &SynthesisConfig,
) -> Result<String> {
    if !config.enabled {
        return Ok(DISABLED_ANSWER.to_string());
    }

    let messages = build_messages(query, context);
    let options = GenerationOptions {
        temperature: config.temperature,
        system_prompt: Some(config.system_prompt.clone()),
        ..Default::default()
    };
    let completion = router.complete(strategy, &messages, &options, true).await?;
    Ok(completion.content)
}

/// Streaming synthesis: relays content fragments as they arrive from the
/// router's chosen provider. Callers are responsible for emitting the fixed
/// disabled-answer string themselves when `config.enabled` is false.
pub async fn synthesize_stream(
    router: &LlmRouter,
    strategy: &SelectionStrategy,
    query: &str,
    context: &str,
    config: &SynthesisConfig,
) -> Result<impl Stream<Item = Result<String>> + Send> {
    let messages = build_messages(query, context);
    let options = GenerationOptions {
        temperature: config.temperature,
        system_prompt: Some(config.system_prompt.clone()),
        ..Default::default()
    };
    let stream = router.complete_stream(strategy, &messages, &options, true).await?;
    Ok(stream.map(|chunk| chunk.map(|c| c.delta)))
}

fn build_messages(query: &str, context: &str) -> Vec<LlmMessage> {
    vec![LlmMessage {
        role: LlmRole::User,
        content: format!("User Query: {query}\n\nSearch Context:\n{context}"),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_context_prefers_rag_chunks_over_results() {
        let results = vec![SearchResult::new("Result Title", "https://r", "result desc", "whoogle")];
        let chunks = vec![VectorChunk {
            chunk_id: "c1".into(),
            content: "chunk content".into(),
            url: "https://c".into(),
            title: "Chunk Title".into(),
            similarity_score: Some(0.9),
            metadata: None,
        }];
        let context = build_context(&results, &[], &chunks);
        assert!(context.contains("Chunk Title"));
        assert!(!context.contains("Result Title"));
    }

    #[test]
    fn build_context_falls_back_to_description_without_scrape() {
        let results = vec![SearchResult::new("T", "https://a", "fallback description", "whoogle")];
        let context = build_context(&results, &[], &[]);
        assert!(context.contains("fallback description"));
        assert!(context.contains("Source [1]: T"));
    }

    #[test]
    fn build_context_truncates_scraped_content_to_budget() {
        let results = vec![SearchResult::new("T", "https://a", "desc", "whoogle")];
        let scraped = vec![ScrapedContent {
            url: "https://a".into(),
            title: "T".into(),
            content: "x".repeat(SOURCE_CHAR_BUDGET + 500),
            markdown: None,
            extracted_data: None,
            word_count: 0,
            success: true,
            error_message: None,
        }];
        let context = build_context(&results, &scraped, &[]);
        let content_line = context.lines().find(|l| l.starts_with("Content:")).unwrap();
        assert_eq!(content_line.trim_start_matches("Content: ").len(), SOURCE_CHAR_BUDGET);
    }
}
