//! Query Understanding
//!
//! Lightweight keyword-based classifier that tags a query with an intent and
//! a time-sensitivity signal before it reaches the search fan-out. Purely
//! diagnostic: nothing downstream is required to honor its output, but the
//! ranker and orchestrator may use `time_sensitive` to prefer `Date` sort.

use serde::Serialize;

const TEMPORAL_INDICATORS: &[&str] = &[
    "today", "yesterday", "this week", "this month", "this year", "latest",
    "recent", "recently", "now", "current", "currently", "breaking", "just announced",
];

const QUESTION_WORDS: &[&str] = &[
    "who", "what", "when", "where", "why", "how", "which", "whose", "whom",
];

const COMPARISON_WORDS: &[&str] = &["vs", "versus", "compared to", "difference between", "better than"];

const DEFINITION_WORDS: &[&str] = &["what is", "what are", "define", "meaning of", "definition of"];

/// Coarse classification of what the user is asking for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Definition,
    Comparison,
    Question,
    Factual,
}

/// Diagnostic annotation attached to an incoming query.
#[derive(Clone, Debug, Serialize)]
pub struct QueryAnalysis {
    pub intent: QueryIntent,
    pub time_sensitive: bool,
    pub is_question: bool,
    pub word_count: usize,
}

/// Stateless keyword-based query classifier.
pub struct QueryUnderstandingEngine;

impl QueryUnderstandingEngine {
    #[must_use]
    pub fn analyze_query(query: &str) -> QueryAnalysis {
        let lowered = query.to_lowercase();

        let time_sensitive = TEMPORAL_INDICATORS.iter().any(|kw| lowered.contains(kw));
        let is_question =
            query.trim_end().ends_with('?') || QUESTION_WORDS.iter().any(|w| lowered.starts_with(w));

        let intent = if DEFINITION_WORDS.iter().any(|kw| lowered.contains(kw)) {
            QueryIntent::Definition
        } else if COMPARISON_WORDS.iter().any(|kw| lowered.contains(kw)) {
            QueryIntent::Comparison
        } else if is_question {
            QueryIntent::Question
        } else {
            QueryIntent::Factual
        };

        QueryAnalysis {
            intent,
            time_sensitive,
            is_question,
            word_count: lowered.split_whitespace().count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_time_sensitivity() {
        let analysis = QueryUnderstandingEngine::analyze_query("what is the latest news on rust releases");
        assert!(analysis.time_sensitive);
    }

    #[test]
    fn classifies_definition_intent() {
        let analysis = QueryUnderstandingEngine::analyze_query("what is a circuit breaker");
        assert_eq!(analysis.intent, QueryIntent::Definition);
    }

    #[test]
    fn classifies_comparison_intent() {
        let analysis = QueryUnderstandingEngine::analyze_query("rust vs golang for systems programming");
        assert_eq!(analysis.intent, QueryIntent::Comparison);
    }

    #[test]
    fn plain_statement_is_factual_and_not_a_question() {
        let analysis = QueryUnderstandingEngine::analyze_query("capital of france");
        assert_eq!(analysis.intent, QueryIntent::Factual);
        assert!(!analysis.is_question);
    }
}
