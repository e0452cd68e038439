//! Result Ranker
//!
//! Scores each result as a fixed convex combination of TF-IDF cosine
//! similarity (query vs. title+description) and a static domain-authority
//! weight, then sorts per the caller's requested method. TF-IDF embedding
//! follows the corpus-relative pattern: build IDF over this batch's texts
//! plus the query, embed each, cosine-compare against the query vector.

use std::collections::HashMap;

use deepsearch_core::model::{SearchResult, SortMethod};

const TFIDF_WEIGHT: f64 = 0.7;
const AUTHORITY_WEIGHT: f64 = 0.3;
const DEFAULT_AUTHORITY: f64 = 0.5;

fn domain_authority_table() -> &'static [(&'static str, f64)] {
    &[
        ("wikipedia.org", 0.95),
        ("github.com", 0.9),
        ("arxiv.org", 0.85),
        ("scholar.google.com", 0.9),
        ("stackoverflow.com", 0.88),
        ("stackexchange.com", 0.85),
        ("medium.com", 0.7),
    ]
}

/// Look up domain authority by exact host, then by second-level domain
/// (last two dot-separated labels), defaulting to 0.5.
#[must_use]
pub fn domain_authority(url: &str) -> f64 {
    let Ok(parsed) = url::Url::parse(url) else {
        return DEFAULT_AUTHORITY;
    };
    let Some(host) = parsed.host_str() else {
        return DEFAULT_AUTHORITY;
    };

    let table = domain_authority_table();
    if let Some((_, weight)) = table.iter().find(|(h, _)| *h == host) {
        return *weight;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() >= 2 {
        let second_level = labels[labels.len() - 2..].join(".");
        if let Some((_, weight)) = table.iter().find(|(h, _)| *h == second_level) {
            return *weight;
        }
    }

    DEFAULT_AUTHORITY
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() > 1)
        .map(String::from)
        .collect()
}

fn term_frequencies(tokens: &[String]) -> HashMap<&str, f64> {
    let mut tf: HashMap<&str, f64> = HashMap::new();
    for t in tokens {
        *tf.entry(t.as_str()).or_default() += 1.0;
    }
    let total = tokens.len().max(1) as f64;
    for v in tf.values_mut() {
        *v /= total;
    }
    tf
}

fn cosine_similarity(a: &HashMap<&str, f64>, b: &HashMap<&str, f64>, idf: &HashMap<String, f64>) -> f64 {
    let mut dot = 0.0;
    let mut mag_a = 0.0;
    let mut mag_b = 0.0;

    let keys: std::collections::HashSet<&str> = a.keys().chain(b.keys()).copied().collect();
    for key in keys {
        let weight = idf.get(key).copied().unwrap_or(0.0);
        let wa = a.get(key).copied().unwrap_or(0.0) * weight;
        let wb = b.get(key).copied().unwrap_or(0.0) * weight;
        dot += wa * wb;
        mag_a += wa * wa;
        mag_b += wb * wb;
    }

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a.sqrt() * mag_b.sqrt())
}

/// Rank `results` in place against `query`: attach `confidence` (overwritten
/// with the blended score), `domain_authority`, and post-sort `rank`.
pub fn rank(results: &mut Vec<SearchResult>, query: &str, sort_by: SortMethod) {
    if results.is_empty() {
        return;
    }

    let query_tokens = tokenize(query);
    let doc_texts: Vec<Vec<String>> = results
        .iter()
        .map(|r| tokenize(&format!("{} {}", r.title, r.description)))
        .collect();

    let corpus_size = (doc_texts.len() + 1) as f64;
    let mut doc_freq: HashMap<String, f64> = HashMap::new();
    for tokens in doc_texts.iter().chain(std::iter::once(&query_tokens)) {
        let unique: std::collections::HashSet<&String> = tokens.iter().collect();
        for token in unique {
            *doc_freq.entry(token.clone()).or_default() += 1.0;
        }
    }
    let idf: HashMap<String, f64> = doc_freq
        .into_iter()
        .map(|(term, df)| (term, (corpus_size / df).ln().max(0.0)))
        .collect();

    let query_tf = term_frequencies(&query_tokens);

    for (result, tokens) in results.iter_mut().zip(doc_texts.iter()) {
        let doc_tf = term_frequencies(tokens);
        let cosine = cosine_similarity(&query_tf, &doc_tf, &idf);
        let authority = domain_authority(&result.url);
        result.domain_authority = Some(authority);
        result.confidence = TFIDF_WEIGHT * cosine + AUTHORITY_WEIGHT * authority;
    }

    match sort_by {
        SortMethod::Relevance => {
            results.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        }
        SortMethod::Date => {
            results.sort_by(|a, b| {
                b.published_date
                    .cmp(&a.published_date)
                    .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
            });
        }
        SortMethod::SourceQuality => {
            results.sort_by(|a, b| {
                b.domain_authority
                    .partial_cmp(&a.domain_authority)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
            });
        }
    }

    for (i, result) in results.iter_mut().enumerate() {
        result.rank = Some(i + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_domain_authority_is_exact_match() {
        assert!((domain_authority("https://en.wikipedia.org/wiki/Rust") - 0.95).abs() < f64::EPSILON);
        assert!((domain_authority("https://unknown-blog.example.com") - DEFAULT_AUTHORITY).abs() < f64::EPSILON);
    }

    #[test]
    fn second_level_domain_fallback_matches_subdomain() {
        assert!((domain_authority("https://docs.github.com/en") - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn ranks_more_relevant_result_higher() {
        let mut results = vec![
            SearchResult::new("Bananas", "https://example.com/bananas", "a yellow fruit", "x"),
            SearchResult::new("Rust programming", "https://example.com/rust", "the rust programming language", "x"),
        ];
        rank(&mut results, "rust programming language", SortMethod::Relevance);
        assert_eq!(results[0].title, "Rust programming");
        assert_eq!(results[0].rank, Some(1));
        assert_eq!(results[1].rank, Some(2));
    }
}
