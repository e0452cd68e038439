//! Configuration Loader
//!
//! Dotted-path YAML configuration with `DEEPSEARCH_<UPPERCASED_DOTTED_PATH>`
//! environment overrides and loose type coercion. A typed `Config` facade
//! sits on top so the rest of the crate reads strongly-typed fields rather
//! than dotted strings.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde_yaml::Value;

use crate::error::{CoreError, Result};

const ENV_PREFIX: &str = "DEEPSEARCH_";

/// A coerced configuration value.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<String>),
    String(String),
}

impl ConfigValue {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => {
                #[allow(clippy::cast_precision_loss)]
                Some(*i as f64)
            }
            _ => None,
        }
    }
}

/// Coerce a raw env-var string: booleans by keyword, then float (contains
/// '.'), then int, then a comma-split list, falling back to a bare string.
fn convert_type(raw: &str) -> ConfigValue {
    let lowered = raw.to_lowercase();
    match lowered.as_str() {
        "true" | "yes" | "1" | "on" => return ConfigValue::Bool(true),
        "false" | "no" | "0" | "off" => return ConfigValue::Bool(false),
        _ => {}
    }
    if raw.contains('.') {
        if let Ok(f) = raw.parse::<f64>() {
            return ConfigValue::Float(f);
        }
    }
    if let Ok(i) = raw.parse::<i64>() {
        return ConfigValue::Int(i);
    }
    if raw.contains(',') {
        return ConfigValue::List(raw.split(',').map(|s| s.trim().to_string()).collect());
    }
    ConfigValue::String(raw.to_string())
}

fn yaml_to_config_value(value: &Value) -> Option<ConfigValue> {
    match value {
        Value::Bool(b) => Some(ConfigValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(ConfigValue::Int(i))
            } else {
                n.as_f64().map(ConfigValue::Float)
            }
        }
        Value::String(s) => Some(ConfigValue::String(s.clone())),
        Value::Sequence(seq) => Some(ConfigValue::List(
            seq.iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
                })
                .collect(),
        )),
        _ => None,
    }
}

/// A loaded YAML document plus dotted-path env override semantics.
pub struct RawConfig {
    document: Value,
}

impl RawConfig {
    /// # Errors
    /// Returns an error if `path` cannot be read or parsed as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CoreError::Config(format!("failed to read config file: {e}")))?;
        let document: Value = serde_yaml::from_str(&text)
            .map_err(|e| CoreError::Config(format!("failed to parse config yaml: {e}")))?;
        Ok(Self { document })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self { document: Value::Null }
    }

    fn env_key(key_path: &str) -> String {
        format!("{ENV_PREFIX}{}", key_path.to_uppercase().replace('.', "_"))
    }

    /// Resolve `key_path` (e.g. `"server.port"`): env override first, then
    /// dotted traversal of the YAML document, falling back to `default`.
    #[must_use]
    pub fn get(&self, key_path: &str, default: Option<ConfigValue>) -> Option<ConfigValue> {
        if let Ok(raw) = std::env::var(Self::env_key(key_path)) {
            return Some(convert_type(&raw));
        }

        let mut cursor = &self.document;
        for part in key_path.split('.') {
            match cursor.get(part) {
                Some(next) => cursor = next,
                None => return default,
            }
        }
        yaml_to_config_value(cursor).or(default)
    }

    #[must_use]
    pub fn get_string(&self, key_path: &str, default: &str) -> String {
        self.get(key_path, Some(ConfigValue::String(default.to_string())))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    #[must_use]
    pub fn get_bool(&self, key_path: &str, default: bool) -> bool {
        self.get(key_path, Some(ConfigValue::Bool(default)))
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    #[must_use]
    pub fn get_int(&self, key_path: &str, default: i64) -> i64 {
        self.get(key_path, Some(ConfigValue::Int(default)))
            .and_then(|v| v.as_int())
            .unwrap_or(default)
    }

    #[must_use]
    pub fn get_float(&self, key_path: &str, default: f64) -> f64 {
        self.get(key_path, Some(ConfigValue::Float(default)))
            .and_then(|v| v.as_float())
            .unwrap_or(default)
    }

    /// `{SERVICE}_URL` env var, falling back to `services.<service>.url`.
    #[must_use]
    pub fn service_url(&self, service: &str) -> Option<String> {
        let env_key = format!("{}_URL", service.to_uppercase());
        if let Ok(url) = std::env::var(&env_key) {
            return Some(url);
        }
        self.get(&format!("services.{service}.url"), None)
            .and_then(|v| v.as_str().map(str::to_string))
    }
}

/// Strongly-typed configuration surface used by the server and pipeline.
#[derive(Clone, Debug)]
pub struct Config {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub version: String,

    pub search_default_providers: Vec<String>,
    pub search_max_results: usize,
    pub search_timeout: Duration,

    pub scraping_enabled: bool,
    pub max_scrape_urls: usize,
    pub scraping_concurrency: usize,
    pub scraping_timeout: Duration,
    pub scraping_extraction_strategy: String,
    pub scraping_min_content_length: usize,

    pub rag_enabled: bool,
    pub rag_chunk_size: usize,
    pub rag_chunk_overlap: usize,
    pub rag_top_k: usize,
    pub rag_store_scraped_content: bool,

    pub synthesis_default_provider: String,
    pub synthesis_system_prompt: String,
    pub synthesis_temperature: f32,
    pub synthesis_streaming: bool,
    pub synthesis_timeout: Duration,

    pub cache_enabled: bool,
    pub cache_default_ttl: Duration,

    pub sessions_enabled: bool,
    pub sessions_storage: String,
    pub session_ttl: Duration,

    pub metrics_retention_hours: u64,
    pub service_urls: HashMap<String, String>,
}

impl Config {
    #[must_use]
    pub fn from_raw(raw: &RawConfig) -> Self {
        let mut service_urls = HashMap::new();
        for service in ["crawler", "vector-store", "whoogle", "searxng", "yacy", "search_gateway", "llm_gateway"] {
            if let Some(url) = raw.service_url(service) {
                service_urls.insert(service.to_string(), url);
            }
        }

        let search_default_providers = raw
            .get("search.default_providers", None)
            .and_then(|v| match v {
                ConfigValue::List(list) => Some(list),
                ConfigValue::String(s) => Some(vec![s]),
                _ => None,
            })
            .unwrap_or_default();

        Self {
            service_name: raw.get_string("service.name", "deepsearch"),
            host: raw.get_string("service.host", "0.0.0.0"),
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            port: raw.get_int("service.port", 8000) as u16,
            log_level: raw.get_string("service.log_level", "info"),
            version: raw.get_string("service.version", env!("CARGO_PKG_VERSION")),

            search_default_providers,
            #[allow(clippy::cast_sign_loss)]
            search_max_results: raw.get_int("search.max_results", 10) as usize,
            search_timeout: Duration::from_secs(
                #[allow(clippy::cast_sign_loss)]
                (raw.get_int("search.timeout", 10) as u64),
            ),

            scraping_enabled: raw.get_bool("scraping.enabled", true),
            #[allow(clippy::cast_sign_loss)]
            max_scrape_urls: raw.get_int("scraping.max_scrape_urls", 5) as usize,
            #[allow(clippy::cast_sign_loss)]
            scraping_concurrency: raw.get_int("scraping.concurrency", 5) as usize,
            scraping_timeout: Duration::from_secs(
                #[allow(clippy::cast_sign_loss)]
                (raw.get_int("scraping.timeout", 15) as u64),
            ),
            scraping_extraction_strategy: raw.get_string("scraping.extraction_strategy", "markdown"),
            #[allow(clippy::cast_sign_loss)]
            scraping_min_content_length: raw.get_int("scraping.min_content_length", 100) as usize,

            rag_enabled: raw.get_bool("rag.enabled", true),
            #[allow(clippy::cast_sign_loss)]
            rag_chunk_size: raw.get_int("rag.chunk_size", 1000) as usize,
            #[allow(clippy::cast_sign_loss)]
            rag_chunk_overlap: raw.get_int("rag.chunk_overlap", 200) as usize,
            #[allow(clippy::cast_sign_loss)]
            rag_top_k: raw.get_int("rag.top_k", 5) as usize,
            rag_store_scraped_content: raw.get_bool("rag.store_scraped_content", true),

            synthesis_default_provider: raw.get_string("synthesis.default_provider", "ollama"),
            synthesis_system_prompt: raw.get_string(
                "synthesis.system_prompt",
                "You are a research assistant. Answer the user's query using only the provided search context. \
                Cite sources inline as [n] matching the numbered context entries.",
            ),
            #[allow(clippy::cast_possible_truncation)]
            synthesis_temperature: raw.get_float("synthesis.temperature", 0.7) as f32,
            synthesis_streaming: raw.get_bool("synthesis.streaming", true),
            synthesis_timeout: Duration::from_secs(
                #[allow(clippy::cast_sign_loss)]
                (raw.get_int("synthesis.timeout", 60) as u64),
            ),

            cache_enabled: raw.get_bool("cache.enabled", true),
            cache_default_ttl: Duration::from_secs(
                #[allow(clippy::cast_sign_loss)]
                (raw.get_int("cache.ttl", 3600) as u64),
            ),

            sessions_enabled: raw.get_bool("sessions.enabled", true),
            sessions_storage: raw.get_string("sessions.storage", "memory"),
            session_ttl: Duration::from_secs(
                #[allow(clippy::cast_sign_loss)]
                (raw.get_int("sessions.ttl", 2_592_000) as u64),
            ),

            #[allow(clippy::cast_sign_loss)]
            metrics_retention_hours: raw.get_int("metrics.retention_hours", 24) as u64,
            service_urls,
        }
    }

    /// Load from a YAML file if present, else fall back to defaults plus
    /// environment overrides only.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let raw = RawConfig::load(path).unwrap_or_else(|_| RawConfig::empty());
        Self::from_raw(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_type_recognizes_booleans() {
        assert_eq!(convert_type("true"), ConfigValue::Bool(true));
        assert_eq!(convert_type("no"), ConfigValue::Bool(false));
    }

    #[test]
    fn convert_type_recognizes_numbers_and_lists() {
        assert_eq!(convert_type("3.14"), ConfigValue::Float(3.14));
        assert_eq!(convert_type("42"), ConfigValue::Int(42));
        assert_eq!(
            convert_type("a,b,c"),
            ConfigValue::List(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(convert_type("hello"), ConfigValue::String("hello".to_string()));
    }

    #[test]
    fn dotted_path_traverses_yaml_document() {
        let raw = RawConfig {
            document: serde_yaml::from_str("server:\n  host: 127.0.0.1\n  port: 9000\n").unwrap(),
        };
        assert_eq!(raw.get_string("server.host", "0.0.0.0"), "127.0.0.1");
        assert_eq!(raw.get_int("server.port", 8000), 9000);
        assert_eq!(raw.get_int("server.missing", 1), 1);
    }

    #[test]
    fn env_override_takes_priority_over_yaml() {
        let raw = RawConfig {
            document: serde_yaml::from_str("server:\n  port: 9000\n").unwrap(),
        };
        std::env::set_var("DEEPSEARCH_SERVER_PORT", "7000");
        assert_eq!(raw.get_int("server.port", 8000), 7000);
        std::env::remove_var("DEEPSEARCH_SERVER_PORT");
    }
}
