//! Configuration management
//!
//! This module handles loading and validation of the Copydesk configuration.
//! Configuration is stored in TOML format, by convention at
//! ~/.copydesk/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: data directory, knowledge directory, log level
//! - **retrieval**: top-k and lexical/embedding score blending
//! - **collision**: shingle size, similarity thresholds, recency window
//! - **drafting**: retry budget and near-collision blocking policy
//! - **llm**: generation/embedding provider settings
//!
//! Similarity thresholds and the retry budget are deliberately configuration
//! surface rather than constants; the defaults below are engineering
//! choices, not contract.
//!
//! # Examples
//!
//! ```
//! use copydesk_engine::config::Config;
//!
//! let config = Config::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.drafting.max_retries, 2);
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Knowledge retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Collision detection settings
    #[serde(default)]
    pub collision: CollisionConfig,

    /// Draft orchestration settings
    #[serde(default)]
    pub drafting: DraftingConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Data directory path holding the memory store database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory of markdown guideline documents to ingest
    #[serde(default = "default_knowledge_dir")]
    pub knowledge_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Knowledge retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the generation prompt
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Weight of the lexical score when blending with embedding cosine
    /// (1.0 = lexical only). Ignored when no embedding provider is set.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
}

/// Collision detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionConfig {
    /// Words per shingle for the n-gram stage
    #[serde(default = "default_shingle_size")]
    pub shingle_size: usize,

    /// Jaccard similarity at or above which an n-gram match is `exact`
    #[serde(default = "default_ngram_exact")]
    pub ngram_exact: f64,

    /// Jaccard similarity at or above which an n-gram match is `near`
    #[serde(default = "default_ngram_near")]
    pub ngram_near: f64,

    /// Cosine similarity at or above which an embedding match is `exact`
    #[serde(default = "default_embedding_exact")]
    pub embedding_exact: f64,

    /// Cosine similarity at or above which an embedding match is `near`
    #[serde(default = "default_embedding_near")]
    pub embedding_near: f64,

    /// Compare only against decisions from the last N distinct campaigns;
    /// `None` compares against all history
    #[serde(default)]
    pub recent_campaigns: Option<usize>,
}

/// Draft orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftingConfig {
    /// Revisions allowed after the first attempt before rejecting
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether a `near` collision blocks acceptance; when false it is
    /// surfaced like a warning instead
    #[serde(default = "default_true")]
    pub near_blocks: bool,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default provider name (currently "openai" for any
    /// OpenAI-compatible endpoint)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// OpenAI-compatible provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Chat model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Embedding model name; empty disables the embedding stage
    #[serde(default = "default_openai_embedding_model")]
    pub embedding_model: String,

    /// API key; when unset the OPENAI_API_KEY environment variable is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".copydesk")
}

fn default_knowledge_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".copydesk")
        .join("knowledge")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_lexical_weight() -> f64 {
    0.5
}

fn default_shingle_size() -> usize {
    3
}

fn default_ngram_exact() -> f64 {
    0.92
}

fn default_ngram_near() -> f64 {
    0.6
}

fn default_embedding_exact() -> f64 {
    0.95
}

fn default_embedding_near() -> f64 {
    0.8
}

fn default_max_retries() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            knowledge_dir: default_knowledge_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            lexical_weight: default_lexical_weight(),
        }
    }
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            shingle_size: default_shingle_size(),
            ngram_exact: default_ngram_exact(),
            ngram_near: default_ngram_near(),
            embedding_exact: default_embedding_exact(),
            embedding_near: default_embedding_near(),
            recent_campaigns: None,
        }
    }
}

impl Default for DraftingConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            near_blocks: default_true(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            openai: OpenAIConfig::default(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            embedding_model: default_openai_embedding_model(),
            api_key: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            collision: CollisionConfig::default(),
            drafting: DraftingConfig::default(),
            llm: LLMConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string and validate it
    pub fn from_toml_str(toml_str: &str) -> Result<Self, EngineError> {
        let config: Config = toml::from_str(toml_str)
            .map_err(|e| EngineError::Configuration(format!("Invalid config TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// All failures here are fatal at startup; nothing in this struct is
    /// checked again per request.
    pub fn validate(&self) -> Result<(), EngineError> {
        const LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];
        if !LEVELS.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Configuration(format!(
                "Unknown log level: {}",
                self.core.log_level
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(EngineError::Configuration(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.lexical_weight) {
            return Err(EngineError::Configuration(
                "retrieval.lexical_weight must be within [0, 1]".to_string(),
            ));
        }

        if self.collision.shingle_size == 0 {
            return Err(EngineError::Configuration(
                "collision.shingle_size must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("collision.ngram_exact", self.collision.ngram_exact),
            ("collision.ngram_near", self.collision.ngram_near),
            ("collision.embedding_exact", self.collision.embedding_exact),
            ("collision.embedding_near", self.collision.embedding_near),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Configuration(format!(
                    "{} must be within [0, 1]",
                    name
                )));
            }
        }
        if self.collision.ngram_near > self.collision.ngram_exact {
            return Err(EngineError::Configuration(
                "collision.ngram_near must not exceed collision.ngram_exact".to_string(),
            ));
        }
        if self.collision.embedding_near > self.collision.embedding_exact {
            return Err(EngineError::Configuration(
                "collision.embedding_near must not exceed collision.embedding_exact".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.collision.ngram_exact, 0.92);
        assert_eq!(config.collision.ngram_near, 0.6);
        assert_eq!(config.collision.embedding_exact, 0.95);
        assert_eq!(config.collision.embedding_near, 0.8);
        assert_eq!(config.collision.shingle_size, 3);
        assert_eq!(config.drafting.max_retries, 2);
        assert!(config.drafting.near_blocks);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.llm.default_provider, "openai");
    }

    #[test]
    fn test_partial_toml_overrides() {
        let toml_str = r#"
[collision]
ngram_near = 0.5
recent_campaigns = 10

[drafting]
max_retries = 4
near_blocks = false
"#;
        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(config.collision.ngram_near, 0.5);
        assert_eq!(config.collision.recent_campaigns, Some(10));
        assert_eq!(config.drafting.max_retries, 4);
        assert!(!config.drafting.near_blocks);
        // Untouched sections keep defaults
        assert_eq!(config.collision.ngram_exact, 0.92);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[drafting]\nmax_retries = 1\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.drafting.max_retries, 1);

        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let toml_str = r#"
[core]
log_level = "verbose"
"#;
        assert!(Config::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn test_threshold_bounds_enforced() {
        let out_of_range = r#"
[collision]
ngram_exact = 1.2
"#;
        assert!(Config::from_toml_str(out_of_range).is_err());

        let inverted = r#"
[collision]
ngram_near = 0.95
ngram_exact = 0.9
"#;
        assert!(Config::from_toml_str(inverted).is_err());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let toml_str = r#"
[retrieval]
top_k = 0
"#;
        assert!(Config::from_toml_str(toml_str).is_err());
    }
}
