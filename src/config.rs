//! Runtime configuration
//!
//! `RagConfig` is constructed once and passed to each component; there is no
//! global environment singleton. Values come from an optional `docrag.toml`
//! overridden by `RAG_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Top-level configuration for the retrieval pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Whether embedding generation and vector search are enabled at all
    #[serde(default)]
    pub enabled: bool,

    /// Embedding endpoint configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking and search behavior
    #[serde(default)]
    pub search: SearchTuning,

    /// Directory holding the LanceDB embedding store
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            embedding: EmbeddingConfig::default(),
            search: SearchTuning::default(),
            data_dir: None,
        }
    }
}

/// Embedding API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the LiteLLM-compatible endpoint; embedding calls fail
    /// with a configuration error when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token for the endpoint
    #[serde(default)]
    pub api_key: Option<String>,

    /// Active embedding model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Vector dimension produced by the model
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum number of texts sent per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: default_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_model() -> String {
    "amazon.titan-embed-text-v1".to_string()
}

fn default_dimension() -> usize {
    1536
}

fn default_batch_size() -> usize {
    20
}

/// Chunking and search behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTuning {
    /// Minimum cosine similarity for a vector hit
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,

    /// Nominal chunk width in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            similarity_threshold: default_threshold(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_threshold() -> f32 {
    0.7
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

impl RagConfig {
    /// Load configuration from `docrag.toml` (if present) and the environment.
    /// Environment variables take precedence over the file.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let toml_path = Self::toml_config_path();
        if toml_path.exists() {
            if let Ok(content) = std::fs::read_to_string(&toml_path) {
                if let Ok(file_config) = toml::from_str::<RagConfig>(&content) {
                    config = file_config;
                }
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Override fields from `RAG_*` environment variables
    fn apply_env(&mut self) {
        if let Ok(enabled) = std::env::var("RAG_ENABLED") {
            self.enabled = matches!(enabled.as_str(), "true" | "1" | "yes");
        }
        if let Ok(base_url) = std::env::var("RAG_LITELLM_BASE_URL") {
            if !base_url.is_empty() {
                self.embedding.base_url = Some(base_url);
            }
        }
        if let Ok(api_key) = std::env::var("RAG_LITELLM_API_KEY") {
            if !api_key.is_empty() {
                self.embedding.api_key = Some(api_key);
            }
        }
        if let Ok(model) = std::env::var("RAG_EMBEDDING_MODEL") {
            if !model.is_empty() {
                self.embedding.model = model;
            }
        }
        if let Ok(dimension) = env_parse::<usize>("RAG_EMBEDDING_DIMENSION") {
            self.embedding.dimension = dimension;
        }
        if let Ok(batch_size) = env_parse::<usize>("RAG_EMBEDDING_BATCH_SIZE") {
            self.embedding.batch_size = batch_size;
        }
        if let Ok(threshold) = env_parse::<f32>("RAG_SIMILARITY_THRESHOLD") {
            self.search.similarity_threshold = threshold;
        }
        if let Ok(chunk_size) = env_parse::<usize>("RAG_CHUNK_SIZE") {
            self.search.chunk_size = chunk_size;
        }
        if let Ok(overlap) = env_parse::<usize>("RAG_CHUNK_OVERLAP") {
            self.search.chunk_overlap = overlap;
        }
        if let Ok(dir) = std::env::var("RAG_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }
    }

    /// Resolve the LanceDB path, using a home-directory default if unset
    pub fn lancedb_path(&self) -> PathBuf {
        if let Some(ref dir) = self.data_dir {
            return dir.join("lancedb");
        }

        dirs::home_dir()
            .map(|h| h.join(".docrag").join("lancedb"))
            .unwrap_or_else(|| PathBuf::from(".docrag/lancedb"))
    }

    fn toml_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("DOCRAG_CONFIG_DIR") {
            return PathBuf::from(dir).join("docrag.toml");
        }

        dirs::home_dir()
            .map(|h| h.join(".docrag").join("docrag.toml"))
            .unwrap_or_else(|| PathBuf::from(".docrag/docrag.toml"))
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> std::result::Result<T, ()> {
    std::env::var(name)
        .map_err(|_| ())
        .and_then(|v| v.parse::<T>().map_err(|_| ()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.embedding.model, "amazon.titan-embed-text-v1");
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.embedding.batch_size, 20);
        assert_eq!(config.search.similarity_threshold, 0.7);
        assert_eq!(config.search.chunk_size, 500);
        assert_eq!(config.search.chunk_overlap, 50);
    }

    #[test]
    fn test_toml_round_trip() {
        let toml = r#"
            enabled = true

            [embedding]
            base_url = "http://litellm.internal:4000"
            model = "text-embedding-3-small"
            dimension = 1536

            [search]
            similarity_threshold = 0.5
            chunk_size = 400
            chunk_overlap = 40
        "#;
        let config: RagConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(
            config.embedding.base_url.as_deref(),
            Some("http://litellm.internal:4000")
        );
        assert_eq!(config.search.chunk_size, 400);
        // Fields absent from the file keep their defaults
        assert_eq!(config.embedding.batch_size, 20);
    }
}
