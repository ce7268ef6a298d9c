//! Common types for the retrieval pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A bounded substring of a document's text, sized for embedding.
/// Offsets are character offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// Trimmed chunk text, at least 50 characters
    pub text: String,
    /// Dense 0-based index within the document
    pub index: usize,
    /// Character offset of the window start
    pub start_offset: usize,
    /// Character offset of the window end (exclusive)
    pub end_offset: usize,
}

/// A persisted per-chunk embedding row. Rows are regenerated wholesale on
/// every reindex and never updated in place; `(document_id, chunk_index,
/// model_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub document_id: String,
    pub team_id: String,
    /// Embedding model that produced the vector
    pub model_id: String,
    /// Document version the vector was generated from
    pub document_version: i64,
    pub chunk_index: usize,
    /// The chunk text the vector encodes
    pub context: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Search mode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Vector search only
    #[default]
    Vector,
    /// Vector + keyword search fused with RRF
    Hybrid,
}

/// Search request parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum cosine similarity; falls back to the configured default
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default = "default_true")]
    pub include_context: bool,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,
}

fn default_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_vector_weight() -> f32 {
    0.7
}

fn default_keyword_weight() -> f32 {
    0.3
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: default_limit(),
            threshold: None,
            collection_id: None,
            document_id: None,
            include_context: true,
            mode: SearchMode::default(),
            vector_weight: default_vector_weight(),
            keyword_weight: default_keyword_weight(),
        }
    }

    /// Reject malformed parameters before any external call is made
    pub fn validate(&self) -> Result<()> {
        let query_chars = self.query.chars().count();
        if !(3..=1000).contains(&query_chars) {
            return Err(RagError::Validation(
                "query must be between 3 and 1000 characters".into(),
            ));
        }
        if !(1..=50).contains(&self.limit) {
            return Err(RagError::Validation("limit must be between 1 and 50".into()));
        }
        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(RagError::Validation(
                    "threshold must be between 0 and 1".into(),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.vector_weight)
            || !(0.0..=1.0).contains(&self.keyword_weight)
        {
            return Err(RagError::Validation(
                "weights must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

/// A single ranked search result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Embedding row id, or `kw_{documentId}` for keyword-only hits
    pub id: String,
    pub document_id: String,
    pub title: String,
    pub collection_id: String,
    /// Raw cosine similarity. Zero for keyword-only hits; never synthesized
    /// from rank.
    pub score: f32,
    /// RRF-fused combined score, set only by the hybrid ranker. This is the
    /// value hybrid results are ordered by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fused_score: Option<f32>,
    pub context: String,
    pub chunk_index: usize,
}

/// Search response envelope
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub data: Vec<SearchResult>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub limit: usize,
    pub total: usize,
}

impl SearchResponse {
    pub fn new(data: Vec<SearchResult>, limit: usize) -> Self {
        let total = data.len();
        Self {
            data,
            pagination: Pagination { limit, total },
        }
    }
}
