//! Embedding persistence and nearest-neighbour retrieval
//!
//! The store holds one row per `(document, model, chunk index)` and exposes a
//! small vector-index abstraction: atomic whole-document replacement, version
//! lookup for staleness checks, bulk deletes and a cosine candidate query.
//! Access-control and document-status filtering happen in the search engine,
//! which joins candidates against the document catalog.

mod lance;
mod memory;

pub use lance::LanceEmbeddingStore;
pub use memory::MemoryEmbeddingStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::EmbeddingRecord;

/// Nearest-neighbour candidate query. `limit` should be oversampled relative
/// to the caller's result limit since status/access filtering happens after.
#[derive(Debug, Clone)]
pub struct NearestQuery {
    pub vector: Vec<f32>,
    pub team_id: String,
    pub model_id: String,
    /// Restrict to a single document when set
    pub document_id: Option<String>,
    pub limit: usize,
}

/// A candidate chunk returned by the store, ordered by similarity descending
#[derive(Debug, Clone)]
pub struct ChunkHit {
    /// Embedding row id
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub context: String,
    /// Cosine similarity to the query vector
    pub score: f32,
}

#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Atomically replace every row for `(document_id, model_id)` with
    /// `records`. Concurrent readers observe either the full prior set or the
    /// full new set, never a mix. Returns the number of rows written.
    async fn replace_document_embeddings(
        &self,
        document_id: &str,
        model_id: &str,
        records: Vec<EmbeddingRecord>,
    ) -> Result<usize>;

    /// Most recent `document_version` stored for `(document_id, model_id)`;
    /// `None` when no embeddings exist yet
    async fn latest_document_version(
        &self,
        document_id: &str,
        model_id: &str,
    ) -> Result<Option<i64>>;

    /// Drop every row for `(document_id, model_id)`
    async fn delete_document_embeddings(&self, document_id: &str, model_id: &str) -> Result<()>;

    /// Drop every row whose model differs from `active_model_id`, optionally
    /// scoped to one team. Returns the number of rows removed.
    async fn delete_obsolete_embeddings(
        &self,
        active_model_id: &str,
        team_id: Option<&str>,
    ) -> Result<usize>;

    /// Cosine nearest-neighbour candidates, similarity descending
    async fn nearest_chunks(&self, query: &NearestQuery) -> Result<Vec<ChunkHit>>;

    /// Total row count
    async fn count(&self) -> Result<usize>;
}

/// Cosine similarity between two vectors, in `[-1, 1]`
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
