//! Embedding generation pipeline
//!
//! Turns a document into per-chunk embedding rows: chunk, embed, then replace
//! the stored set in one atomic write. Vectors are fetched from the upstream
//! API before anything is deleted, so a failed embedding call leaves the
//! previous (possibly stale) embeddings intact and searchable.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::chunker::Chunker;
use crate::config::RagConfig;
use crate::documents::DocumentStore;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::EmbeddingStore;
use crate::types::EmbeddingRecord;

/// What a generation run did for a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// Embedding generation is disabled in configuration
    Disabled,
    /// The document does not exist
    DocumentMissing,
    /// Stored embeddings already cover the document's current version
    UpToDate,
    /// The document is not searchable (or yielded no chunks); any stored
    /// embeddings were removed
    Cleared,
    /// Fresh embeddings were written
    Regenerated { chunks: usize },
}

pub struct EmbeddingPipeline {
    config: RagConfig,
    documents: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn EmbeddingStore>,
    chunker: Chunker,
}

impl EmbeddingPipeline {
    pub fn new(
        config: RagConfig,
        documents: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn EmbeddingStore>,
    ) -> Self {
        let chunker = Chunker::new(config.search.chunk_size, config.search.chunk_overlap);
        Self {
            config,
            documents,
            embedder,
            store,
            chunker,
        }
    }

    /// Bring the stored embeddings for `document_id` up to date with the
    /// document's current text. `force` skips the staleness check and always
    /// regenerates.
    pub async fn generate(&self, document_id: &str, force: bool) -> Result<GenerateOutcome> {
        if !self.config.enabled {
            debug!("embedding generation disabled, skipping {document_id}");
            return Ok(GenerateOutcome::Disabled);
        }

        let model_id = &self.config.embedding.model;

        let document = match self.documents.document(document_id).await? {
            Some(document) => document,
            None => {
                warn!("document {document_id} not found, skipping embedding generation");
                return Ok(GenerateOutcome::DocumentMissing);
            }
        };

        if !document.is_searchable() {
            debug!("document {document_id} is not searchable, clearing embeddings");
            self.store
                .delete_document_embeddings(document_id, model_id)
                .await?;
            return Ok(GenerateOutcome::Cleared);
        }

        if !force {
            let stored = self
                .store
                .latest_document_version(document_id, model_id)
                .await?;
            if stored.map_or(false, |version| version >= document.version) {
                debug!(
                    "embeddings for {document_id} cover version {} already",
                    document.version
                );
                return Ok(GenerateOutcome::UpToDate);
            }
        }

        let chunks = self.chunker.chunk_text(&document.text);
        if chunks.is_empty() {
            debug!("document {document_id} produced no chunks, clearing embeddings");
            self.store
                .delete_document_embeddings(document_id, model_id)
                .await?;
            return Ok(GenerateOutcome::Cleared);
        }

        // Embed before touching the store: an upstream failure must not leave
        // the document without its previous embeddings
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(texts).await?;

        let created_at = Utc::now();
        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord {
                id: Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                team_id: document.team_id.clone(),
                model_id: model_id.clone(),
                document_version: document.version,
                chunk_index: chunk.index,
                context: chunk.text.clone(),
                vector,
                created_at,
            })
            .collect();

        let written = self
            .store
            .replace_document_embeddings(document_id, model_id, records)
            .await?;

        info!(
            "regenerated {written} embeddings for document {document_id} at version {}",
            document.version
        );
        Ok(GenerateOutcome::Regenerated { chunks: written })
    }
}
