//! Vector similarity search
//!
//! Embeds the query, fetches an oversampled candidate set from the embedding
//! store, then joins the candidates against the document catalog to apply
//! status and per-user access filtering before ranking and truncation.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::config::RagConfig;
use crate::documents::{DocumentStore, UserContext};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::{EmbeddingStore, NearestQuery};
use crate::types::{SearchRequest, SearchResult};

pub struct VectorSearchEngine {
    config: RagConfig,
    documents: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn EmbeddingStore>,
}

impl VectorSearchEngine {
    pub fn new(
        config: RagConfig,
        documents: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn EmbeddingStore>,
    ) -> Self {
        Self {
            config,
            documents,
            embedder,
            store,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Ranked chunk results visible to `user`, similarity descending
    pub async fn search(
        &self,
        user: &UserContext,
        request: &SearchRequest,
    ) -> Result<Vec<SearchResult>> {
        request.validate()?;

        if !self.config.enabled {
            debug!("vector search disabled, returning no results");
            return Ok(vec![]);
        }

        let query_vector = self.embedder.embed_one(&request.query).await?;
        let scope = self.documents.access_scope(user).await?;

        // Status and access filtering discard candidates after the fact, so
        // ask the store for more than the caller's limit
        let oversampled = (request.limit * 4).clamp(16, 400);
        let hits = self
            .store
            .nearest_chunks(&NearestQuery {
                vector: query_vector,
                team_id: user.team_id.clone(),
                model_id: self.config.embedding.model.clone(),
                document_id: request.document_id.clone(),
                limit: oversampled,
            })
            .await?;

        let threshold = request
            .threshold
            .unwrap_or(self.config.search.similarity_threshold);
        let hits: Vec<_> = hits
            .into_iter()
            .filter(|hit| hit.score > threshold)
            .collect();

        if hits.is_empty() {
            return Ok(vec![]);
        }

        let mut document_ids: Vec<String> = hits.iter().map(|h| h.document_id.clone()).collect();
        document_ids.sort();
        document_ids.dedup();
        let documents: HashMap<String, _> = self
            .documents
            .documents(&document_ids)
            .await?
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        let mut results = Vec::with_capacity(request.limit);
        for hit in hits {
            let document = match documents.get(&hit.document_id) {
                Some(document) => document,
                None => continue,
            };
            if !document.is_searchable() {
                continue;
            }
            if let Some(ref collection_id) = request.collection_id {
                if document.collection_id != *collection_id {
                    continue;
                }
            }
            if !scope.allows(document) {
                continue;
            }

            results.push(SearchResult {
                id: hit.id,
                document_id: hit.document_id,
                title: document.title.clone(),
                collection_id: document.collection_id.clone(),
                score: hit.score,
                fused_score: None,
                context: if request.include_context {
                    hit.context
                } else {
                    String::new()
                },
                chunk_index: hit.chunk_index,
            });
            if results.len() >= request.limit {
                break;
            }
        }

        Ok(results)
    }
}
