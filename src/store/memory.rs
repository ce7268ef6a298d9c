//! In-memory embedding store
//!
//! Brute-force cosine scan behind an RwLock. Suitable for tests and small
//! single-process deployments; replacement is atomic because it happens
//! entirely under the write lock.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{cosine_similarity, ChunkHit, EmbeddingStore, NearestQuery};
use crate::error::Result;
use crate::types::EmbeddingRecord;

#[derive(Default)]
pub struct MemoryEmbeddingStore {
    rows: RwLock<Vec<EmbeddingRecord>>,
}

impl MemoryEmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows, test helper
    pub fn rows(&self) -> Vec<EmbeddingRecord> {
        self.rows.read().clone()
    }
}

#[async_trait]
impl EmbeddingStore for MemoryEmbeddingStore {
    async fn replace_document_embeddings(
        &self,
        document_id: &str,
        model_id: &str,
        records: Vec<EmbeddingRecord>,
    ) -> Result<usize> {
        let count = records.len();
        let mut rows = self.rows.write();
        rows.retain(|row| !(row.document_id == document_id && row.model_id == model_id));
        rows.extend(records);
        Ok(count)
    }

    async fn latest_document_version(
        &self,
        document_id: &str,
        model_id: &str,
    ) -> Result<Option<i64>> {
        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|row| row.document_id == document_id && row.model_id == model_id)
            .map(|row| row.document_version)
            .max())
    }

    async fn delete_document_embeddings(&self, document_id: &str, model_id: &str) -> Result<()> {
        let mut rows = self.rows.write();
        rows.retain(|row| !(row.document_id == document_id && row.model_id == model_id));
        Ok(())
    }

    async fn delete_obsolete_embeddings(
        &self,
        active_model_id: &str,
        team_id: Option<&str>,
    ) -> Result<usize> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|row| {
            let obsolete = row.model_id != active_model_id
                && team_id.map_or(true, |team| row.team_id == team);
            !obsolete
        });
        Ok(before - rows.len())
    }

    async fn nearest_chunks(&self, query: &NearestQuery) -> Result<Vec<ChunkHit>> {
        let rows = self.rows.read();
        let mut hits: Vec<ChunkHit> = rows
            .iter()
            .filter(|row| row.team_id == query.team_id && row.model_id == query.model_id)
            .filter(|row| {
                query
                    .document_id
                    .as_ref()
                    .map_or(true, |id| row.document_id == *id)
            })
            .map(|row| ChunkHit {
                id: row.id.clone(),
                document_id: row.document_id.clone(),
                chunk_index: row.chunk_index,
                context: row.context.clone(),
                score: cosine_similarity(&query.vector, &row.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(document_id: &str, model_id: &str, chunk_index: usize, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: format!("{document_id}#{chunk_index}#{model_id}"),
            document_id: document_id.to_string(),
            team_id: "team-1".to_string(),
            model_id: model_id.to_string(),
            document_version: 1,
            chunk_index,
            context: format!("chunk {chunk_index} of {document_id}"),
            vector,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let store = MemoryEmbeddingStore::new();
        store
            .replace_document_embeddings(
                "doc-1",
                "m1",
                vec![
                    record("doc-1", "m1", 0, vec![1.0, 0.0]),
                    record("doc-1", "m1", 1, vec![0.0, 1.0]),
                    record("doc-1", "m1", 2, vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        // A smaller regeneration fully replaces the prior set
        store
            .replace_document_embeddings("doc-1", "m1", vec![record("doc-1", "m1", 0, vec![0.5, 0.5])])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_leaves_other_models_alone() {
        let store = MemoryEmbeddingStore::new();
        store
            .replace_document_embeddings("doc-1", "m1", vec![record("doc-1", "m1", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .replace_document_embeddings("doc-1", "m2", vec![record("doc-1", "m2", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        store
            .replace_document_embeddings("doc-1", "m1", vec![record("doc-1", "m1", 0, vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_latest_document_version() {
        let store = MemoryEmbeddingStore::new();
        assert_eq!(
            store.latest_document_version("doc-1", "m1").await.unwrap(),
            None
        );

        let mut row = record("doc-1", "m1", 0, vec![1.0, 0.0]);
        row.document_version = 7;
        store
            .replace_document_embeddings("doc-1", "m1", vec![row])
            .await
            .unwrap();
        assert_eq!(
            store.latest_document_version("doc-1", "m1").await.unwrap(),
            Some(7)
        );
        assert_eq!(
            store.latest_document_version("doc-1", "m2").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_nearest_chunks_sorted_and_scoped() {
        let store = MemoryEmbeddingStore::new();
        store
            .replace_document_embeddings(
                "doc-1",
                "m1",
                vec![
                    record("doc-1", "m1", 0, vec![0.0, 1.0]),
                    record("doc-1", "m1", 1, vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        store
            .replace_document_embeddings("doc-2", "m2", vec![record("doc-2", "m2", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = store
            .nearest_chunks(&NearestQuery {
                vector: vec![1.0, 0.0],
                team_id: "team-1".to_string(),
                model_id: "m1".to_string(),
                document_id: None,
                limit: 10,
            })
            .await
            .unwrap();

        // Only m1 rows, best match first
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_index, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[1].score < hits[0].score);
    }

    #[tokio::test]
    async fn test_delete_obsolete_embeddings() {
        let store = MemoryEmbeddingStore::new();
        store
            .replace_document_embeddings("doc-1", "m1", vec![record("doc-1", "m1", 0, vec![1.0])])
            .await
            .unwrap();
        store
            .replace_document_embeddings("doc-2", "m1", vec![record("doc-2", "m1", 0, vec![1.0])])
            .await
            .unwrap();
        store
            .replace_document_embeddings("doc-3", "m2", vec![record("doc-3", "m2", 0, vec![1.0])])
            .await
            .unwrap();

        let removed = store.delete_obsolete_embeddings("m2", None).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.rows().iter().all(|row| row.model_id == "m2"));
    }
}
