//! LanceDB embedding store

use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    types::Float32Type, FixedSizeListArray, Float32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray, UInt32Array,
};
use arrow_schema::{ArrowError, DataType, Field, Schema};
use async_trait::async_trait;
use chrono::SecondsFormat;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, DistanceType, Table};

use super::{ChunkHit, EmbeddingStore, NearestQuery};
use crate::error::{RagError, Result};
use crate::types::EmbeddingRecord;

const TABLE_NAME: &str = "document_embeddings";

/// Embedding store backed by LanceDB. Whole-document replacement is a single
/// `merge_insert` commit, so readers never observe a partially replaced set.
pub struct LanceEmbeddingStore {
    table: Table,
    dimension: usize,
}

impl LanceEmbeddingStore {
    /// Open the database at `db_path`, creating the embeddings table when it
    /// does not exist yet
    pub async fn connect(db_path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = connect(db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(RagError::Lance)?;

        let schema = embedding_schema(dimension);
        let table_names = db.table_names().execute().await.map_err(RagError::Lance)?;
        let table = if table_names.contains(&TABLE_NAME.to_string()) {
            db.open_table(TABLE_NAME)
                .execute()
                .await
                .map_err(RagError::Lance)?
        } else {
            let empty: Vec<std::result::Result<RecordBatch, ArrowError>> = vec![];
            db.create_table(
                TABLE_NAME,
                Box::new(RecordBatchIterator::new(empty, schema.clone())),
            )
            .execute()
            .await
            .map_err(RagError::Lance)?
        };

        Ok(Self { table, dimension })
    }

    fn records_to_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch> {
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let document_ids: Vec<&str> = records.iter().map(|r| r.document_id.as_str()).collect();
        let team_ids: Vec<&str> = records.iter().map(|r| r.team_id.as_str()).collect();
        let model_ids: Vec<&str> = records.iter().map(|r| r.model_id.as_str()).collect();
        let versions: Vec<i64> = records.iter().map(|r| r.document_version).collect();
        let chunk_indices: Vec<u32> = records.iter().map(|r| r.chunk_index as u32).collect();
        let contexts: Vec<&str> = records.iter().map(|r| r.context.as_str()).collect();
        let created_ats: Vec<String> = records
            .iter()
            .map(|r| r.created_at.to_rfc3339_opts(SecondsFormat::Millis, true))
            .collect();

        let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            records
                .iter()
                .map(|r| Some(r.vector.iter().copied().map(Some).collect::<Vec<_>>())),
            self.dimension as i32,
        );

        RecordBatch::try_new(
            embedding_schema(self.dimension),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(document_ids)),
                Arc::new(StringArray::from(team_ids)),
                Arc::new(StringArray::from(model_ids)),
                Arc::new(Int64Array::from(versions)),
                Arc::new(UInt32Array::from(chunk_indices)),
                Arc::new(StringArray::from(contexts)),
                Arc::new(StringArray::from(created_ats)),
                Arc::new(vectors),
            ],
        )
        .map_err(|e| RagError::Store(e.to_string()))
    }
}

fn embedding_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("team_id", DataType::Utf8, false),
        Field::new("model_id", DataType::Utf8, false),
        Field::new("document_version", DataType::Int64, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("context", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension as i32,
            ),
            false,
        ),
    ]))
}

fn document_filter(document_id: &str, model_id: &str) -> String {
    format!(
        "document_id = '{}' AND model_id = '{}'",
        escape(document_id),
        escape(model_id)
    )
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| RagError::Store(format!("missing {name} column")))
}

#[async_trait]
impl EmbeddingStore for LanceEmbeddingStore {
    async fn replace_document_embeddings(
        &self,
        document_id: &str,
        model_id: &str,
        records: Vec<EmbeddingRecord>,
    ) -> Result<usize> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(RagError::Store(format!(
                "vector dimension mismatch: expected {}, got {} (chunk {})",
                self.dimension,
                bad.vector.len(),
                bad.chunk_index
            )));
        }

        let count = records.len();
        let batch = self.records_to_batch(&records)?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], embedding_schema(self.dimension));

        // Single commit: rows of this (document, model) absent from the new
        // set are deleted, new rows inserted. No partial state is visible.
        let mut merge = self.table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all()
            .when_not_matched_by_source_delete(Some(document_filter(document_id, model_id)));
        merge
            .execute(Box::new(batches))
            .await
            .map_err(RagError::Lance)?;

        Ok(count)
    }

    async fn latest_document_version(
        &self,
        document_id: &str,
        model_id: &str,
    ) -> Result<Option<i64>> {
        let batches = self
            .table
            .query()
            .only_if(document_filter(document_id, model_id))
            .execute()
            .await
            .map_err(RagError::Lance)?
            .try_collect::<Vec<_>>()
            .await
            .map_err(RagError::Lance)?;

        let mut latest: Option<i64> = None;
        for batch in batches {
            let versions = batch
                .column_by_name("document_version")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| RagError::Store("missing document_version column".to_string()))?;
            for i in 0..batch.num_rows() {
                let version = versions.value(i);
                latest = Some(latest.map_or(version, |v| v.max(version)));
            }
        }
        Ok(latest)
    }

    async fn delete_document_embeddings(&self, document_id: &str, model_id: &str) -> Result<()> {
        self.table
            .delete(&document_filter(document_id, model_id))
            .await
            .map_err(RagError::Lance)?;
        Ok(())
    }

    async fn delete_obsolete_embeddings(
        &self,
        active_model_id: &str,
        team_id: Option<&str>,
    ) -> Result<usize> {
        let mut filter = format!("model_id != '{}'", escape(active_model_id));
        if let Some(team) = team_id {
            filter.push_str(&format!(" AND team_id = '{}'", escape(team)));
        }

        // LanceDB's delete does not report a count, so count matching rows
        // first; the reaper runs unconcurrently with writers for its scope
        let count = self
            .table
            .count_rows(Some(filter.clone()))
            .await
            .map_err(RagError::Lance)?;
        self.table.delete(&filter).await.map_err(RagError::Lance)?;
        Ok(count)
    }

    async fn nearest_chunks(&self, query: &NearestQuery) -> Result<Vec<ChunkHit>> {
        let mut filter = format!(
            "team_id = '{}' AND model_id = '{}'",
            escape(&query.team_id),
            escape(&query.model_id)
        );
        if let Some(ref document_id) = query.document_id {
            filter.push_str(&format!(" AND document_id = '{}'", escape(document_id)));
        }

        let batches = self
            .table
            .vector_search(query.vector.clone())
            .map_err(RagError::Lance)?
            .distance_type(DistanceType::Cosine)
            .only_if(filter)
            .limit(query.limit)
            .execute()
            .await
            .map_err(RagError::Lance)?
            .try_collect::<Vec<_>>()
            .await
            .map_err(RagError::Lance)?;

        let mut hits = Vec::new();
        for batch in batches {
            let ids = string_column(&batch, "id")?;
            let document_ids = string_column(&batch, "document_id")?;
            let contexts = string_column(&batch, "context")?;
            let chunk_indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
                .ok_or_else(|| RagError::Store("missing chunk_index column".to_string()))?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| RagError::Store("missing _distance column".to_string()))?;

            for i in 0..batch.num_rows() {
                hits.push(ChunkHit {
                    id: ids.value(i).to_string(),
                    document_id: document_ids.value(i).to_string(),
                    chunk_index: chunk_indices.value(i) as usize,
                    context: contexts.value(i).to_string(),
                    // Cosine similarity from cosine distance
                    score: 1.0 - distances.value(i),
                });
            }
        }

        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        self.table.count_rows(None).await.map_err(RagError::Lance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(document_id: &str, model_id: &str, chunk_index: usize, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            team_id: "team-1".to_string(),
            model_id: model_id.to_string(),
            document_version: 3,
            chunk_index,
            context: format!("chunk {chunk_index}"),
            vector,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_replace_then_search_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = LanceEmbeddingStore::connect(&dir.path().join("lancedb"), 4)
            .await
            .unwrap();

        store
            .replace_document_embeddings(
                "doc-1",
                "m1",
                vec![
                    record("doc-1", "m1", 0, vec![1.0, 0.0, 0.0, 0.0]),
                    record("doc-1", "m1", 1, vec![0.0, 1.0, 0.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(
            store.latest_document_version("doc-1", "m1").await.unwrap(),
            Some(3)
        );

        let hits = store
            .nearest_chunks(&NearestQuery {
                vector: vec![1.0, 0.0, 0.0, 0.0],
                team_id: "team-1".to_string(),
                model_id: "m1".to_string(),
                document_id: None,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_index, 0);
        assert!(hits[0].score > hits[1].score);
        assert!((hits[0].score - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_replace_drops_stale_rows() {
        let dir = TempDir::new().unwrap();
        let store = LanceEmbeddingStore::connect(&dir.path().join("lancedb"), 2)
            .await
            .unwrap();

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
        store
            .replace_document_embeddings("doc-1", "m1", vec![record("doc-1", "m1", 0, vec![0.5, 0.5])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LanceEmbeddingStore::connect(&dir.path().join("lancedb"), 4)
            .await
            .unwrap();

        let err = store
            .replace_document_embeddings("doc-1", "m1", vec![record("doc-1", "m1", 0, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Store(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_obsolete_counts_removed_rows() {
        let dir = TempDir::new().unwrap();
        let store = LanceEmbeddingStore::connect(&dir.path().join("lancedb"), 2)
            .await
            .unwrap();

        store
            .replace_document_embeddings("doc-1", "m1", vec![record("doc-1", "m1", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .replace_document_embeddings("doc-2", "m2", vec![record("doc-2", "m2", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let removed = store.delete_obsolete_embeddings("m2", None).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
