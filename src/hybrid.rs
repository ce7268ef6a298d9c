//! Hybrid search with reciprocal rank fusion
//!
//! Runs vector and keyword search concurrently and fuses the two rankings
//! with RRF. Fusion is keyed by document: a document's contribution from each
//! ranking is `weight / (k + rank + 1)`, summed. Documents found only by the
//! keyword engine still surface, with a zero similarity score.

use std::collections::HashMap;
use std::sync::Arc;

use crate::documents::{KeywordHit, KeywordSearch, UserContext};
use crate::error::Result;
use crate::search::VectorSearchEngine;
use crate::types::{SearchMode, SearchRequest, SearchResponse, SearchResult};

/// Standard RRF dampening constant
const RRF_K: f32 = 60.0;

pub struct HybridSearchEngine {
    vector: VectorSearchEngine,
    keyword: Arc<dyn KeywordSearch>,
}

impl HybridSearchEngine {
    pub fn new(vector: VectorSearchEngine, keyword: Arc<dyn KeywordSearch>) -> Self {
        Self { vector, keyword }
    }

    /// Dispatch on the requested mode. Vector mode never touches the keyword
    /// engine.
    pub async fn search(
        &self,
        user: &UserContext,
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        request.validate()?;

        let results = match request.mode {
            SearchMode::Vector => self.vector.search(user, request).await?,
            SearchMode::Hybrid => {
                let (vector_results, keyword_hits) = tokio::join!(
                    self.vector.search(user, request),
                    self.keyword.search(user, &request.query, request.limit),
                );
                merge_with_rrf(
                    vector_results?,
                    keyword_hits?,
                    request.vector_weight,
                    request.keyword_weight,
                    request.limit,
                    request.include_context,
                )
            }
        };

        Ok(SearchResponse::new(results, request.limit))
    }
}

fn merge_with_rrf(
    vector_results: Vec<SearchResult>,
    keyword_hits: Vec<KeywordHit>,
    vector_weight: f32,
    keyword_weight: f32,
    limit: usize,
    include_context: bool,
) -> Vec<SearchResult> {
    let mut fused: HashMap<String, f32> = HashMap::new();
    let mut entries: HashMap<String, SearchResult> = HashMap::new();

    for (rank, result) in vector_results.into_iter().enumerate() {
        *fused.entry(result.document_id.clone()).or_default() +=
            vector_weight / (RRF_K + rank as f32 + 1.0);
        // Vector results arrive best chunk first; keep that chunk as the
        // document's representative
        entries.entry(result.document_id.clone()).or_insert(result);
    }

    for (rank, hit) in keyword_hits.into_iter().enumerate() {
        *fused.entry(hit.document_id.clone()).or_default() +=
            keyword_weight / (RRF_K + rank as f32 + 1.0);
        entries
            .entry(hit.document_id.clone())
            .or_insert_with(|| SearchResult {
                id: format!("kw_{}", hit.document_id),
                document_id: hit.document_id,
                title: hit.title,
                collection_id: hit.collection_id,
                // No similarity was measured for keyword-only hits
                score: 0.0,
                fused_score: None,
                context: if include_context {
                    hit.context
                } else {
                    String::new()
                },
                chunk_index: 0,
            });
    }

    let mut results: Vec<SearchResult> = entries
        .into_values()
        .map(|mut result| {
            result.fused_score = fused.get(&result.document_id).copied();
            result
        })
        .collect();

    results.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_result(document_id: &str, score: f32) -> SearchResult {
        SearchResult {
            id: format!("row-{document_id}"),
            document_id: document_id.to_string(),
            title: format!("Title {document_id}"),
            collection_id: "col-1".to_string(),
            score,
            fused_score: None,
            context: "some chunk text".to_string(),
            chunk_index: 2,
        }
    }

    fn keyword_hit(document_id: &str) -> KeywordHit {
        KeywordHit {
            document_id: document_id.to_string(),
            title: format!("Title {document_id}"),
            collection_id: "col-1".to_string(),
            context: "keyword snippet".to_string(),
        }
    }

    #[test]
    fn test_document_in_both_rankings_wins() {
        // B appears in both rankings, A and C in one each
        let results = merge_with_rrf(
            vec![vector_result("a", 0.92), vector_result("b", 0.88)],
            vec![keyword_hit("b"), keyword_hit("c")],
            0.7,
            0.3,
            10,
            true,
        );

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].document_id, "b");
        let b = results[0].fused_score.unwrap();
        let a = results[1].fused_score.unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_keyword_only_hit_shape() {
        let results = merge_with_rrf(vec![], vec![keyword_hit("doc-9")], 0.7, 0.3, 10, true);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "kw_doc-9");
        assert_eq!(results[0].score, 0.0);
        assert_eq!(results[0].chunk_index, 0);
        assert!(results[0].fused_score.is_some());
    }

    #[test]
    fn test_merged_hit_keeps_vector_fields() {
        let results = merge_with_rrf(
            vec![vector_result("doc-1", 0.9)],
            vec![keyword_hit("doc-1")],
            0.7,
            0.3,
            10,
            true,
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "row-doc-1");
        assert_eq!(results[0].score, 0.9);
        assert_eq!(results[0].chunk_index, 2);
    }

    #[test]
    fn test_truncates_to_limit() {
        let vector: Vec<SearchResult> = (0..8)
            .map(|i| vector_result(&format!("doc-{i}"), 0.9 - i as f32 * 0.01))
            .collect();
        let results = merge_with_rrf(vector, vec![], 0.7, 0.3, 3, true);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].document_id, "doc-0");
    }

    #[test]
    fn test_context_stripped_for_keyword_hits_when_disabled() {
        let results = merge_with_rrf(vec![], vec![keyword_hit("doc-1")], 0.7, 0.3, 10, false);
        assert!(results[0].context.is_empty());
    }
}
