//! JSON-file document corpus
//!
//! A self-contained document catalog for the command-line tool: documents,
//! users and their access grants load from one JSON file. Also provides a
//! term-frequency keyword engine over the same corpus so hybrid search works
//! without an external full-text service.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::documents::{
    AccessScope, Document, DocumentStore, KeywordHit, KeywordSearch, UserContext,
};
use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusUser {
    pub id: String,
    pub team_id: String,
    #[serde(default)]
    pub collection_ids: Vec<String>,
    #[serde(default)]
    pub document_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CorpusFile {
    documents: Vec<Document>,
    #[serde(default)]
    users: Vec<CorpusUser>,
}

pub struct JsonCorpus {
    documents: Vec<Document>,
    users: Vec<CorpusUser>,
}

impl JsonCorpus {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CorpusFile = serde_json::from_str(&content)?;
        Ok(Self {
            documents: file.documents,
            users: file.users,
        })
    }

    pub fn from_parts(documents: Vec<Document>, users: Vec<CorpusUser>) -> Self {
        Self { documents, users }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Synchronous user lookup for callers outside the trait
    pub fn user_context(&self, id: &str) -> Option<UserContext> {
        self.users.iter().find(|u| u.id == id).map(|u| UserContext {
            id: u.id.clone(),
            team_id: u.team_id.clone(),
        })
    }
}

#[async_trait]
impl DocumentStore for JsonCorpus {
    async fn document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn documents(&self, ids: &[String]) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }

    async fn searchable_document_ids(&self, team_id: &str) -> Result<Vec<String>> {
        Ok(self
            .documents
            .iter()
            .filter(|d| d.team_id == team_id && d.is_searchable())
            .map(|d| d.id.clone())
            .collect())
    }

    async fn user(&self, id: &str) -> Result<Option<UserContext>> {
        Ok(self.users.iter().find(|u| u.id == id).map(|u| UserContext {
            id: u.id.clone(),
            team_id: u.team_id.clone(),
        }))
    }

    async fn access_scope(&self, user: &UserContext) -> Result<AccessScope> {
        Ok(self
            .users
            .iter()
            .find(|u| u.id == user.id)
            .map(|u| AccessScope {
                collection_ids: u.collection_ids.clone(),
                document_ids: u.document_ids.clone(),
            })
            .unwrap_or_default())
    }
}

/// Term-frequency keyword search over a [`JsonCorpus`]. Applies the same
/// searchability and access filtering as vector search.
pub struct CorpusKeywordSearch {
    corpus: Arc<JsonCorpus>,
}

impl CorpusKeywordSearch {
    pub fn new(corpus: Arc<JsonCorpus>) -> Self {
        Self { corpus }
    }
}

#[async_trait]
impl KeywordSearch for CorpusKeywordSearch {
    async fn search(
        &self,
        user: &UserContext,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let scope = self.corpus.access_scope(user).await?;
        let mut scored: Vec<(usize, &Document)> = self
            .corpus
            .documents
            .iter()
            .filter(|d| d.team_id == user.team_id && d.is_searchable() && scope.allows(d))
            .filter_map(|d| {
                let score = score_document(d, &terms);
                (score > 0).then_some((score, d))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(_, d)| KeywordHit {
                document_id: d.id.clone(),
                title: d.title.clone(),
                collection_id: d.collection_id.clone(),
                context: snippet(&d.text, &terms),
            })
            .collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Title matches count double
fn score_document(document: &Document, terms: &[String]) -> usize {
    let title_tokens = tokenize(&document.title);
    let text_tokens = tokenize(&document.text);
    terms
        .iter()
        .map(|term| {
            let in_title = title_tokens.iter().filter(|t| *t == term).count();
            let in_text = text_tokens.iter().filter(|t| *t == term).count();
            in_title * 2 + in_text
        })
        .sum()
}

/// Up to 160 characters around the first term occurrence. Matching is done
/// per character: lowercasing whole strings can change byte lengths, so byte
/// offsets from a lowercased copy must never index the original text.
fn snippet(text: &str, terms: &[String]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let position = terms.iter().filter_map(|term| find_term(&chars, term)).min();
    let start = position.map_or(0, |p| p.saturating_sub(40));
    chars.iter().skip(start).take(160).collect::<String>().trim().to_string()
}

/// Character index of the first case-insensitive occurrence of `term`
fn find_term(chars: &[char], term: &str) -> Option<usize> {
    let term_chars: Vec<char> = term.chars().collect();
    if term_chars.is_empty() {
        return None;
    }
    chars.windows(term_chars.len()).position(|window| {
        window
            .iter()
            .zip(&term_chars)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn document(id: &str, collection_id: &str, title: &str, text: &str) -> Document {
        Document {
            id: id.to_string(),
            team_id: "team-1".to_string(),
            collection_id: collection_id.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            version: 1,
            published_at: Some(Utc::now()),
            deleted_at: None,
            archived_at: None,
        }
    }

    fn corpus() -> Arc<JsonCorpus> {
        Arc::new(JsonCorpus::from_parts(
            vec![
                document("doc-1", "col-1", "Deployment guide", "How to deploy the service safely."),
                document("doc-2", "col-1", "Onboarding", "Welcome! Deploy keys are covered later. Deploy twice."),
                document("doc-3", "col-2", "Secret plans", "Deploy the secret deploy deploy."),
            ],
            vec![CorpusUser {
                id: "user-1".to_string(),
                team_id: "team-1".to_string(),
                collection_ids: vec!["col-1".to_string()],
                document_ids: vec![],
            }],
        ))
    }

    fn user() -> UserContext {
        UserContext {
            id: "user-1".to_string(),
            team_id: "team-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_corpus_lookups() {
        let corpus = corpus();
        assert!(corpus.document("doc-1").await.unwrap().is_some());
        assert!(corpus.document("nope").await.unwrap().is_none());
        assert_eq!(
            corpus.searchable_document_ids("team-1").await.unwrap().len(),
            3
        );

        let scope = corpus.access_scope(&user()).await.unwrap();
        assert!(scope.collection_ids.contains(&"col-1".to_string()));
    }

    #[tokio::test]
    async fn test_keyword_search_ranks_by_frequency() {
        let engine = CorpusKeywordSearch::new(corpus());
        let hits = engine.search(&user(), "deploy", 10).await.unwrap();

        // doc-3 has the most matches but sits outside the user's scope
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document_id, "doc-2");
        assert_eq!(hits[1].document_id, "doc-1");
        assert!(hits[0].context.to_lowercase().contains("deploy"));
    }

    #[tokio::test]
    async fn test_keyword_snippet_with_case_changing_unicode() {
        // 'İ' grows from 2 to 3 bytes under lowercasing; snippet extraction
        // must stay character-based
        let text = format!("{} deploy the service carefully", "İ".repeat(30));
        let corpus = Arc::new(JsonCorpus::from_parts(
            vec![document("doc-u", "col-1", "Uppercase dotted I", &text)],
            vec![CorpusUser {
                id: "user-1".to_string(),
                team_id: "team-1".to_string(),
                collection_ids: vec!["col-1".to_string()],
                document_ids: vec![],
            }],
        ));
        let engine = CorpusKeywordSearch::new(corpus);

        let hits = engine.search(&user(), "deploy", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].context.contains("deploy"));
    }

    #[tokio::test]
    async fn test_keyword_search_no_match() {
        let engine = CorpusKeywordSearch::new(corpus());
        let hits = engine.search(&user(), "kubernetes", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_load_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(
            &path,
            r#"{
                "documents": [{
                    "id": "doc-1",
                    "teamId": "team-1",
                    "collectionId": "col-1",
                    "title": "Hello",
                    "text": "Some text",
                    "version": 2,
                    "publishedAt": "2026-01-01T00:00:00Z"
                }],
                "users": [{
                    "id": "user-1",
                    "teamId": "team-1",
                    "collectionIds": ["col-1"]
                }]
            }"#,
        )
        .unwrap();

        let corpus = JsonCorpus::load(&path).unwrap();
        assert_eq!(corpus.len(), 1);
        let document = corpus.document("doc-1").await.unwrap().unwrap();
        assert_eq!(document.version, 2);
        assert!(document.is_searchable());
    }
}
