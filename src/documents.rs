//! External collaborator interfaces
//!
//! The document catalog, its access-control predicates and the keyword
//! full-text engine live outside this crate; the pipeline and search engines
//! talk to them through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A document as seen by the retrieval pipeline. Referenced, not owned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub team_id: String,
    pub collection_id: String,
    pub title: String,
    pub text: String,
    /// Monotonically increasing edit version; embeddings generated at an
    /// older version are stale
    pub version: i64,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Published, not deleted, not archived
    pub fn is_searchable(&self) -> bool {
        self.published_at.is_some() && self.deleted_at.is_none() && self.archived_at.is_none()
    }
}

/// The requesting user, as far as search needs to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub id: String,
    pub team_id: String,
}

/// Resolved access-control scope for a user: collections they can read plus
/// documents individually shared with them (direct or via collection
/// membership).
#[derive(Debug, Clone, Default)]
pub struct AccessScope {
    pub collection_ids: Vec<String>,
    pub document_ids: Vec<String>,
}

impl AccessScope {
    pub fn allows(&self, document: &Document) -> bool {
        self.collection_ids.contains(&document.collection_id)
            || self.document_ids.contains(&document.id)
    }
}

/// Document catalog and access-control collaborator
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn document(&self, id: &str) -> Result<Option<Document>>;

    /// Batch metadata lookup for search-result assembly
    async fn documents(&self, ids: &[String]) -> Result<Vec<Document>>;

    /// Ids of all published, non-deleted, non-archived documents of a team
    async fn searchable_document_ids(&self, team_id: &str) -> Result<Vec<String>>;

    async fn user(&self, id: &str) -> Result<Option<UserContext>>;

    async fn access_scope(&self, user: &UserContext) -> Result<AccessScope>;
}

/// A document-level hit from the keyword full-text engine
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub document_id: String,
    pub title: String,
    pub collection_id: String,
    /// Snippet around the match, may be empty
    pub context: String,
}

/// Keyword full-text search collaborator. Implementations are expected to
/// apply the same per-user permission filtering as vector search.
#[async_trait]
pub trait KeywordSearch: Send + Sync {
    async fn search(&self, user: &UserContext, query: &str, limit: usize)
        -> Result<Vec<KeywordHit>>;
}
