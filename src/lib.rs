//! Hybrid document retrieval
//!
//! Everything needed to make a document corpus semantically searchable:
//! chunking, embedding generation against a LiteLLM-compatible API, a
//! LanceDB-backed vector store, per-user permission-filtered vector search
//! and RRF-fused hybrid search, plus the background tasks that keep the
//! index consistent as documents change.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod hybrid;
pub mod pipeline;
pub mod processor;
pub mod search;
pub mod store;
pub mod tasks;
pub mod types;

pub use config::RagConfig;
pub use error::{RagError, Result};
pub use hybrid::HybridSearchEngine;
pub use pipeline::{EmbeddingPipeline, GenerateOutcome};
pub use search::VectorSearchEngine;
pub use types::{SearchMode, SearchRequest, SearchResponse, SearchResult};
