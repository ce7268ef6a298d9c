//! Background tasks
//!
//! Plain async functions plus a name-keyed registry for running them from a
//! job queue or the command line. The registry wraps every task with timing
//! and outcome logging; task inputs and outputs are JSON so callers don't
//! need to know each task's prop struct.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RagConfig;
use crate::documents::DocumentStore;
use crate::error::{RagError, Result};
use crate::pipeline::{EmbeddingPipeline, GenerateOutcome};
use crate::store::EmbeddingStore;

/// Shared collaborators handed to every task
pub struct TaskContext {
    pub config: RagConfig,
    pub documents: Arc<dyn DocumentStore>,
    pub pipeline: Arc<EmbeddingPipeline>,
    pub store: Arc<dyn EmbeddingStore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateEmbeddingsProps {
    pub document_id: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkIndexProps {
    pub team_id: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupProps {
    #[serde(default)]
    pub team_id: Option<String>,
}

/// Per-team bulk indexing summary
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkIndexReport {
    /// Documents whose embeddings were (re)generated
    pub indexed: usize,
    /// Documents already up to date or cleared
    pub skipped: usize,
    /// Documents whose generation failed; they are logged and left for the
    /// next run
    pub failed: usize,
}

/// Regenerate embeddings for one document
pub async fn generate_document_embeddings(
    ctx: &TaskContext,
    props: GenerateEmbeddingsProps,
) -> Result<GenerateOutcome> {
    ctx.pipeline.generate(&props.document_id, props.force).await
}

/// Walk every searchable document of a team and bring its embeddings up to
/// date. Individual failures don't abort the run.
pub async fn bulk_index_documents(ctx: &TaskContext, props: BulkIndexProps) -> Result<BulkIndexReport> {
    let document_ids = ctx.documents.searchable_document_ids(&props.team_id).await?;
    info!(
        "bulk indexing {} documents for team {}",
        document_ids.len(),
        props.team_id
    );

    let mut report = BulkIndexReport::default();
    for document_id in &document_ids {
        match ctx.pipeline.generate(document_id, props.force).await {
            Ok(GenerateOutcome::Regenerated { .. }) => report.indexed += 1,
            Ok(_) => report.skipped += 1,
            Err(err) => {
                warn!("bulk index failed for document {document_id}: {err}");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Delete every embedding row produced by a model other than the currently
/// configured one. Returns the number of rows removed.
pub async fn cleanup_obsolete_embeddings(ctx: &TaskContext, props: CleanupProps) -> Result<usize> {
    let removed = ctx
        .store
        .delete_obsolete_embeddings(&ctx.config.embedding.model, props.team_id.as_deref())
        .await?;
    if removed > 0 {
        info!(
            "removed {removed} embeddings from models other than {}",
            ctx.config.embedding.model
        );
    }
    Ok(removed)
}

type TaskFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type TaskHandler = Box<dyn Fn(Arc<TaskContext>, Value) -> TaskFuture + Send + Sync>;

/// Name-keyed task dispatch. Names match the job-queue task identifiers.
pub struct TaskRegistry {
    ctx: Arc<TaskContext>,
    handlers: HashMap<&'static str, TaskHandler>,
}

impl TaskRegistry {
    pub fn new(ctx: Arc<TaskContext>) -> Self {
        let mut handlers: HashMap<&'static str, TaskHandler> = HashMap::new();

        handlers.insert(
            "generateDocumentEmbeddings",
            Box::new(|ctx: Arc<TaskContext>, props: Value| -> TaskFuture {
                Box::pin(async move {
                    let props: GenerateEmbeddingsProps = parse_props(props)?;
                    let outcome = generate_document_embeddings(&ctx, props).await?;
                    Ok(serde_json::json!({ "outcome": format!("{outcome:?}") }))
                })
            }),
        );
        handlers.insert(
            "bulkIndexDocuments",
            Box::new(|ctx: Arc<TaskContext>, props: Value| -> TaskFuture {
                Box::pin(async move {
                    let props: BulkIndexProps = parse_props(props)?;
                    let report = bulk_index_documents(&ctx, props).await?;
                    serde_json::to_value(report).map_err(RagError::Json)
                })
            }),
        );
        handlers.insert(
            "cleanupObsoleteEmbeddings",
            Box::new(|ctx: Arc<TaskContext>, props: Value| -> TaskFuture {
                Box::pin(async move {
                    let props: CleanupProps = parse_props(props)?;
                    let removed = cleanup_obsolete_embeddings(&ctx, props).await?;
                    Ok(serde_json::json!({ "removed": removed }))
                })
            }),
        );

        Self { ctx, handlers }
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run a task by name, logging start, duration and outcome
    pub async fn run(&self, name: &str, props: Value) -> Result<Value> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| RagError::NotFound(format!("unknown task: {name}")))?;

        info!("task {name} started");
        let started = Instant::now();
        let result = handler(Arc::clone(&self.ctx), props).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => info!("task {name} finished in {elapsed:?}"),
            Err(err) => error!("task {name} failed after {elapsed:?}: {err}"),
        }
        result
    }
}

fn parse_props<T: serde::de::DeserializeOwned>(props: Value) -> Result<T> {
    serde_json::from_value(props).map_err(|e| RagError::Validation(format!("invalid task props: {e}")))
}
