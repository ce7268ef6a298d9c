//! Document lifecycle event processor
//!
//! Translates document lifecycle events into pipeline work. Create, update
//! and publish all funnel into a staleness-checked regeneration; the pipeline
//! itself clears embeddings when the document turns out not to be searchable.
//! Deletion clears the stored rows directly, without fetching the document.

use std::sync::Arc;

use log::debug;

use crate::config::RagConfig;
use crate::error::Result;
use crate::pipeline::{EmbeddingPipeline, GenerateOutcome};
use crate::store::EmbeddingStore;

/// A document lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    Created { document_id: String },
    Updated { document_id: String },
    Published { document_id: String },
    Deleted { document_id: String },
}

pub struct EventProcessor {
    config: RagConfig,
    pipeline: Arc<EmbeddingPipeline>,
    store: Arc<dyn EmbeddingStore>,
}

impl EventProcessor {
    pub fn new(
        config: RagConfig,
        pipeline: Arc<EmbeddingPipeline>,
        store: Arc<dyn EmbeddingStore>,
    ) -> Self {
        Self {
            config,
            pipeline,
            store,
        }
    }

    /// Apply one event. Returns the pipeline outcome for events that trigger
    /// generation, `None` for deletions.
    pub async fn handle(&self, event: &DocumentEvent) -> Result<Option<GenerateOutcome>> {
        if !self.config.enabled {
            debug!("event processing disabled, ignoring {event:?}");
            return Ok(None);
        }

        match event {
            DocumentEvent::Created { document_id }
            | DocumentEvent::Updated { document_id }
            | DocumentEvent::Published { document_id } => {
                let outcome = self.pipeline.generate(document_id, false).await?;
                Ok(Some(outcome))
            }
            DocumentEvent::Deleted { document_id } => {
                debug!("document {document_id} deleted, clearing embeddings");
                self.store
                    .delete_document_embeddings(document_id, &self.config.embedding.model)
                    .await?;
                Ok(None)
            }
        }
    }
}
