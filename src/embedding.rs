//! LiteLLM-compatible embedding API client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// Converts text into fixed-dimension vectors. `EmbeddingClient` is the
/// production implementation; tests substitute stubs.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Upstream("no embedding returned".to_string()))
    }
}

/// HTTP client for a LiteLLM-style `/embeddings` endpoint
#[derive(Debug)]
pub struct EmbeddingClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    batch_size: usize,
    client: Client,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[allow(dead_code)]
    model: Option<String>,
    #[allow(dead_code)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[allow(dead_code)]
    prompt_tokens: Option<usize>,
    #[allow(dead_code)]
    total_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl EmbeddingClient {
    /// Fails with a configuration error when the base URL is unset
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| {
                RagError::Configuration("RAG_LITELLM_BASE_URL is not configured".to_string())
            })?
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            client,
        })
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let input_count = texts.len();
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts,
        };

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(ref api_key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = builder.send().await.map_err(RagError::Http)?;
        let status = response.status();
        let body = response.text().await.map_err(RagError::Http)?;

        if !status.is_success() {
            // Surface the upstream error message when present
            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(RagError::Upstream(error_response.error.message));
            }
            return Err(RagError::Upstream(format!("API error ({status}): {body}")));
        }

        let response: EmbeddingResponse = serde_json::from_str(&body).map_err(RagError::Json)?;

        if response.data.len() != input_count {
            return Err(RagError::Upstream(format!(
                "embedding count mismatch: sent {} texts, got {} embeddings",
                input_count,
                response.data.len()
            )));
        }

        // Sort by index so response[i] corresponds to input[i]
        let mut data = response.data;
        data.sort_by_key(|d| d.index);

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    /// Splits oversized inputs into sub-batches of `batch_size` and
    /// concatenates the responses in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_embeddings = self.embed_batch(batch.to_vec()).await?;
            all_embeddings.extend(batch_embeddings);
        }

        Ok(all_embeddings)
    }
}
