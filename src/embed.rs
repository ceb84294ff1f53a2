//! Embedding function: text → numeric vectors via an OpenAI-compatible
//! endpoint.
//!
//! The store owns an [`Embedder`] and calls it for both ingestion batches
//! and query text. The trait seam lets tests supply a deterministic local
//! embedder; production uses [`OpenAiEmbedder`] against the configured
//! endpoint and model id.

use crate::config::KbConfig;
use crate::error::KbError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Converts text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of inputs, returning one vector per input, in input
    /// order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, KbError>;
}

/// OpenAI-compatible `/embeddings` client.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiEmbedder {
    /// Build an embedder from the shared configuration.
    pub fn from_config(config: &KbConfig) -> Result<Self, KbError> {
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()
            .map_err(|e| KbError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            api_key: config.resolve_api_key(),
            model: config.embedding_model.clone(),
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: inputs,
            });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| KbError::EmbeddingFailed {
            detail: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(KbError::EmbeddingFailed {
                detail: format!("HTTP {status}: {detail}"),
            });
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|e| KbError::EmbeddingFailed {
                detail: format!("malformed response: {e}"),
            })?;

        if parsed.data.len() != inputs.len() {
            return Err(KbError::EmbeddingFailed {
                detail: format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    parsed.data.len()
                ),
            });
        }

        // The API may return rows out of order; `index` is authoritative.
        let mut rows = parsed.data;
        rows.sort_by_key(|r| r.index);
        let vectors: Vec<Vec<f32>> = rows.into_iter().map(|r| r.embedding).collect();

        debug!(
            "Embedded {} inputs ({} dimensions)",
            vectors.len(),
            vectors.first().map_or(0, Vec::len)
        );
        Ok(vectors)
    }
}
