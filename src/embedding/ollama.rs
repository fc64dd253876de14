//! Ollama embedding provider.
//!
//! Calls `POST {base_url}/api/embed` and L2-normalizes the returned vectors so
//! that sqlite-vec's L2 distance ranks results in cosine order.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{l2_normalize, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/api/embed", self.base_url);
        tracing::debug!(model = %self.model, count = texts.len(), "requesting embeddings");

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout(e.to_string())
                } else {
                    EmbeddingError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %message, "embedding service returned error");
            return Err(EmbeddingError::Api {
                status_code: status.as_u16(),
                message,
            });
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        Ok(body.embeddings.iter().map(|v| l2_normalize(v)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}
