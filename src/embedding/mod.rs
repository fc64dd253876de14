//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and an Ollama implementation that
//! calls a locally hosted embedding model (nomic-embed-text by default). The
//! provider is created via [`create_provider`] from configuration.

pub mod ollama;

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Trait for embedding text into vectors.
///
/// Implementations return one vector per input, in input order, each
/// [`dimensions`](EmbeddingProvider::dimensions) wide.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of text strings.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::MalformedResponse("no vector returned".into()))
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Model identifier, recorded alongside stored vectors.
    fn model(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// Currently only `"ollama"` is supported.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "ollama" => {
            let provider = ollama::OllamaEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: ollama"),
    }
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}
