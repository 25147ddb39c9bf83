//! The text-embedding capability the pipeline depends on.
//!
//! Production code uses [`crate::ollama::OllamaEmbedder`]; tests plug in a
//! deterministic stand-in so chunking and search can be checked without a model.

use async_trait::async_trait;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must give numerically identical results for a text whether it
/// is embedded alone or as part of a batch.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, for logs and build reports.
    fn model_name(&self) -> &str;

    /// Embed many texts. The output is index-aligned with `texts`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed one text. Goes through `embed_batch` so both call shapes agree.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        check_batch(1, &out)?;
        Ok(out.swap_remove(0))
    }
}

/// Checks that a batch response lines up with its request.
pub(crate) fn check_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<(), EmbedError> {
    if vectors.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    if let Some(position) = vectors.iter().position(Vec::is_empty) {
        return Err(EmbedError::EmptyEmbedding { position });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("embedding request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
    #[error("embedding model returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
    #[error("embedding model returned an empty vector for input {position}")]
    EmptyEmbedding { position: usize },
}
