//! Ollama-backed embedder. Wraps ollama-rs behind the [`Embedder`] trait.

use async_trait::async_trait;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use tracing::debug;

use crate::embedder::{check_batch, EmbedError, Embedder};

/// all-MiniLM-L6-v2 as published by Ollama; 384-dimension output.
pub const DEFAULT_EMBED_MODEL: &str = "all-minilm";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Embeds text with a model served by a local Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    inner: Ollama,
    embed_model: String,
}

impl OllamaEmbedder {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, EmbedError> {
        let inner = Ollama::try_new(url)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
        })
    }

    /// Build from the `ollama_url` and `embedding_model_name` config fields.
    pub fn from_config(config: &crate::Config) -> Result<Self, EmbedError> {
        Ok(Self::from_url(&config.ollama_url)?.with_embed_model(&config.embedding_model_name))
    }

    /// Set the embedding model (e.g. `all-minilm`, `nomic-embed-text`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.embed_model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.embed_model, inputs = texts.len(), "requesting embeddings");
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let res = self.inner.generate_embeddings(req).await?;
        check_batch(texts.len(), &res.embeddings)?;
        Ok(res.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_minilm_by_default() {
        let e = OllamaEmbedder::from_url(DEFAULT_BASE_URL).unwrap();
        assert_eq!(e.model_name(), DEFAULT_EMBED_MODEL);
    }

    #[test]
    fn model_follows_config() {
        let config = crate::Config {
            embedding_model_name: "nomic-embed-text".into(),
            ..crate::Config::default()
        };
        let e = OllamaEmbedder::from_config(&config).unwrap();
        assert_eq!(e.model_name(), "nomic-embed-text");
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(matches!(
            OllamaEmbedder::from_url("not a url"),
            Err(EmbedError::ParseUrl(_))
        ));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        // Nothing listens on port 9; an attempted request would fail.
        let e = OllamaEmbedder::from_url("http://127.0.0.1:9").unwrap();
        assert!(e.embed_batch(&[]).await.unwrap().is_empty());
    }
}
