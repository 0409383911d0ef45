use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use poiscout_core::capability::Embedder;
use poiscout_core::config::EmbeddingConfig;

use crate::llm::LlmClient;

/// `/embeddings`-backed [`Embedder`]. A configured dimension of 0 accepts
/// whatever length the model returns.
pub struct HttpEmbedder {
    client: Arc<LlmClient>,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(client: Arc<LlmClient>, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            dimension: config.dimension,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .client
            .embed(&self.model, &[text])
            .await?
            .into_iter()
            .next()
            .context("Embedding API returned no vector")?;
        if self.dimension != 0 && vector.len() != self.dimension {
            bail!(
                "Embedding model '{}' returned {} dimensions, expected {}",
                self.model,
                vector.len(),
                self.dimension
            );
        }
        Ok(vector)
    }
}
