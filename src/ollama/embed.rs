use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::OllamaClient;
use crate::config::EmbeddingConfig;
use crate::embeddings::Embedder;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Sentence embedding model served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    batch_size: usize,
    dimension: usize,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(client: OllamaClient, config: &EmbeddingConfig) -> Self {
        Self {
            client: client.with_timeout(Duration::from_secs(config.timeout_secs)),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1) as usize,
            dimension: config.dimension as usize,
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbedResponse = self
            .client
            .post_json("/api/embed", &request)
            .context("Failed to generate batch embeddings")?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            ));
        }

        if let Some(bad) = response
            .embeddings
            .iter()
            .find(|e| e.len() != self.dimension)
        {
            return Err(anyhow::anyhow!(
                "Model {} returned {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimension
            ));
        }

        Ok(response.embeddings)
    }
}

impl Embedder for OllamaEmbedder {
    #[inline]
    fn model_id(&self) -> &str {
        &self.model
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        // Process in batches to avoid overwhelming the server
        for chunk in texts.chunks(self.batch_size) {
            let batch = self
                .embed_single_batch(chunk)
                .with_context(|| format!("Failed to process batch of {} texts", chunk.len()))?;
            results.extend(batch);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
