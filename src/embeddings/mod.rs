// Embeddings module
// Text chunking and the embedding model abstraction

pub mod chunking;

use anyhow::Result;

pub use chunking::{Chunk, ChunkingConfig, chunk_pages, estimate_token_count, split_text};

/// A text embedding model.
///
/// Implementations must be deterministic for a given model and text and safe to
/// call from several threads at once.
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model
    fn model_id(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding model returned no vector"))
    }
}
