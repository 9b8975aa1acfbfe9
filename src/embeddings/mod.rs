// Embeddings module
// Chunking of normalized text, the embedding provider seam and batch orchestration

pub mod batcher;
pub mod chunking;
pub mod ollama;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::Result;

pub use batcher::{Batch, EmbeddingBatcher};
pub use chunking::{
    BoundaryMode, Chunk, ChunkingConfig, chunk_document, chunk_text, chunks_fingerprint,
    normalize_whitespace,
};
pub use ollama::OllamaClient;

/// Fixed-length vector produced by the embedding model.
pub type EmbeddingVector = Vec<f32>;

/// Most texts the embedding provider accepts in a single call.
pub const MAX_EMBEDDING_BATCH_SIZE: usize = 100;

/// An external embedding provider.
///
/// Implementations must return exactly one vector per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    /// Provider-imposed cap on texts per call
    fn max_batch_size(&self) -> usize {
        MAX_EMBEDDING_BATCH_SIZE
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for std::sync::Arc<T> {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        (**self).embed_batch(texts).await
    }

    fn max_batch_size(&self) -> usize {
        (**self).max_batch_size()
    }
}
