#[cfg(test)]
mod tests;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::embeddings::{Embedder, EmbeddingVector, MAX_EMBEDDING_BATCH_SIZE};
use crate::{RagError, Result};

/// A consecutive run of at most `batch_size` texts, with its position in the
/// full input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batch<'a> {
    /// Position of this batch in the plan
    pub index: usize,
    /// Ordinal of the first text of this batch in the full input
    pub offset: usize,
    pub texts: &'a [String],
}

impl Batch<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Converts ordered texts into embeddings without exceeding the provider's
/// per-call cap. Output order always matches input order.
#[derive(Debug, Clone)]
pub struct EmbeddingBatcher<E> {
    embedder: E,
    batch_size: usize,
    concurrency: usize,
    expected_dimension: Option<usize>,
}

impl<E: Embedder> EmbeddingBatcher<E> {
    #[inline]
    pub fn new(embedder: E) -> Self {
        let batch_size = embedder
            .max_batch_size()
            .clamp(1, MAX_EMBEDDING_BATCH_SIZE);
        Self {
            embedder,
            batch_size,
            concurrency: 1,
            expected_dimension: None,
        }
    }

    /// Allow up to `concurrency` embedding calls in flight. 1 is sequential.
    #[inline]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Reject any provider response whose vectors are not `dimension` long
    #[inline]
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[inline]
    pub fn expected_dimension(&self) -> Option<usize> {
        self.expected_dimension
    }

    #[inline]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Partition `texts` into consecutive batches, numbering ordinals from
    /// `start_offset`.
    #[inline]
    pub fn plan<'a>(&self, texts: &'a [String], start_offset: usize) -> Vec<Batch<'a>> {
        texts
            .chunks(self.batch_size)
            .enumerate()
            .map(|(index, texts)| Batch {
                index,
                offset: start_offset + index * self.batch_size,
                texts,
            })
            .collect()
    }

    /// One provider call, with the one-vector-per-text contract checked.
    #[inline]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed_batch(texts).await?;

        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Provider returned {} embeddings for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        if let Some(first) = vectors.first() {
            let dimension = first.len();
            if dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
                return Err(RagError::Embedding(
                    "Provider returned embeddings of inconsistent dimension".to_string(),
                ));
            }
            if let Some(expected) = self.expected_dimension.filter(|&d| d != dimension) {
                return Err(RagError::Embedding(format!(
                    "Provider returned {}-dimensional embeddings, configured for {}",
                    dimension, expected
                )));
            }
        }

        Ok(vectors)
    }

    /// Embed several batches, at most `concurrency` at a time. Results are
    /// placed by batch position, not by completion order. The first failure
    /// fails the whole call.
    #[inline]
    pub async fn embed_batches(&self, batches: &[Batch<'_>]) -> Result<Vec<Vec<EmbeddingVector>>> {
        let mut slots: Vec<Option<Vec<EmbeddingVector>>> = vec![None; batches.len()];

        let completed: Vec<(usize, Vec<EmbeddingVector>)> =
            stream::iter(batches.iter().enumerate())
                .map(|(slot, batch)| async move {
                    debug!(
                        "Embedding batch {} ({} texts from ordinal {})",
                        batch.index + 1,
                        batch.len(),
                        batch.offset
                    );
                    self.embed_batch(batch.texts)
                        .await
                        .map(|vectors| (slot, vectors))
                })
                .buffer_unordered(self.concurrency)
                .try_collect()
                .await?;

        for (slot, vectors) in completed {
            slots[slot] = Some(vectors);
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| RagError::Embedding("Embedding batch went missing".to_string()))
            })
            .collect()
    }

    /// Embed every text; `output[i]` corresponds to `texts[i]`.
    #[inline]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let batches = self.plan(texts, 0);
        debug!(
            "Embedding {} texts in {} batches",
            texts.len(),
            batches.len()
        );

        let vectors: Vec<EmbeddingVector> = self
            .embed_batches(&batches)
            .await?
            .into_iter()
            .flatten()
            .collect();

        Ok(vectors)
    }

    /// Embed a single text, such as a query
    #[inline]
    pub async fn embed_one(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::Embedding("Provider returned no embedding".to_string()))
    }
}
