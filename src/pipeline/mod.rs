// Pipeline module
// Ingest, retrieve and forget orchestration over an embedder and a vector store


use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context;
use crate::database::{DEFAULT_NAMESPACE, QueryMatch, VectorRecord, VectorStore};
use crate::embeddings::{
    Batch, Chunk, ChunkingConfig, Embedder, EmbeddingBatcher, EmbeddingVector, chunk_document,
};
use crate::{RagError, Result};

/// Matches returned per query unless configured otherwise
pub const DEFAULT_TOP_K: usize = 5;

/// Notification that one batch is embedded and upserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCommit {
    /// Position of the batch within this ingest call
    pub batch_index: usize,
    /// Ordinal of the batch's first chunk
    pub offset: usize,
    pub len: usize,
    /// Chunks from the front of the document now persisted
    pub committed: usize,
}

/// Receives a callback after every committed batch, e.g. to persist a
/// resumption cursor. An error aborts the ingest.
#[async_trait]
pub trait IngestObserver: Send + Sync {
    async fn batch_committed(&self, commit: BatchCommit) -> Result<()>;
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

#[async_trait]
impl IngestObserver for NoopObserver {
    async fn batch_committed(&self, _commit: BatchCommit) -> Result<()> {
        Ok(())
    }
}

/// Outcome of a successful ingest call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document_name: String,
    pub total_chunks: usize,
    /// Chunks skipped because an earlier attempt already committed them
    pub skipped_chunks: usize,
    /// Chunks persisted once this call returns; equals `total_chunks`
    pub committed_chunks: usize,
    /// Embedding calls made by this call
    pub batches: usize,
}

/// Retrieval-augmented generation core: chunk, embed, store, search, delete.
///
/// Every operation runs against the pipeline's namespace. Nothing here
/// serializes operations on the same document name; callers that need
/// per-document consistency must do so themselves.
pub struct RagPipeline<E, S> {
    batcher: EmbeddingBatcher<E>,
    store: S,
    namespace: String,
    top_k: usize,
    chunking: ChunkingConfig,
}

impl<E: Embedder, S: VectorStore> RagPipeline<E, S> {
    #[inline]
    pub fn new(embedder: E, store: S) -> Self {
        Self {
            batcher: EmbeddingBatcher::new(embedder),
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            top_k: DEFAULT_TOP_K,
            chunking: ChunkingConfig::default(),
        }
    }

    /// Pipeline with namespace, top-k, chunking, concurrency and the expected
    /// embedding dimension from `config`. The configuration is validated first.
    #[inline]
    pub fn from_config(config: &Config, embedder: E, store: S) -> Result<Self> {
        config.validate()?;

        let dimension = usize::try_from(config.ollama.embedding_dimension)
            .map_err(|_| RagError::Config("Embedding dimension out of range".to_string()))?;

        Ok(Self::new(embedder, store)
            .with_namespace(config.store.namespace.clone())
            .with_top_k(config.retrieval.top_k)
            .with_chunking(config.chunking.clone())
            .with_embedding_concurrency(config.pipeline.embedding_concurrency)
            .with_embedding_dimension(dimension))
    }

    #[inline]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Embedding calls allowed in flight during ingestion; 1 is sequential
    #[inline]
    pub fn with_embedding_concurrency(mut self, concurrency: usize) -> Self {
        self.batcher = self.batcher.with_concurrency(concurrency);
        self
    }

    /// Every embedding must have exactly `dimension` components
    #[inline]
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.batcher = self.batcher.with_expected_dimension(dimension);
        self
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[inline]
    pub fn batcher(&self) -> &EmbeddingBatcher<E> {
        &self.batcher
    }

    /// Normalize and chunk raw extracted text with this pipeline's settings
    #[inline]
    pub fn chunk(&self, raw_text: &str) -> Vec<Chunk> {
        chunk_document(raw_text, &self.chunking)
    }

    /// Chunk `raw_text` and ingest the chunks. Text without usable content is
    /// a successful no-op.
    #[inline]
    pub async fn ingest_text(&self, document_name: &str, raw_text: &str) -> Result<IngestReport> {
        let chunks: Vec<String> = self
            .chunk(raw_text)
            .into_iter()
            .map(|chunk| chunk.text)
            .collect();
        self.ingest(document_name, &chunks).await
    }

    /// Embed and upsert `chunks` batch by batch, in order.
    ///
    /// Not transactional: on failure the batches committed before it stay
    /// searchable, and the error reports how many chunks that is.
    #[inline]
    pub async fn ingest(&self, document_name: &str, chunks: &[String]) -> Result<IngestReport> {
        self.ingest_from(document_name, chunks, 0, &NoopObserver)
            .await
    }

    /// Delete everything stored under `document_name`, then ingest `chunks`.
    /// Leaves no records from a previous, longer version of the document.
    #[inline]
    pub async fn replace(&self, document_name: &str, chunks: &[String]) -> Result<IngestReport> {
        self.forget(document_name).await?;
        self.ingest(document_name, chunks).await
    }

    /// Ingest `chunks[start_ordinal..]`, keeping the ordinals of the full
    /// sequence. `observer` hears about every committed batch.
    #[inline]
    pub async fn ingest_from<O>(
        &self,
        document_name: &str,
        chunks: &[String],
        start_ordinal: usize,
        observer: &O,
    ) -> Result<IngestReport>
    where
        O: IngestObserver + ?Sized,
    {
        self.ensure_namespace()?;
        ensure_document_name(document_name)?;

        let total = chunks.len();
        let Some(remaining) = chunks.get(start_ordinal..) else {
            return Err(RagError::InvalidInput(format!(
                "Start ordinal {} is past the {} chunks of '{}'",
                start_ordinal, total, document_name
            )));
        };

        if total == 0 {
            warn!("No usable text in '{}', nothing to ingest", document_name);
        }

        let batches = self.batcher.plan(remaining, start_ordinal);
        let mut committed = start_ordinal;

        debug!(
            "Ingesting {} of {} chunks of '{}' into namespace '{}' in {} batches",
            remaining.len(),
            total,
            document_name,
            self.namespace,
            batches.len()
        );

        let ingest_error = |committed: usize, source: RagError| RagError::Ingest {
            document: document_name.to_string(),
            committed,
            total,
            source: Box::new(source),
        };

        for wave in batches.chunks(self.batcher.concurrency()) {
            let embedded = self
                .batcher
                .embed_batches(wave)
                .await
                .map_err(|e| ingest_error(committed, e))?;

            for (batch, vectors) in wave.iter().zip(embedded) {
                let records = build_records(document_name, batch, vectors);

                self.store
                    .upsert(&self.namespace, &records)
                    .await
                    .map_err(|e| ingest_error(committed, e))?;

                committed += batch.len();
                info!("Processed batch {} for {}", batch.index + 1, document_name);

                observer
                    .batch_committed(BatchCommit {
                        batch_index: batch.index,
                        offset: batch.offset,
                        len: batch.len(),
                        committed,
                    })
                    .await
                    .map_err(|e| ingest_error(committed, e))?;
            }
        }

        if total > 0 {
            info!(
                "Ingested '{}': {} chunks in namespace '{}'",
                document_name, total, self.namespace
            );
        }

        Ok(IngestReport {
            document_name: document_name.to_string(),
            total_chunks: total,
            skipped_chunks: start_ordinal,
            committed_chunks: committed,
            batches: batches.len(),
        })
    }

    /// The `top_k` stored chunks most similar to `query`, most similar first
    #[inline]
    pub async fn search(&self, query: &str) -> Result<Vec<QueryMatch>> {
        self.ensure_namespace()?;
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("Query is empty".to_string()));
        }

        let vector = self.batcher.embed_one(query).await?;
        let mut matches = self
            .store
            .query(&self.namespace, &vector, self.top_k)
            .await?;

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(self.top_k);

        debug!(
            "Query matched {} chunks in namespace '{}'",
            matches.len(),
            self.namespace
        );
        Ok(matches)
    }

    /// Context block for `query`: its best matches rendered for the generation
    /// call. Empty when nothing is indexed.
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<String> {
        let matches = self.search(query).await?;
        Ok(context::assemble(&matches))
    }

    /// Delete every record of `document_name`. Idempotent.
    #[inline]
    pub async fn forget(&self, document_name: &str) -> Result<()> {
        self.ensure_namespace()?;
        ensure_document_name(document_name)?;

        self.store
            .delete_document(&self.namespace, document_name)
            .await?;

        info!(
            "Forgot '{}' in namespace '{}'",
            document_name, self.namespace
        );
        Ok(())
    }

    fn ensure_namespace(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(RagError::Config("Vector store namespace is missing".to_string()));
        }
        Ok(())
    }
}

fn ensure_document_name(document_name: &str) -> Result<()> {
    if document_name.trim().is_empty() {
        return Err(RagError::InvalidInput("Document name is empty".to_string()));
    }
    Ok(())
}

fn build_records(
    document_name: &str,
    batch: &Batch<'_>,
    vectors: Vec<EmbeddingVector>,
) -> Vec<VectorRecord> {
    batch
        .texts
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(position, (text, values))| {
            VectorRecord::new(document_name, batch.offset + position, text.clone(), values)
        })
        .collect()
}

/// Run `operation` under a caller deadline.
///
/// Writes the operation committed before the deadline are not rolled back.
#[inline]
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| RagError::Timeout(deadline))?
}
