use super::*;
use crate::embeddings::testing::{RecordingEmbedder, histogram_embedding};
use std::sync::Arc;

/// Texts whose embeddings are pairwise distinct, so ordering mistakes show up
fn distinct_texts(count: usize) -> Vec<String> {
    (1..=count).map(|n| "x".repeat(n)).collect()
}

#[test]
fn plan_respects_provider_cap() {
    let batcher = EmbeddingBatcher::new(RecordingEmbedder::new());
    let texts = distinct_texts(250);

    let batches = batcher.plan(&texts, 0);

    let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    let offsets: Vec<usize> = batches.iter().map(|b| b.offset).collect();
    assert_eq!(offsets, vec![0, 100, 200]);
    let indices: Vec<usize> = batches.iter().map(|b| b.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn plan_with_start_offset() {
    let batcher = EmbeddingBatcher::new(RecordingEmbedder::new());
    let texts = distinct_texts(150);

    let offsets: Vec<usize> = batcher.plan(&texts, 100).iter().map(|b| b.offset).collect();
    assert_eq!(offsets, vec![100, 200]);
}

#[test]
fn plan_of_nothing_is_empty() {
    let batcher = EmbeddingBatcher::new(RecordingEmbedder::new());
    assert!(batcher.plan(&[], 0).is_empty());
}

#[tokio::test]
async fn embed_preserves_order_across_batches() {
    let embedder = Arc::new(RecordingEmbedder::new());
    let batcher = EmbeddingBatcher::new(Arc::clone(&embedder));
    let texts = distinct_texts(250);

    let vectors = batcher.embed(&texts).await.expect("embedding should succeed");

    assert_eq!(vectors.len(), texts.len());
    for (text, vector) in texts.iter().zip(&vectors) {
        assert_eq!(vector, &histogram_embedding(text));
    }
    assert_eq!(embedder.batch_sizes(), vec![100, 100, 50]);
}

#[tokio::test]
async fn concurrent_embedding_reindexes_results() {
    let embedder = Arc::new(RecordingEmbedder::slow_first_calls());
    let batcher = EmbeddingBatcher::new(Arc::clone(&embedder)).with_concurrency(3);
    let texts = distinct_texts(300);

    let vectors = batcher.embed(&texts).await.expect("embedding should succeed");

    assert_eq!(vectors.len(), 300);
    for (text, vector) in texts.iter().zip(&vectors) {
        assert_eq!(vector, &histogram_embedding(text));
    }
    assert_eq!(embedder.call_count(), 3);
}

#[tokio::test]
async fn failing_batch_fails_the_call() {
    let embedder = Arc::new(RecordingEmbedder::failing_on(2));
    let batcher = EmbeddingBatcher::new(Arc::clone(&embedder));
    let texts = distinct_texts(250);

    let err = batcher.embed(&texts).await.expect_err("second batch fails");

    assert!(matches!(err, RagError::Embedding(_)));
    // Sequential mode stops at the failing batch
    assert_eq!(embedder.batch_sizes(), vec![100, 100]);
}

#[tokio::test]
async fn embed_one_is_a_single_item_call() {
    let embedder = Arc::new(RecordingEmbedder::new());
    let batcher = EmbeddingBatcher::new(Arc::clone(&embedder));

    let vector = batcher
        .embed_one("what is entropy?")
        .await
        .expect("embedding should succeed");

    assert_eq!(vector, histogram_embedding("what is entropy?"));
    assert_eq!(embedder.batch_sizes(), vec![1]);
}

#[tokio::test]
async fn empty_input_makes_no_calls() {
    let embedder = Arc::new(RecordingEmbedder::new());
    let batcher = EmbeddingBatcher::new(Arc::clone(&embedder));

    let vectors = batcher.embed(&[]).await.expect("embedding should succeed");

    assert!(vectors.is_empty());
    assert_eq!(embedder.call_count(), 0);
}

struct ShortChangingEmbedder;

#[async_trait::async_trait]
impl Embedder for ShortChangingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
    }
}

#[tokio::test]
async fn count_mismatch_is_an_embedding_error() {
    let batcher = EmbeddingBatcher::new(ShortChangingEmbedder);
    let err = batcher
        .embed(&distinct_texts(3))
        .await
        .expect_err("mismatched counts must fail");
    assert!(matches!(err, RagError::Embedding(msg) if msg.contains("2 embeddings for 3 texts")));
}

struct SmallBatchEmbedder;

#[async_trait::async_trait]
impl Embedder for SmallBatchEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| histogram_embedding(t)).collect())
    }

    fn max_batch_size(&self) -> usize {
        16
    }
}

#[test]
fn provider_with_smaller_cap_gets_smaller_batches() {
    let batcher = EmbeddingBatcher::new(SmallBatchEmbedder);
    assert_eq!(batcher.batch_size(), 16);
    assert_eq!(batcher.plan(&distinct_texts(40), 0).len(), 3);
}

#[tokio::test]
async fn configured_dimension_is_enforced() {
    let embedder = Arc::new(RecordingEmbedder::new());
    let batcher = EmbeddingBatcher::new(Arc::clone(&embedder)).with_expected_dimension(1024);
    assert_eq!(batcher.expected_dimension(), Some(1024));

    let err = batcher
        .embed(&distinct_texts(3))
        .await
        .expect_err("8-dimensional vectors must be rejected");
    assert!(matches!(err, RagError::Embedding(msg) if msg.contains("configured for 1024")));

    let batcher = EmbeddingBatcher::new(Arc::clone(&embedder))
        .with_expected_dimension(crate::embeddings::testing::TEST_DIMENSION);
    let vectors = batcher
        .embed(&distinct_texts(3))
        .await
        .expect("matching dimension is accepted");
    assert_eq!(vectors.len(), 3);
}
