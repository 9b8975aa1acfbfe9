use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::embeddings::{Embedder, EmbeddingVector};
use crate::{RagError, Result};

pub(crate) const TEST_DIMENSION: usize = 8;

/// Deterministic stand-in for an embedding model: a character histogram folded
/// into `TEST_DIMENSION` buckets. Identical texts embed identically.
pub(crate) fn histogram_embedding(text: &str) -> EmbeddingVector {
    let mut vector = vec![0.0_f32; TEST_DIMENSION];
    for c in text.chars() {
        vector[(c as usize) % TEST_DIMENSION] += 1.0;
    }
    if vector.iter().all(|v| *v == 0.0) {
        vector[0] = 1.0;
    }
    vector
}

/// Records every provider call it receives.
#[derive(Default)]
pub(crate) struct RecordingEmbedder {
    calls: Mutex<Vec<Vec<String>>>,
    fail_on_call: Option<usize>,
    slow_first_calls: bool,
}

impl RecordingEmbedder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail the `call`-th provider call (1-based)
    pub(crate) fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    /// Earlier calls take longer, so concurrent calls complete out of order
    pub(crate) fn slow_first_calls() -> Self {
        Self {
            slow_first_calls: true,
            ..Self::default()
        }
    }

    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.calls
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(Vec::len)
            .collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl Embedder for RecordingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let call = {
            let mut calls = self.calls.lock().expect("lock poisoned");
            calls.push(texts.to_vec());
            calls.len()
        };

        if self.slow_first_calls {
            let delay = 40_u64.saturating_sub(call as u64 * 10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_on_call == Some(call) {
            return Err(RagError::Embedding(format!("rate limited on call {call}")));
        }

        Ok(texts.iter().map(|t| histogram_embedding(t)).collect())
    }
}
