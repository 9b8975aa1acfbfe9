#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::embeddings::{Chunk, EmbeddingVector};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "ns1";

/// Record identifier for a chunk: `"<document_name>-<ordinal>"`.
///
/// Content-independent, so re-ingesting a document overwrites records at the
/// same ordinals.
#[inline]
pub fn record_id(document_name: &str, ordinal: usize) -> String {
    format!("{}-{}", document_name, ordinal)
}

/// Metadata stored alongside each vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Verbatim chunk text
    pub text: String,
    /// Original upload name; the only deletion key
    pub document_name: String,
}

/// The unit persisted in and retrieved from the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: EmbeddingVector,
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    #[inline]
    pub fn new(document_name: &str, ordinal: usize, text: String, values: EmbeddingVector) -> Self {
        Self {
            id: record_id(document_name, ordinal),
            values,
            metadata: RecordMetadata {
                text,
                document_name: document_name.to_string(),
            },
        }
    }

    #[inline]
    pub fn from_chunk(document_name: &str, chunk: &Chunk, values: EmbeddingVector) -> Self {
        Self::new(document_name, chunk.ordinal, chunk.text.clone(), values)
    }

    /// Ordinal encoded in the id, if the id follows the `<name>-<ordinal>` scheme
    #[inline]
    pub fn ordinal(&self) -> Option<usize> {
        self.id
            .strip_prefix(self.metadata.document_name.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|ordinal| ordinal.parse().ok())
    }
}

/// A similarity-query hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub metadata: RecordMetadata,
    /// Higher is more similar
    pub score: f32,
}
