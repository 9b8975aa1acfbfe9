
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::VectorStore;
use super::records::{QueryMatch, VectorRecord};
use crate::{RagError, Result};

/// Process-local vector store with exact cosine-similarity search.
///
/// Useful when embedding the pipeline as a library without a LanceDB
/// directory; nothing is persisted.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, BTreeMap<String, VectorRecord>>>,
}

impl InMemoryVectorStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one namespace, ordered by record id
    #[inline]
    pub async fn records(&self, namespace: &str) -> Vec<VectorRecord> {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut namespaces = self.namespaces.write().await;
        let existing = namespaces.entry(namespace.to_string()).or_default();

        // Reject the whole call before writing anything
        let dimension = existing
            .values()
            .next()
            .map_or(records[0].values.len(), |r| r.values.len());
        if let Some(bad) = records.iter().find(|r| r.values.len() != dimension) {
            return Err(RagError::VectorStore(format!(
                "Record {} has dimension {}, expected {}",
                bad.id,
                bad.values.len(),
                dimension
            )));
        }

        for record in records {
            existing.insert(record.id.clone(), record.clone());
        }

        debug!("Upserted {} records into namespace {}", records.len(), namespace);
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let namespaces = self.namespaces.read().await;
        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<QueryMatch> = records
            .values()
            .map(|record| QueryMatch {
                metadata: record.metadata.clone(),
                score: cosine_similarity(vector, &record.values),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);

        debug!(
            "Query in namespace {} returned {} matches",
            namespace,
            matches.len()
        );
        Ok(matches)
    }

    async fn delete_document(&self, namespace: &str, document_name: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        if let Some(records) = namespaces.get_mut(namespace) {
            let before = records.len();
            records.retain(|_, record| record.metadata.document_name != document_name);
            info!(
                "Deleted {} records for document {} in namespace {}",
                before - records.len(),
                document_name,
                namespace
            );
        }
        Ok(())
    }

    async fn count(&self, namespace: &str, document_name: Option<&str>) -> Result<usize> {
        let namespaces = self.namespaces.read().await;
        let count = namespaces.get(namespace).map_or(0, |records| {
            records
                .values()
                .filter(|r| document_name.is_none_or(|name| r.metadata.document_name == name))
                .count()
        });
        Ok(count)
    }
}
