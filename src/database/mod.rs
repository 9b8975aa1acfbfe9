// Database module
// Vector storage (LanceDB, or in-process) plus the SQLite document registry

pub mod lancedb;
pub mod memory;
pub mod records;
pub mod sqlite;

use async_trait::async_trait;

use crate::Result;

pub use lancedb::LanceVectorStore;
pub use memory::InMemoryVectorStore;
pub use records::{DEFAULT_NAMESPACE, QueryMatch, RecordMetadata, VectorRecord, record_id};
pub use sqlite::Database;

/// Upsert, similarity query and filtered delete against one namespace at a time.
///
/// No locking is implied: concurrent writers to the same document name may
/// interleave.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Write or overwrite `records` by id. The call succeeds or fails as a unit.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()>;

    /// At most `top_k` matches ordered by descending similarity.
    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize)
    -> Result<Vec<QueryMatch>>;

    /// Remove every record whose document name equals `document_name`.
    /// Removing a name with no records is a no-op.
    async fn delete_document(&self, namespace: &str, document_name: &str) -> Result<()>;

    /// Number of records in `namespace`, optionally limited to one document
    async fn count(&self, namespace: &str, document_name: Option<&str>) -> Result<usize>;
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for std::sync::Arc<T> {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        (**self).upsert(namespace, records).await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        (**self).query(namespace, vector, top_k).await
    }

    async fn delete_document(&self, namespace: &str, document_name: &str) -> Result<()> {
        (**self).delete_document(namespace, document_name).await
    }

    async fn count(&self, namespace: &str, document_name: Option<&str>) -> Result<usize> {
        (**self).count(namespace, document_name).await
    }
}
