#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// Registry entry for one ingested document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub namespace: String,
    pub name: String,
    pub status: DocumentStatus,
    pub total_chunks: i64,
    /// Chunks from the front of the document already in the vector store
    pub committed_chunks: i64,
    /// Fingerprint of the chunk sequence the latest attempt started with
    pub content_fingerprint: Option<String>,
    pub error_message: Option<String>,
    pub created_date: NaiveDateTime,
    pub updated_date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Registered, no batch committed by the current attempt yet
    Pending,
    Indexing,
    Completed,
    Failed,
}

impl DocumentStatus {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Indexing => "indexing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Pending => write!(f, "Pending"),
            DocumentStatus::Indexing => write!(f, "Indexing"),
            DocumentStatus::Completed => write!(f, "Completed"),
            DocumentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl Document {
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == DocumentStatus::Completed
    }

    #[inline]
    pub fn progress_percent(&self) -> i64 {
        if self.total_chunks <= 0 {
            return if self.is_completed() { 100 } else { 0 };
        }
        (self.committed_chunks * 100 / self.total_chunks).clamp(0, 100)
    }

    /// Ordinal to restart from when re-ingesting `total_chunks` chunks with
    /// `fingerprint`, if an interrupted attempt over the same chunks left a
    /// usable cursor.
    #[inline]
    pub fn resume_offset(&self, total_chunks: usize, fingerprint: &str) -> Option<usize> {
        let interrupted = !self.is_completed();
        let same_content = self.content_fingerprint.as_deref() == Some(fingerprint)
            && usize::try_from(self.total_chunks).ok() == Some(total_chunks);
        let committed = usize::try_from(self.committed_chunks).ok()?;

        (interrupted && same_content && committed > 0 && committed < total_chunks)
            .then_some(committed)
    }
}

/// Count of documents per status in one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegistryStatistics {
    pub pending: i64,
    pub indexing: i64,
    pub completed: i64,
    pub failed: i64,
    pub committed_chunks: i64,
}

impl RegistryStatistics {
    #[inline]
    pub fn total_documents(&self) -> i64 {
        self.pending + self.indexing + self.completed + self.failed
    }
}
