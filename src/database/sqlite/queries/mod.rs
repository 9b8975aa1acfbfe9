
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

const DOCUMENT_COLUMNS: &str = "id, namespace, name, status, total_chunks, committed_chunks, \
                                content_fingerprint, error_message, created_date, updated_date";

pub struct DocumentQueries;

impl DocumentQueries {
    /// Register an ingestion attempt as pending, creating the entry if needed.
    ///
    /// `committed_chunks` is the cursor the attempt starts from: 0 for a fresh
    /// ingest, the previous cursor for a resumed one. The entry moves to
    /// `indexing` when the first batch commits.
    #[inline]
    pub async fn begin(
        pool: &SqlitePool,
        namespace: &str,
        name: &str,
        total_chunks: i64,
        committed_chunks: i64,
        content_fingerprint: &str,
    ) -> Result<Document> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO documents
                (namespace, name, status, total_chunks, committed_chunks, content_fingerprint,
                 created_date, updated_date)
            VALUES (?, ?, 'pending', ?, ?, ?, ?, ?)
            ON CONFLICT (namespace, name) DO UPDATE SET
                status = 'pending',
                total_chunks = excluded.total_chunks,
                committed_chunks = excluded.committed_chunks,
                content_fingerprint = excluded.content_fingerprint,
                error_message = NULL,
                updated_date = excluded.updated_date
            "#,
        )
        .bind(namespace)
        .bind(name)
        .bind(total_chunks)
        .bind(committed_chunks)
        .bind(content_fingerprint)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to register document")?;

        Self::get(pool, namespace, name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve registered document"))
    }

    /// Advance the committed cursor; the entry is `indexing` from here on
    #[inline]
    pub async fn record_progress(
        pool: &SqlitePool,
        namespace: &str,
        name: &str,
        committed_chunks: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE documents SET status = 'indexing', committed_chunks = ?, updated_date = ? \
             WHERE namespace = ? AND name = ?",
        )
        .bind(committed_chunks)
        .bind(Utc::now().naive_utc())
        .bind(namespace)
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to record ingestion progress")?;

        if result.rows_affected() == 0 {
            warn!(
                "No registry entry for '{}' in namespace '{}' while recording progress",
                name, namespace
            );
        }
        Ok(())
    }

    #[inline]
    pub async fn complete(pool: &SqlitePool, namespace: &str, name: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET status = 'completed',
                committed_chunks = total_chunks,
                error_message = NULL,
                updated_date = ?
            WHERE namespace = ? AND name = ?
            "#,
        )
        .bind(Utc::now().naive_utc())
        .bind(namespace)
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to mark document completed")?;

        debug!("Document '{}' marked completed", name);
        Ok(())
    }

    #[inline]
    pub async fn fail(
        pool: &SqlitePool,
        namespace: &str,
        name: &str,
        committed_chunks: i64,
        error_message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET status = 'failed',
                committed_chunks = ?,
                error_message = ?,
                updated_date = ?
            WHERE namespace = ? AND name = ?
            "#,
        )
        .bind(committed_chunks)
        .bind(error_message)
        .bind(Utc::now().naive_utc())
        .bind(namespace)
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to mark document failed")?;

        debug!("Document '{}' marked failed", name);
        Ok(())
    }

    #[inline]
    pub async fn get(pool: &SqlitePool, namespace: &str, name: &str) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE namespace = ? AND name = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(namespace)
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get document")?;

        Ok(document)
    }

    #[inline]
    pub async fn list(pool: &SqlitePool, namespace: &str) -> Result<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE namespace = ? ORDER BY name",
            DOCUMENT_COLUMNS
        ))
        .bind(namespace)
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        Ok(documents)
    }

    /// Returns whether an entry was removed
    #[inline]
    pub async fn delete(pool: &SqlitePool, namespace: &str, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE namespace = ? AND name = ?")
            .bind(namespace)
            .bind(name)
            .execute(pool)
            .await
            .context("Failed to delete document")?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn statistics(pool: &SqlitePool, namespace: &str) -> Result<RegistryStatistics> {
        let rows: Vec<(DocumentStatus, i64, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*), COALESCE(SUM(committed_chunks), 0)
            FROM documents
            WHERE namespace = ?
            GROUP BY status
            "#,
        )
        .bind(namespace)
        .fetch_all(pool)
        .await
        .context("Failed to get registry statistics")?;

        let mut stats = RegistryStatistics::default();
        for (status, count, committed) in rows {
            match status {
                DocumentStatus::Pending => stats.pending = count,
                DocumentStatus::Indexing => stats.indexing = count,
                DocumentStatus::Completed => stats.completed = count,
                DocumentStatus::Failed => stats.failed = count,
            }
            stats.committed_chunks += committed;
        }

        Ok(stats)
    }
}
