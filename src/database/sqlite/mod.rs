use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{Document, RegistryStatistics};
use crate::database::sqlite::queries::DocumentQueries;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

pub const DATABASE_FILE_NAME: &str = "documents.db";

/// Document registry: ingestion status and committed-chunk cursor per document
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join(DATABASE_FILE_NAME)).await
    }

    pub async fn begin_document(
        &self,
        namespace: &str,
        name: &str,
        total_chunks: usize,
        committed_chunks: usize,
        content_fingerprint: &str,
    ) -> Result<Document> {
        DocumentQueries::begin(
            &self.pool,
            namespace,
            name,
            to_count(total_chunks)?,
            to_count(committed_chunks)?,
            content_fingerprint,
        )
        .await
    }

    pub async fn record_progress(
        &self,
        namespace: &str,
        name: &str,
        committed_chunks: usize,
    ) -> Result<()> {
        DocumentQueries::record_progress(&self.pool, namespace, name, to_count(committed_chunks)?)
            .await
    }

    pub async fn complete_document(&self, namespace: &str, name: &str) -> Result<()> {
        DocumentQueries::complete(&self.pool, namespace, name).await
    }

    pub async fn fail_document(
        &self,
        namespace: &str,
        name: &str,
        committed_chunks: usize,
        error_message: &str,
    ) -> Result<()> {
        DocumentQueries::fail(
            &self.pool,
            namespace,
            name,
            to_count(committed_chunks)?,
            error_message,
        )
        .await
    }

    pub async fn get_document(&self, namespace: &str, name: &str) -> Result<Option<Document>> {
        DocumentQueries::get(&self.pool, namespace, name).await
    }

    pub async fn list_documents(&self, namespace: &str) -> Result<Vec<Document>> {
        DocumentQueries::list(&self.pool, namespace).await
    }

    pub async fn delete_document(&self, namespace: &str, name: &str) -> Result<bool> {
        DocumentQueries::delete(&self.pool, namespace, name).await
    }

    pub async fn statistics(&self, namespace: &str) -> Result<RegistryStatistics> {
        DocumentQueries::statistics(&self.pool, namespace).await
    }
}

fn to_count(value: usize) -> Result<i64> {
    i64::try_from(value).context("Chunk count out of range")
}
