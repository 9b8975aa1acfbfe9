
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    DISTANCE_COLUMN, DOCUMENT_NAME_COLUMN, ID_COLUMN, NAMESPACE_COLUMN, TEXT_COLUMN,
    VECTOR_COLUMN, record_schema, schema_vector_dimension, sql_literal,
};
use crate::config::{Config, StoreConfig};
use crate::database::{QueryMatch, RecordMetadata, VectorRecord, VectorStore};
use crate::{RagError, Result};

/// Vector store backed by one LanceDB table.
///
/// The table is created on the first upsert, with the dimension of the first
/// records written. Namespaces are a column, so one table holds all of them.
pub struct LanceVectorStore {
    connection: Connection,
    table_name: String,
}

impl LanceVectorStore {
    /// Open the store described by `config`: the `vectors` directory under the
    /// config base dir and the configured index as table name.
    ///
    /// The store settings are validated before anything touches the disk.
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        config.store.validate()?;
        Self::open(&config.vector_database_path(), &config.store.index).await
    }

    /// Open (or prepare to create) table `index` in the database at `path`
    #[inline]
    pub async fn open(path: &Path, index: &str) -> Result<Self> {
        StoreConfig {
            index: index.to_string(),
            ..StoreConfig::default()
        }
        .validate()?;

        debug!("Initializing LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::VectorStore(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to connect to LanceDB: {}", e)))?;

        info!("Vector store opened with table '{}'", index);
        Ok(Self {
            connection,
            table_name: index.to_string(),
        })
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Dimension of the stored vectors, or `None` before the first write
    #[inline]
    pub async fn vector_dimension(&self) -> Result<Option<usize>> {
        match self.open_table().await? {
            Some(table) => Ok(Some(Self::table_dimension(&table).await?)),
            None => Ok(None),
        }
    }

    /// Compact the table after large writes
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        let Some(table) = self.open_table().await? else {
            return Ok(());
        };

        debug!("Optimizing vector table '{}'", self.table_name);
        table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to optimize table: {}", e)))?;

        info!("Vector table optimization completed");
        Ok(())
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map(Some)
            .map_err(|e| RagError::VectorStore(format!("Failed to open table: {}", e)))
    }

    async fn table_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to get table schema: {}", e)))?;

        schema_vector_dimension(&schema).ok_or_else(|| {
            RagError::VectorStore("Could not find vector column or determine dimension".to_string())
        })
    }

    /// The table, created with `vector_dim` if missing. An existing table of a
    /// different dimension is an error; it is never dropped.
    async fn table_for_write(&self, vector_dim: usize) -> Result<Table> {
        let table = match self.open_table().await? {
            Some(table) => table,
            None => {
                info!(
                    "Creating vector table '{}' with {} dimensions",
                    self.table_name, vector_dim
                );
                let created = self
                    .connection
                    .create_empty_table(&self.table_name, record_schema(vector_dim))
                    .execute()
                    .await;

                match created {
                    Ok(table) => table,
                    // Lost a creation race with another writer
                    Err(create_err) => self.open_table().await?.ok_or_else(|| {
                        RagError::VectorStore(format!("Failed to create table: {}", create_err))
                    })?,
                }
            }
        };

        let existing = Self::table_dimension(&table).await?;
        if existing != vector_dim {
            return Err(RagError::VectorStore(format!(
                "Vector dimension {} does not match table '{}' dimension {}",
                vector_dim, self.table_name, existing
            )));
        }

        Ok(table)
    }

    fn create_record_batch(
        namespace: &str,
        records: &[VectorRecord],
        vector_dim: usize,
    ) -> Result<RecordBatch> {
        let len = records.len();
        let created_at = Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut document_names = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut ordinals = Vec::with_capacity(len);

        for record in records {
            if record.values.len() != vector_dim {
                return Err(RagError::VectorStore(format!(
                    "Record '{}' has {} dimensions, expected {}",
                    record.id,
                    record.values.len(),
                    vector_dim
                )));
            }
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.values);
            document_names.push(record.metadata.document_name.as_str());
            texts.push(record.metadata.text.as_str());
            ordinals.push(record.ordinal().and_then(|o| u32::try_from(o).ok()));
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            vector_dim as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::VectorStore(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(vec![namespace; len])),
            Arc::new(StringArray::from(document_names)),
            Arc::new(StringArray::from(texts)),
            Arc::new(UInt32Array::from(ordinals)),
            Arc::new(StringArray::from(vec![created_at.as_str(); len])),
        ];

        RecordBatch::try_new(record_schema(vector_dim), arrays)
            .map_err(|e| RagError::VectorStore(format!("Failed to create record batch: {}", e)))
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
        batch
            .column_by_name(name)
            .ok_or_else(|| RagError::VectorStore(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| RagError::VectorStore(format!("Invalid {} column type", name)))
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<QueryMatch>> {
        let document_names = Self::string_column(batch, DOCUMENT_NAME_COLUMN)?;
        let texts = Self::string_column(batch, TEXT_COLUMN)?;
        let distances = batch
            .column_by_name(DISTANCE_COLUMN)
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let matches = (0..batch.num_rows())
            .map(|row| {
                let distance = distances
                    .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

                QueryMatch {
                    metadata: RecordMetadata {
                        text: texts.value(row).to_string(),
                        document_name: document_names.value(row).to_string(),
                    },
                    // Cosine distance to similarity, higher is better
                    score: 1.0 - distance,
                }
            })
            .collect();

        Ok(matches)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            debug!("No records to store");
            return Ok(());
        };

        let vector_dim = first.values.len();
        if vector_dim == 0 {
            return Err(RagError::VectorStore("Record vectors are empty".to_string()));
        }

        // Built before the table is touched so a malformed call writes nothing
        let record_batch = Self::create_record_batch(namespace, records, vector_dim)?;
        let table = self.table_for_write(vector_dim).await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = table.merge_insert(&[NAMESPACE_COLUMN, ID_COLUMN]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to upsert records: {}", e)))?;

        debug!(
            "Upserted {} records into namespace '{}'",
            records.len(),
            namespace
        );
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let Some(table) = self.open_table().await? else {
            debug!("Vector table '{}' does not exist yet", self.table_name);
            return Ok(Vec::new());
        };

        debug!(
            "Searching namespace '{}' for {} nearest records",
            namespace, top_k
        );

        let mut results = table
            .vector_search(vector)
            .map_err(|e| RagError::VectorStore(format!("Failed to create vector search: {}", e)))?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .only_if(format!("{} = {}", NAMESPACE_COLUMN, sql_literal(namespace)))
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to execute search: {}", e)))?;

        let mut matches = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to read result stream: {}", e)))?
        {
            matches.extend(Self::parse_search_batch(&batch)?);
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);

        debug!("Search returned {} matches", matches.len());
        Ok(matches)
    }

    async fn delete_document(&self, namespace: &str, document_name: &str) -> Result<()> {
        let Some(table) = self.open_table().await? else {
            return Ok(());
        };

        let predicate = format!(
            "{} = {} AND {} = {}",
            NAMESPACE_COLUMN,
            sql_literal(namespace),
            DOCUMENT_NAME_COLUMN,
            sql_literal(document_name)
        );
        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to delete records: {}", e)))?;

        info!(
            "Deleted records of '{}' from namespace '{}'",
            document_name, namespace
        );
        Ok(())
    }

    async fn count(&self, namespace: &str, document_name: Option<&str>) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        let namespace_filter = format!("{} = {}", NAMESPACE_COLUMN, sql_literal(namespace));
        let filter = match document_name {
            Some(name) => format!(
                "{} AND {} = {}",
                namespace_filter,
                DOCUMENT_NAME_COLUMN,
                sql_literal(name)
            ),
            None => namespace_filter,
        };

        table
            .count_rows(Some(filter))
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to count rows: {}", e)))
    }
}
