// LanceDB vector database module
// Persistent vector storage and similarity search for chunk embeddings


pub mod vector_store;

use arrow::datatypes::{DataType, Field, Schema};
use std::sync::Arc;

pub use vector_store::LanceVectorStore;

pub(crate) const ID_COLUMN: &str = "id";
pub(crate) const VECTOR_COLUMN: &str = "vector";
pub(crate) const NAMESPACE_COLUMN: &str = "namespace";
pub(crate) const DOCUMENT_NAME_COLUMN: &str = "document_name";
pub(crate) const TEXT_COLUMN: &str = "text";
pub(crate) const ORDINAL_COLUMN: &str = "ordinal";
pub(crate) const CREATED_AT_COLUMN: &str = "created_at";
pub(crate) const DISTANCE_COLUMN: &str = "_distance";

/// Table schema for vectors of `vector_dim` dimensions
pub(crate) fn record_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new(NAMESPACE_COLUMN, DataType::Utf8, false),
        Field::new(DOCUMENT_NAME_COLUMN, DataType::Utf8, false),
        Field::new(TEXT_COLUMN, DataType::Utf8, false),
        Field::new(ORDINAL_COLUMN, DataType::UInt32, true),
        Field::new(CREATED_AT_COLUMN, DataType::Utf8, false),
    ]))
}

/// Vector dimension declared by a table schema
pub(crate) fn schema_vector_dimension(schema: &Schema) -> Option<usize> {
    schema
        .fields()
        .iter()
        .find(|field| field.name() == VECTOR_COLUMN)
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
}

/// Quote a value for use inside a LanceDB filter predicate
pub(crate) fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
