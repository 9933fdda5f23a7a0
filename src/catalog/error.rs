use thiserror::Error;

use crate::common::types::TableId;

/// Errors raised when a tuple does not match a table schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Tuple has {actual} fields, schema expects {expected}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("Type mismatch in field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },
    #[error("Text value of {len} bytes exceeds field {field} width of {max}")]
    TextTooLong { field: String, len: usize, max: usize },
    #[error("Corrupted tuple bytes: {0}")]
    Corrupted(String),
    #[error("Invalid field type specification: {0}")]
    InvalidSpec(String),
}

/// Errors raised by table lookups in the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Table {0} not found")]
    TableNotFound(TableId),
    #[error("Table '{0}' not found")]
    TableNameNotFound(String),
    #[error("Table '{0}' already exists")]
    DuplicateTable(String),
}
