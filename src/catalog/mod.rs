//! Catalog Management Module
//!
//! Resolves table identifiers to their schema and backing heap file. The buffer
//! pool goes through the catalog to find the file a `PageId` lives in.

pub mod error;
pub mod schema;
pub mod tuple;

pub use self::error::{CatalogError, SchemaError};
pub use self::schema::{Column, FieldType, Schema};
pub use self::tuple::{Field, Tuple};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;
use parking_lot::RwLock;

use crate::common::types::TableId;
use crate::storage::disk::HeapFile;

struct TableEntry {
    name: String,
    file: Arc<HeapFile>,
}

/// Registry of tables. One instance is shared by every component of a database.
pub struct Catalog {
    tables: RwLock<HashMap<TableId, TableEntry>>,
    names: RwLock<HashMap<String, TableId>>,
    table_id_counter: AtomicU32,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
            table_id_counter: AtomicU32::new(1),
        }
    }

    /// Reserve the id a new table will be registered under
    pub fn next_table_id(&self) -> TableId {
        self.table_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a heap file under a table name. The file's table id must have been
    /// obtained from `next_table_id`.
    pub fn add_table(&self, name: &str, file: Arc<HeapFile>) -> Result<TableId, CatalogError> {
        let mut names = self.names.write();
        if names.contains_key(name) {
            return Err(CatalogError::DuplicateTable(name.to_string()));
        }

        let table_id = file.table_id();
        names.insert(name.to_string(), table_id);
        self.tables.write().insert(
            table_id,
            TableEntry {
                name: name.to_string(),
                file,
            },
        );

        debug!("Registered table '{}' with id {}", name, table_id);
        Ok(table_id)
    }

    /// The heap file backing a table
    pub fn file(&self, table_id: TableId) -> Result<Arc<HeapFile>, CatalogError> {
        self.tables
            .read()
            .get(&table_id)
            .map(|entry| entry.file.clone())
            .ok_or(CatalogError::TableNotFound(table_id))
    }

    pub fn schema(&self, table_id: TableId) -> Result<Arc<Schema>, CatalogError> {
        Ok(self.file(table_id)?.schema())
    }

    pub fn table_id(&self, name: &str) -> Result<TableId, CatalogError> {
        self.names
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::TableNameNotFound(name.to_string()))
    }

    pub fn table_name(&self, table_id: TableId) -> Result<String, CatalogError> {
        self.tables
            .read()
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or(CatalogError::TableNotFound(table_id))
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.tables.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_register_and_resolve() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new();
        let schema = Arc::new(Schema::parse("int,int").unwrap());

        let id = catalog.next_table_id();
        let file = HeapFile::open(dir.path().join("t.tbl"), id, schema.clone(), 256).unwrap();
        assert_eq!(catalog.add_table("t", Arc::new(file)).unwrap(), id);

        assert_eq!(catalog.table_id("t").unwrap(), id);
        assert_eq!(catalog.table_name(id).unwrap(), "t");
        assert_eq!(*catalog.schema(id).unwrap(), *schema);
        assert_eq!(catalog.table_ids(), vec![id]);

        assert!(matches!(catalog.file(id + 1), Err(CatalogError::TableNotFound(_))));
        assert!(matches!(
            catalog.table_id("missing"),
            Err(CatalogError::TableNameNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_table_name() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new();
        let schema = Arc::new(Schema::parse("int").unwrap());

        let a = HeapFile::open(dir.path().join("a.tbl"), catalog.next_table_id(), schema.clone(), 256).unwrap();
        let b = HeapFile::open(dir.path().join("b.tbl"), catalog.next_table_id(), schema, 256).unwrap();
        catalog.add_table("dup", Arc::new(a)).unwrap();
        assert!(matches!(
            catalog.add_table("dup", Arc::new(b)),
            Err(CatalogError::DuplicateTable(_))
        ));
    }
}
