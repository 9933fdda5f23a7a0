// Pagestore: page cache, page locking and heap files for a single-node storage engine

pub mod catalog;
pub mod common;
pub mod database;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use catalog::{Catalog, Field, FieldType, Schema, Tuple};
pub use common::StorageConfig;
pub use common::types::{PageId, Permissions, RecordId, TransactionId};
pub use database::{Database, DatabaseError};
pub use storage::buffer::{BufferPool, BufferPoolError};
pub use storage::disk::{HeapFile, HeapFileError, HeapFileIterator};
pub use storage::page::{HeapPage, PageError};
pub use transaction::{
    LockError, LockManager, Transaction, TransactionError, TransactionManager, TransactionState,
};
