use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError, Schema};
use crate::common::StorageConfig;
use crate::common::types::TableId;
use crate::storage::buffer::BufferPool;
use crate::storage::disk::{HeapFile, HeapFileError};
use crate::transaction::concurrency::{LockManager, Transaction, TransactionError, TransactionManager};
use crate::transaction::wal::{LogError, LogManager, TransactionLog};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Log error: {0}")]
    LogError(#[from] LogError),
    #[error("Heap file error: {0}")]
    HeapFileError(#[from] HeapFileError),
    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
}

/// One storage engine instance: catalog, lock manager, log, buffer pool and
/// transaction manager wired together from a `StorageConfig`.
pub struct Database {
    config: StorageConfig,
    catalog: Arc<Catalog>,
    lock_manager: Arc<LockManager>,
    log_manager: Arc<LogManager>,
    buffer_pool: Arc<BufferPool>,
    txn_manager: TransactionManager,
}

impl Database {
    pub fn open(config: StorageConfig) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(&config.data_dir)?;

        let catalog = Arc::new(Catalog::new());
        let lock_manager = Arc::new(LockManager::new());
        let log_manager = Arc::new(LogManager::new(config.log.clone())?);
        let log: Arc<dyn TransactionLog> = log_manager.clone();

        let buffer_pool = Arc::new(BufferPool::new(
            config.buffer_pool_pages,
            lock_manager.clone(),
            catalog.clone(),
            log.clone(),
        ));
        let txn_manager = TransactionManager::new(buffer_pool.clone(), log);

        info!(
            "Opened database in {} ({} byte pages, {} page pool)",
            config.data_dir.display(),
            config.page_size,
            config.buffer_pool_pages
        );
        Ok(Self {
            config,
            catalog,
            lock_manager,
            log_manager,
            buffer_pool,
            txn_manager,
        })
    }

    /// Register a table stored in `<data_dir>/<name>.tbl`. An existing file is
    /// opened with its contents intact.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<TableId, DatabaseError> {
        if self.catalog.table_id(name).is_ok() {
            return Err(CatalogError::DuplicateTable(name.to_string()).into());
        }

        let path = self.config.data_dir.join(format!("{}.tbl", name));
        let table_id = self.catalog.next_table_id();
        let file = HeapFile::open(path, table_id, Arc::new(schema), self.config.page_size)?;
        Ok(self.catalog.add_table(name, Arc::new(file))?)
    }

    /// Start a transaction
    pub fn begin(&self) -> Result<Transaction, DatabaseError> {
        Ok(self.txn_manager.begin()?)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn transaction_manager(&self) -> &TransactionManager {
        &self.txn_manager
    }
}
