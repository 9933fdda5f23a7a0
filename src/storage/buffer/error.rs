use thiserror::Error;

use crate::catalog::CatalogError;
use crate::storage::disk::HeapFileError;
use crate::storage::page::PageError;
use crate::transaction::concurrency::LockError;
use crate::transaction::wal::LogError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("Lock manager error: {0}")]
    LockError(#[from] LockError),
    #[error("Buffer pool is full: all {capacity} resident pages are dirty")]
    ResourceExhausted { capacity: usize },
    #[error("Heap file error: {0}")]
    HeapFileError(#[from] HeapFileError),
    #[error("Page error: {0}")]
    PageError(#[from] PageError),
    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),
    #[error("Log error: {0}")]
    LogError(#[from] LogError),
}

impl BufferPoolError {
    /// Whether the lock manager refused the request, in which case the caller must
    /// abort the whole transaction
    pub fn is_abort(&self) -> bool {
        matches!(self, BufferPoolError::LockError(_))
    }
}
