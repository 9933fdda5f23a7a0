// A unit of work running against the buffer pool

use std::collections::HashSet;
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;
use thiserror::Error;

use crate::catalog::Tuple;
use crate::common::types::{Lsn, PageId, PagePtr, Permissions, TableId, TransactionId};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::disk::HeapFileIterator;
use crate::transaction::wal::{LogError, TransactionLog};

/// Transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {0} is already committed or aborted")]
    InvalidState(TransactionId),

    #[error("Buffer pool error: {0}")]
    BufferPoolError(#[from] BufferPoolError),

    #[error("Failed to write to WAL: {0}")]
    LogError(#[from] LogError),
}

impl TransactionError {
    /// Whether the lock manager refused a request and the transaction must be aborted
    pub fn is_abort(&self) -> bool {
        matches!(self, TransactionError::BufferPoolError(e) if e.is_abort())
    }
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Handle for one running transaction.
///
/// Dropping a handle that is still active aborts it.
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    begin_lsn: Lsn,
    pool: Arc<BufferPool>,
    log: Arc<dyn TransactionLog>,
    active: Arc<Mutex<HashSet<TransactionId>>>,
}

impl Transaction {
    pub(crate) fn new(
        id: TransactionId,
        begin_lsn: Lsn,
        pool: Arc<BufferPool>,
        log: Arc<dyn TransactionLog>,
        active: Arc<Mutex<HashSet<TransactionId>>>,
    ) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            begin_lsn,
            pool,
            log,
            active,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// LSN of this transaction's BEGIN record
    pub fn begin_lsn(&self) -> Lsn {
        self.begin_lsn
    }

    pub fn get_page(&self, page_id: PageId, perm: Permissions) -> Result<PagePtr> {
        self.check_active()?;
        Ok(self.pool.get_page(self.id, page_id, perm)?)
    }

    pub fn insert_tuple(&self, table_id: TableId, tuple: &mut Tuple) -> Result<()> {
        self.check_active()?;
        Ok(self.pool.insert_tuple(self.id, table_id, tuple)?)
    }

    pub fn delete_tuple(&self, tuple: &Tuple) -> Result<()> {
        self.check_active()?;
        Ok(self.pool.delete_tuple(self.id, tuple)?)
    }

    /// Sequential scan of a table under shared page locks
    pub fn scan(&self, table_id: TableId) -> Result<HeapFileIterator> {
        self.check_active()?;
        let file = self
            .pool
            .catalog()
            .file(table_id)
            .map_err(BufferPoolError::from)?;
        Ok(file.iterator(self.pool.clone(), self.id))
    }

    /// Flush this transaction's pages, release its locks and log COMMIT.
    ///
    /// If a page cannot be written the transaction ends aborted instead. Pages
    /// flushed before the failure stay on disk; nothing rolls them back.
    pub fn commit(&mut self) -> Result<()> {
        self.check_active()?;

        if let Err(e) = self.pool.transaction_complete(self.id, true) {
            self.finish(TransactionState::Aborted);
            if let Err(log_err) = self.log.log_abort(self.id).and_then(|_| self.log.force()) {
                warn!("Could not log abort of {}: {}", self.id, log_err);
            }
            return Err(e.into());
        }

        self.finish(TransactionState::Committed);
        self.log.log_commit(self.id)?;
        self.log.force()?;
        Ok(())
    }

    /// Log ABORT, then drop every page this transaction touched and release its locks
    pub fn abort(&mut self) -> Result<()> {
        self.check_active()?;

        let logged = self
            .log
            .log_abort(self.id)
            .and_then(|_| self.log.force());
        let completed = self.pool.transaction_complete(self.id, false);
        self.finish(TransactionState::Aborted);

        logged?;
        completed?;
        Ok(())
    }

    fn check_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(TransactionError::InvalidState(self.id));
        }
        Ok(())
    }

    fn finish(&mut self, state: TransactionState) {
        self.state = state;
        self.active.lock().remove(&self.id);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            warn!("{} dropped while active, aborting", self.id);
            if let Err(e) = self.abort() {
                warn!("Abort of dropped {} failed: {}", self.id, e);
            }
        }
    }
}
