use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::info;
use parking_lot::Mutex;

use crate::common::types::TransactionId;
use crate::storage::buffer::BufferPool;
use crate::transaction::concurrency::transaction::{Result, Transaction};
use crate::transaction::wal::TransactionLog;

/// Transaction manager - hands out transaction ids and tracks which are running
pub struct TransactionManager {
    /// Next transaction ID to assign; ids are never reused
    next_txn_id: AtomicU64,

    pool: Arc<BufferPool>,

    log: Arc<dyn TransactionLog>,

    active: Arc<Mutex<HashSet<TransactionId>>>,
}

impl TransactionManager {
    pub fn new(pool: Arc<BufferPool>, log: Arc<dyn TransactionLog>) -> Self {
        Self {
            next_txn_id: AtomicU64::new(1),
            pool,
            log,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Begin a new transaction by writing its BEGIN record
    pub fn begin(&self) -> Result<Transaction> {
        let txn_id = TransactionId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        let begin_lsn = self.log.log_begin(txn_id)?;

        self.active.lock().insert(txn_id);
        info!("Began {}", txn_id);
        Ok(Transaction::new(
            txn_id,
            begin_lsn,
            self.pool.clone(),
            self.log.clone(),
            self.active.clone(),
        ))
    }

    /// Ids of transactions that have neither committed nor aborted, sorted
    pub fn active_transactions(&self) -> Vec<TransactionId> {
        let mut ids: Vec<TransactionId> = self.active.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_active(&self, txn_id: TransactionId) -> bool {
        self.active.lock().contains(&txn_id)
    }
}
