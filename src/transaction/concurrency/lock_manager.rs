// Page-level strict two-phase locking with wait-for graph deadlock detection

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::common::types::{PageId, Permissions, TransactionId};
use crate::transaction::concurrency::wait_for::WaitForGraph;

/// Lock modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// Why the lock manager refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Waiting would close a cycle in the wait-for graph
    DeadlockCycle,
    /// A shared request arrived while another transaction waits for exclusive access
    PendingWriter,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::DeadlockCycle => write!(f, "wait-for cycle detected"),
            AbortReason::PendingWriter => write!(f, "a writer is already waiting"),
        }
    }
}

/// Errors returned by the lock manager. Every variant means the requesting
/// transaction must be rolled back by its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Transaction {tid} aborted while locking page {page_id}: {reason}")]
    Aborted {
        tid: TransactionId,
        page_id: PageId,
        reason: AbortReason,
    },
}

/// Snapshot of the lock on one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLock {
    pub page_id: PageId,
    pub mode: LockMode,
    /// Number of transactions currently holding the page in `mode`
    pub hold_count: usize,
}

struct PageLockState {
    mode: LockMode,
    holders: HashSet<TransactionId>,
    /// Signalled whenever a holder releases this page
    released: Arc<Condvar>,
}

enum Attempt {
    Granted,
    Wait(Arc<Condvar>),
}

#[derive(Default)]
struct LockTable {
    locks: HashMap<PageId, PageLockState>,
    txn_pages: HashMap<TransactionId, HashSet<PageId>>,
    waits_for: WaitForGraph,
    pending_writers: HashMap<PageId, HashSet<TransactionId>>,
}

impl LockTable {
    fn try_acquire(
        &mut self,
        tid: TransactionId,
        page_id: PageId,
        mode: LockMode,
        first_attempt: bool,
    ) -> Result<Attempt, LockError> {
        let Some(state) = self.locks.get(&page_id) else {
            self.grant(tid, page_id, mode);
            return Ok(Attempt::Granted);
        };

        match mode {
            LockMode::Shared => {
                // Already holding it shared or exclusive
                if state.holders.contains(&tid) {
                    self.finish_wait(tid, page_id);
                    return Ok(Attempt::Granted);
                }
                if first_attempt && self.has_pending_writer(page_id, tid) {
                    return Err(self.abort(tid, page_id, AbortReason::PendingWriter));
                }
                if state.mode == LockMode::Shared {
                    self.grant(tid, page_id, LockMode::Shared);
                    return Ok(Attempt::Granted);
                }

                let holders: Vec<TransactionId> = state.holders.iter().copied().collect();
                let released = state.released.clone();
                self.block_on(tid, page_id, &holders, released)
            }
            LockMode::Exclusive => {
                let others: Vec<TransactionId> = state
                    .holders
                    .iter()
                    .copied()
                    .filter(|holder| *holder != tid)
                    .collect();

                // Sole holder: take or keep exclusive in place
                if others.is_empty() {
                    if state.mode == LockMode::Shared {
                        debug!("{} upgraded its lock on page {} to exclusive", tid, page_id);
                    }
                    self.grant(tid, page_id, LockMode::Exclusive);
                    return Ok(Attempt::Granted);
                }

                let released = state.released.clone();
                self.pending_writers.entry(page_id).or_default().insert(tid);
                self.block_on(tid, page_id, &others, released)
            }
        }
    }

    fn block_on(
        &mut self,
        tid: TransactionId,
        page_id: PageId,
        holders: &[TransactionId],
        released: Arc<Condvar>,
    ) -> Result<Attempt, LockError> {
        // Holders may have changed since the last wake-up
        self.waits_for.clear_outgoing(tid);
        for &holder in holders {
            self.waits_for.add_edge(tid, holder);
        }

        if self.waits_for.has_cycle() {
            return Err(self.abort(tid, page_id, AbortReason::DeadlockCycle));
        }

        debug!("{} waits for page {} held by {:?}", tid, page_id, holders);
        Ok(Attempt::Wait(released))
    }

    fn grant(&mut self, tid: TransactionId, page_id: PageId, mode: LockMode) {
        let state = self.locks.entry(page_id).or_insert_with(|| PageLockState {
            mode,
            holders: HashSet::new(),
            released: Arc::new(Condvar::new()),
        });
        state.mode = mode;
        state.holders.insert(tid);
        debug_assert!(state.mode == LockMode::Shared || state.holders.len() == 1);

        self.txn_pages.entry(tid).or_default().insert(page_id);
        self.finish_wait(tid, page_id);
        debug!("Granted {:?} lock on page {} to {}", mode, page_id, tid);
    }

    fn abort(&mut self, tid: TransactionId, page_id: PageId, reason: AbortReason) -> LockError {
        self.finish_wait(tid, page_id);
        warn!("Aborting {} on page {}: {}", tid, page_id, reason);
        LockError::Aborted {
            tid,
            page_id,
            reason,
        }
    }

    /// Remove the wait edges and writer registration of a request that stopped waiting
    fn finish_wait(&mut self, tid: TransactionId, page_id: PageId) {
        self.waits_for.clear_outgoing(tid);
        if let Some(writers) = self.pending_writers.get_mut(&page_id) {
            writers.remove(&tid);
            if writers.is_empty() {
                self.pending_writers.remove(&page_id);
            }
        }
    }

    fn has_pending_writer(&self, page_id: PageId, tid: TransactionId) -> bool {
        self.pending_writers
            .get(&page_id)
            .is_some_and(|writers| writers.iter().any(|w| *w != tid))
    }

    fn release(&mut self, tid: TransactionId, page_id: PageId) {
        let Some(state) = self.locks.get_mut(&page_id) else {
            return;
        };
        if !state.holders.remove(&tid) {
            return;
        }

        let released = state.released.clone();
        if state.holders.is_empty() {
            self.locks.remove(&page_id);
        }
        if let Some(pages) = self.txn_pages.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.txn_pages.remove(&tid);
            }
        }

        debug!("{} released page {}", tid, page_id);
        released.notify_all();
    }
}

/// Grants, blocks or refuses page access per transaction.
///
/// All bookkeeping lives behind one mutex. A blocked request sleeps on the condition
/// variable of the page it waits for, which releases the mutex while waiting.
#[derive(Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a lock on `page_id` for `tid`, blocking while a conflicting lock is held.
    ///
    /// Returns `LockError::Aborted` when waiting would deadlock, or when a shared request
    /// arrives while another transaction is already waiting for exclusive access.
    pub fn acquire(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<(), LockError> {
        let mut table = self.table.lock();
        let mut first_attempt = true;
        loop {
            match table.try_acquire(tid, page_id, mode, first_attempt)? {
                Attempt::Granted => return Ok(()),
                Attempt::Wait(released) => {
                    released.wait(&mut table);
                    first_attempt = false;
                }
            }
        }
    }

    /// Release `tid`'s lock on `page_id` and wake the transactions waiting for it
    pub fn release(&self, tid: TransactionId, page_id: PageId) {
        self.table.lock().release(tid, page_id);
    }

    /// Release every lock held by `tid` and drop it from the wait-for graph
    pub fn release_all(&self, tid: TransactionId) {
        let mut table = self.table.lock();
        let pages: Vec<PageId> = table
            .txn_pages
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        for page_id in pages {
            table.release(tid, page_id);
        }
        table.waits_for.remove_vertex(tid);
    }

    pub fn holds(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.table
            .lock()
            .locks
            .get(&page_id)
            .is_some_and(|state| state.holders.contains(&tid))
    }

    /// Locks currently held by `tid`, ordered by page id
    pub fn locks_of(&self, tid: TransactionId) -> Vec<PageLock> {
        let table = self.table.lock();
        let mut locks: Vec<PageLock> = table
            .txn_pages
            .get(&tid)
            .into_iter()
            .flatten()
            .filter_map(|page_id| {
                table.locks.get(page_id).map(|state| PageLock {
                    page_id: *page_id,
                    mode: state.mode,
                    hold_count: state.holders.len(),
                })
            })
            .collect();
        locks.sort_by_key(|lock| lock.page_id);
        locks
    }

    /// Current lock on a page, if any transaction holds it
    pub fn page_lock(&self, page_id: PageId) -> Option<PageLock> {
        self.table.lock().locks.get(&page_id).map(|state| PageLock {
            page_id,
            mode: state.mode,
            hold_count: state.holders.len(),
        })
    }

    /// Whether `tid` is blocked inside `acquire`
    pub fn is_waiting(&self, tid: TransactionId) -> bool {
        self.table.lock().waits_for.is_waiting(tid)
    }

    /// Transactions `tid` is blocked on
    pub fn waiting_on(&self, tid: TransactionId) -> Vec<TransactionId> {
        self.table.lock().waits_for.waiting_on(tid)
    }
}
