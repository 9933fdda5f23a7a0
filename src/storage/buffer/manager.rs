use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::catalog::{Catalog, Tuple};
use crate::common::types::{PageId, PagePtr, Permissions, TableId, TransactionId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::NoStealReplacer;
use crate::storage::page::PageError;
use crate::transaction::concurrency::{LockManager, LockMode};
use crate::transaction::wal::TransactionLog;

/// Page cache shared by every transaction.
///
/// All page access goes through `get_page`, which takes the page lock before the page
/// is looked up or loaded. Dirty pages are never evicted; they reach disk only when
/// their transaction commits or an explicit flush is requested.
///
/// Lock order: a page latch is never held while acquiring the cache mutex.
pub struct BufferPool {
    capacity: usize,
    cache: Mutex<NoStealReplacer>,
    lock_manager: Arc<LockManager>,
    catalog: Arc<Catalog>,
    log: Arc<dyn TransactionLog>,
}

impl BufferPool {
    pub fn new(
        capacity: usize,
        lock_manager: Arc<LockManager>,
        catalog: Arc<Catalog>,
        log: Arc<dyn TransactionLog>,
    ) -> Self {
        Self {
            capacity: capacity.max(1),
            cache: Mutex::new(NoStealReplacer::new()),
            lock_manager,
            catalog,
            log,
        }
    }

    /// Lock a page on behalf of `tid` and return the resident copy, loading it on a miss.
    ///
    /// Blocks while a conflicting lock is held. Fails with a lock error if the
    /// transaction must abort.
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<PagePtr, BufferPoolError> {
        self.lock_manager.acquire(tid, page_id, LockMode::from(perm))?;

        let resident = self.cache.lock().get(&page_id);
        if let Some(page) = resident {
            return Ok(page);
        }

        // Read outside the cache mutex; the page lock keeps writers away
        let file = self.catalog.file(page_id.table_id)?;
        let page = file.read_page(page_id)?;

        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(&page_id) {
            // Another shared holder loaded it first
            return Ok(existing);
        }
        if cache.len() >= self.capacity {
            self.evict_page(&mut cache)?;
        }

        let page = Arc::new(RwLock::new(page));
        cache.insert(page_id, page.clone());
        debug!("Loaded page {} for {}", page_id, tid);
        Ok(page)
    }

    /// Insert a tuple into a table and set its record id
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<(), BufferPoolError> {
        let file = self.catalog.file(table_id)?;
        let dirtied = file.insert_tuple(self, tid, tuple)?;
        self.mark_dirtied(tid, dirtied)
    }

    /// Delete the tuple named by its record id
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), BufferPoolError> {
        let rid = tuple.record_id().ok_or(PageError::MissingRecordId)?;
        let file = self.catalog.file(rid.page_id.table_id)?;
        let dirtied = file.delete_tuple(self, tid, tuple)?;
        self.mark_dirtied(tid, dirtied)
    }

    /// Mark pages dirty by `tid` and make sure the copies it mutated are the resident ones
    fn mark_dirtied(&self, tid: TransactionId, pages: Vec<PagePtr>) -> Result<(), BufferPoolError> {
        for page in pages {
            let page_id = {
                let mut guard = page.write();
                guard.mark_dirty(Some(tid));
                guard.id()
            };

            let mut cache = self.cache.lock();
            match cache.get(&page_id) {
                Some(resident) if Arc::ptr_eq(&resident, &page) => {}
                Some(_) => {
                    cache.insert(page_id, page);
                }
                None => {
                    // Evicted while still clean, between the mutation and this point
                    if cache.len() >= self.capacity {
                        self.evict_page(&mut cache)?;
                    }
                    cache.insert(page_id, page);
                }
            }
        }
        Ok(())
    }

    /// Finish a transaction: on commit flush its exclusively locked pages and refresh
    /// their before-images, on abort drop every page it locked from the cache. Its
    /// locks are released either way.
    ///
    /// If a flush fails that page is discarded, the remaining pages are still
    /// processed, and the first error is returned once the locks are gone.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<(), BufferPoolError> {
        let locks = self.lock_manager.locks_of(tid);
        let mut result = Ok(());

        if commit {
            for lock in locks.iter().filter(|lock| lock.mode == LockMode::Exclusive) {
                match self.flush_page(lock.page_id) {
                    Ok(()) => {
                        let resident = self.cache.lock().get(&lock.page_id);
                        if let Some(page) = resident {
                            page.write().set_before_image();
                        }
                    }
                    Err(e) => {
                        error!("Failed to flush page {} while committing {}: {}", lock.page_id, tid, e);
                        // The unwritten changes must not outlive the transaction
                        self.discard_page(lock.page_id);
                        if result.is_ok() {
                            result = Err(e);
                        }
                    }
                }
            }
        } else {
            for lock in &locks {
                self.discard_page(lock.page_id);
            }
        }

        self.lock_manager.release_all(tid);
        info!(
            "{} {} ({} pages locked)",
            tid,
            if commit { "committed" } else { "aborted" },
            locks.len()
        );
        result
    }

    /// Whether `tid` holds a lock on `page_id`
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds(tid, page_id)
    }

    /// Release one page lock before the transaction ends. This breaks two-phase
    /// locking and is only safe when the caller knows the page was not used.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release(tid, page_id);
    }

    /// Remove a page from the cache without writing it
    pub fn discard_page(&self, page_id: PageId) {
        if self.cache.lock().remove(&page_id).is_some() {
            debug!("Discarded page {}", page_id);
        }
    }

    /// Write a resident dirty page to disk, logging its images first
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let resident = self.cache.lock().get(&page_id);
        let Some(page) = resident else {
            return Ok(());
        };
        let file = self.catalog.file(page_id.table_id)?;

        let mut guard = page.write();
        let Some(dirtier) = guard.is_dirty() else {
            return Ok(());
        };

        let after_image = guard.page_data();
        self.log
            .log_write(dirtier, page_id, guard.before_image(), &after_image)?;
        self.log.force()?;
        file.write_page(&guard)?;
        guard.mark_dirty(None);

        debug!("Flushed page {} dirtied by {}", page_id, dirtier);
        Ok(())
    }

    /// Flush every page `tid` holds exclusively without ending the transaction
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), BufferPoolError> {
        for lock in self.lock_manager.locks_of(tid) {
            if lock.mode == LockMode::Exclusive {
                self.flush_page(lock.page_id)?;
            }
        }
        Ok(())
    }

    /// Flush every dirty resident page, including pages of running transactions
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let page_ids = self.cache.lock().page_ids();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Resident page ids, oldest first
    pub fn resident_page_ids(&self) -> Vec<PageId> {
        self.cache.lock().page_ids()
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.cache.lock().contains(&page_id)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn evict_page(&self, cache: &mut NoStealReplacer) -> Result<(), BufferPoolError> {
        match cache.victim() {
            Some(victim) => {
                debug!("Evicted page {}", victim);
                Ok(())
            }
            None => {
                warn!("No clean page to evict among {} resident pages", cache.len());
                Err(BufferPoolError::ResourceExhausted {
                    capacity: self.capacity,
                })
            }
        }
    }
}
