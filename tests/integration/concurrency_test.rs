use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use crossbeam::channel;

use pagestore::common::types::{PageId, Permissions};
use pagestore::storage::buffer::BufferPoolError;
use pagestore::transaction::concurrency::{AbortReason, LockError, LockMode};
use pagestore::{Database, TransactionError, TransactionId};

#[path = "../common/mod.rs"]
mod common;
use common::{SMALL_PAGE_SIZE, create_int_table, create_test_db, insert_sequence, scan_all};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

// Poll until a transaction is parked in the lock manager
fn wait_until_blocked(db: &Database, tid: TransactionId) -> Result<()> {
    let start = Instant::now();
    while !db.lock_manager().is_waiting(tid) {
        if start.elapsed() > WAIT_LIMIT {
            bail!("{} never blocked", tid);
        }
        thread::sleep(Duration::from_millis(5));
    }
    Ok(())
}

fn join_all(handles: Vec<thread::ScopedJoinHandle<'_, Result<()>>>) -> Result<()> {
    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => bail!("worker thread panicked"),
        }
    }
    Ok(())
}

fn abort_reason(err: &TransactionError) -> Option<AbortReason> {
    match err {
        TransactionError::BufferPoolError(BufferPoolError::LockError(LockError::Aborted {
            reason, ..
        })) => Some(*reason),
        _ => None,
    }
}

fn setup_pages(pages: u32) -> Result<(Database, tempfile::TempDir, Vec<PageId>)> {
    let (db, dir) = create_test_db(SMALL_PAGE_SIZE, 16)?;
    let table_id = create_int_table(&db, "t", 2)?;
    let file = db.catalog().file(table_id)?;
    let mut page_ids = Vec::new();
    for _ in 0..pages {
        page_ids.push(file.append_empty_page()?);
    }
    Ok((db, dir, page_ids))
}

#[test]
fn test_sole_reader_upgrades_while_writer_waits() -> Result<()> {
    let (db, _dir, pages) = setup_pages(1)?;
    let p = pages[0];

    let mut t1 = db.begin()?;
    let mut t2 = db.begin()?;
    let t2_id = t2.id();
    t1.get_page(p, Permissions::ReadOnly)?;

    let (granted_tx, granted_rx) = channel::bounded(1);
    thread::scope(|s| -> Result<()> {
        let writer = s.spawn(move || -> Result<()> {
            t2.get_page(p, Permissions::ReadWrite)?;
            granted_tx.send(())?;
            t2.commit()?;
            Ok(())
        });

        wait_until_blocked(&db, t2_id)?;

        // Sole holder upgrades without waiting
        t1.get_page(p, Permissions::ReadWrite)?;
        assert!(!db.lock_manager().is_waiting(t1.id()));
        assert_eq!(db.lock_manager().page_lock(p).map(|l| l.mode), Some(LockMode::Exclusive));
        assert!(granted_rx.recv_timeout(Duration::from_millis(100)).is_err());

        t1.commit()?;
        granted_rx.recv_timeout(WAIT_LIMIT)?;
        match writer.join() {
            Ok(result) => result,
            Err(_) => bail!("writer thread panicked"),
        }
    })?;

    assert!(db.lock_manager().page_lock(p).is_none());
    Ok(())
}

#[test]
fn test_crossed_requests_abort_exactly_one() -> Result<()> {
    let (db, _dir, pages) = setup_pages(2)?;
    let (p, q) = (pages[0], pages[1]);
    let both_locked = Barrier::new(2);
    let (done_tx, done_rx) = channel::unbounded();

    thread::scope(|s| -> Result<()> {
        let mut handles = Vec::new();
        for (first, second) in [(p, q), (q, p)] {
            let (db, both_locked, done_tx) = (&db, &both_locked, done_tx.clone());
            handles.push(s.spawn(move || -> Result<()> {
                let mut txn = db.begin()?;
                txn.get_page(first, Permissions::ReadWrite)?;
                both_locked.wait();

                match txn.get_page(second, Permissions::ReadWrite) {
                    Ok(_) => {
                        txn.commit()?;
                        done_tx.send(None)?;
                    }
                    Err(e) => {
                        let reason = abort_reason(&e);
                        txn.abort()?;
                        done_tx.send(reason)?;
                    }
                }
                Ok(())
            }));
        }
        join_all(handles)
    })?;
    drop(done_tx);

    let outcomes: Vec<Option<AbortReason>> = done_rx.iter().collect();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(
        outcomes.iter().filter(|o| **o == Some(AbortReason::DeadlockCycle)).count(),
        1
    );
    assert_eq!(outcomes.iter().filter(|o| o.is_none()).count(), 1);
    Ok(())
}

#[test]
fn test_reader_behind_pending_writer_is_refused() -> Result<()> {
    let (db, _dir, pages) = setup_pages(1)?;
    let p = pages[0];

    let mut t1 = db.begin()?;
    let t2 = db.begin()?;
    let mut t3 = db.begin()?;
    let t2_id = t2.id();
    t1.get_page(p, Permissions::ReadWrite)?;

    thread::scope(|s| -> Result<()> {
        let writer = s.spawn(move || {
            let mut t2 = t2;
            let result = t2.get_page(p, Permissions::ReadWrite).map(|_| ());
            let _ = t2.abort();
            result
        });

        wait_until_blocked(&db, t2_id)?;
        let err = t3.get_page(p, Permissions::ReadOnly).unwrap_err();
        assert!(err.is_abort());
        assert_eq!(abort_reason(&err), Some(AbortReason::PendingWriter));
        t3.abort()?;

        t1.commit()?;
        match writer.join() {
            Ok(result) => Ok(result?),
            Err(_) => bail!("writer thread panicked"),
        }
    })?;
    Ok(())
}

#[test]
fn test_concurrent_inserts_are_all_visible() -> Result<()> {
    const THREADS: i32 = 4;
    const PER_THREAD: i32 = 10;

    let (db, _dir) = create_test_db(SMALL_PAGE_SIZE, 32)?;
    let table_id = create_int_table(&db, "t", 2)?;

    thread::scope(|s| -> Result<()> {
        let mut handles = Vec::new();
        for _ in 0..THREADS {
            let db = &db;
            handles.push(s.spawn(move || -> Result<()> {
                loop {
                    let mut txn = db.begin()?;
                    match insert_sequence(&txn, table_id, PER_THREAD) {
                        Ok(_) => return Ok(txn.commit()?),
                        Err(e) => {
                            let retry = e
                                .downcast_ref::<TransactionError>()
                                .is_some_and(|err| err.is_abort());
                            if !retry {
                                return Err(e);
                            }
                            txn.abort()?;
                        }
                    }
                }
            }));
        }
        join_all(handles)
    })?;

    let reader = db.begin()?;
    let rows = scan_all(&reader, table_id)?;
    assert_eq!(rows.len(), (THREADS * PER_THREAD) as usize);
    Ok(())
}
