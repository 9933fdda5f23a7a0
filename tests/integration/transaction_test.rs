use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use anyhow::Result;

use pagestore::common::types::{PageId, Permissions};
use pagestore::transaction::wal::{LogRecordContent, LogRecordType};
use pagestore::{Database, StorageConfig, TransactionState};

#[path = "../common/mod.rs"]
mod common;
use common::{SMALL_PAGE_SIZE, create_int_table, create_test_db, insert_rows, insert_sequence, scan_all};

#[test]
fn test_commit_writes_page_at_its_offset() -> Result<()> {
    let (db, _dir) = create_test_db(SMALL_PAGE_SIZE, 8)?;
    let table_id = create_int_table(&db, "t", 2)?;
    let file = db.catalog().file(table_id)?;

    // Fill page 0 so the next insert lands on page 1
    let mut txn = db.begin()?;
    insert_sequence(&txn, table_id, 8)?;
    let pid = PageId::new(table_id, 1);
    let in_memory = txn.get_page(pid, Permissions::ReadOnly)?.read().page_data();
    txn.commit()?;
    assert_eq!(txn.state(), TransactionState::Committed);

    let mut raw = vec![0u8; SMALL_PAGE_SIZE];
    let mut handle = File::open(file.path())?;
    handle.seek(SeekFrom::Start(SMALL_PAGE_SIZE as u64))?;
    handle.read_exact(&mut raw)?;
    assert_eq!(raw, in_memory);
    assert_eq!(file.read_page(pid)?.page_data(), in_memory);

    assert!(db.lock_manager().locks_of(txn.id()).is_empty());
    Ok(())
}

#[test]
fn test_abort_restores_committed_contents() -> Result<()> {
    let (db, _dir) = create_test_db(SMALL_PAGE_SIZE, 8)?;
    let table_id = create_int_table(&db, "t", 2)?;
    let file = db.catalog().file(table_id)?;

    let mut setup = db.begin()?;
    let committed = insert_rows(&setup, table_id, &[&[1, 1], &[2, 2]])?;
    setup.commit()?;
    let on_disk = file.read_page(PageId::new(table_id, 0))?.page_data();

    let mut txn = db.begin()?;
    insert_rows(&txn, table_id, &[&[3, 3]])?;
    txn.delete_tuple(&committed[0])?;
    assert_eq!(scan_all(&txn, table_id)?.len(), 2);
    txn.abort()?;
    assert_eq!(txn.state(), TransactionState::Aborted);

    assert_eq!(file.read_page(PageId::new(table_id, 0))?.page_data(), on_disk);
    let reader = db.begin()?;
    assert_eq!(scan_all(&reader, table_id)?, committed);
    Ok(())
}

#[test]
fn test_committed_rows_survive_reopen() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = StorageConfig::in_dir(dir.path())
        .with_page_size(SMALL_PAGE_SIZE)
        .with_force_sync(false);

    let committed = {
        let db = Database::open(config.clone())?;
        let table_id = create_int_table(&db, "t", 2)?;
        let mut txn = db.begin()?;
        let rows = insert_sequence(&txn, table_id, 10)?;
        txn.commit()?;

        // Uncommitted work is lost with the instance
        let loser = db.begin()?;
        insert_sequence(&loser, table_id, 3)?;
        rows
    };

    let db = Database::open(config)?;
    let table_id = create_int_table(&db, "t", 2)?;
    let txn = db.begin()?;
    assert_eq!(scan_all(&txn, table_id)?, committed);
    Ok(())
}

#[test]
fn test_log_holds_before_and_after_images() -> Result<()> {
    let (db, _dir) = create_test_db(SMALL_PAGE_SIZE, 8)?;
    let table_id = create_int_table(&db, "t", 2)?;
    let file = db.catalog().file(table_id)?;
    let pid = PageId::new(table_id, 0);

    let mut first = db.begin()?;
    insert_rows(&first, table_id, &[&[1, 2]])?;
    first.commit()?;
    let after_first = file.read_page(pid)?.page_data();

    let mut second = db.begin()?;
    insert_rows(&second, table_id, &[&[3, 4]])?;
    second.commit()?;
    let after_second = file.read_page(pid)?.page_data();

    let records = db.log_manager().read_all()?;
    let updates: Vec<_> = records
        .iter()
        .filter_map(|r| match &r.content {
            LogRecordContent::Data(data) => Some((r.txn_id, data)),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 2);

    let (tid, data) = updates[0];
    assert_eq!(tid, first.id());
    assert_eq!(data.page_id, pid);
    assert_eq!(data.before_image, vec![0u8; SMALL_PAGE_SIZE]);
    assert_eq!(data.after_image, after_first);

    // The second writer's before-image is the first writer's committed page
    let (tid, data) = updates[1];
    assert_eq!(tid, second.id());
    assert_eq!(data.before_image, after_first);
    assert_eq!(data.after_image, after_second);

    // The update precedes the commit record of its transaction
    let commit_pos = records
        .iter()
        .position(|r| r.txn_id == first.id() && r.record_type == LogRecordType::Commit);
    let update_pos = records
        .iter()
        .position(|r| r.txn_id == first.id() && r.record_type == LogRecordType::Update);
    assert!(update_pos < commit_pos);
    Ok(())
}

#[test]
fn test_finished_transaction_rejects_work() -> Result<()> {
    let (db, _dir) = create_test_db(SMALL_PAGE_SIZE, 8)?;
    let table_id = create_int_table(&db, "t", 2)?;

    let mut txn = db.begin()?;
    txn.commit()?;
    assert!(insert_sequence(&txn, table_id, 1).is_err());
    assert!(txn.commit().is_err());
    assert!(db.transaction_manager().active_transactions().is_empty());
    Ok(())
}
