#![allow(dead_code)]

use anyhow::Result;
use tempfile::TempDir;

use pagestore::catalog::{Schema, Tuple};
use pagestore::common::types::TableId;
use pagestore::{Database, StorageConfig, Transaction};

/// Page size small enough that a handful of tuples fill a page.
/// With an (int, int) schema a page holds 7 tuples.
pub const SMALL_PAGE_SIZE: usize = 64;

// Create a database rooted in a fresh temporary directory
pub fn create_test_db(page_size: usize, pool_pages: usize) -> Result<(Database, TempDir)> {
    let dir = TempDir::new()?;
    let config = StorageConfig::in_dir(dir.path())
        .with_page_size(page_size)
        .with_buffer_pool_pages(pool_pages)
        .with_force_sync(false);
    let db = Database::open(config)?;
    Ok((db, dir))
}

// Create a table whose columns are all ints
pub fn create_int_table(db: &Database, name: &str, columns: usize) -> Result<TableId> {
    let spec = vec!["int"; columns].join(",");
    Ok(db.create_table(name, Schema::parse(&spec)?)?)
}

// Insert one tuple per row and return them with their record ids set
pub fn insert_rows(txn: &Transaction, table_id: TableId, rows: &[&[i32]]) -> Result<Vec<Tuple>> {
    let mut inserted = Vec::with_capacity(rows.len());
    for row in rows {
        let mut tuple = Tuple::from_ints(row);
        txn.insert_tuple(table_id, &mut tuple)?;
        inserted.push(tuple);
    }
    Ok(inserted)
}

// Insert `count` two-column rows (i, i * 10)
pub fn insert_sequence(txn: &Transaction, table_id: TableId, count: i32) -> Result<Vec<Tuple>> {
    let mut inserted = Vec::with_capacity(count as usize);
    for i in 0..count {
        let mut tuple = Tuple::from_ints(&[i, i * 10]);
        txn.insert_tuple(table_id, &mut tuple)?;
        inserted.push(tuple);
    }
    Ok(inserted)
}

// Collect a full scan of a table
pub fn scan_all(txn: &Transaction, table_id: TableId) -> Result<Vec<Tuple>> {
    let mut tuples = Vec::new();
    for tuple in txn.scan(table_id)? {
        tuples.push(tuple?);
    }
    Ok(tuples)
}
