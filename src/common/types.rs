use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::storage::page::HeapPage;

/// Default page size in bytes (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages cached by the buffer pool
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Table ID type
pub type TableId = u32;

/// Page number within a table file
pub type PageNo = u32;

/// Slot index within a page
pub type SlotNo = u16;

/// LSN (Log Sequence Number) type
pub type Lsn = u64;

/// Identifies a page by the table it belongs to and its position in that table's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: PageNo,
}

impl PageId {
    pub const fn new(table_id: TableId, page_no: PageNo) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// Durable address of a tuple: its page and slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotNo,
}

impl RecordId {
    pub const fn new(page_id: PageId, slot: SlotNo) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, slot {})", self.page_id, self.slot)
    }
}

/// Opaque identifier of one unit of work. Never reused once the transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Access a transaction requests on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    /// Shared lock
    ReadOnly,
    /// Exclusive lock
    ReadWrite,
}

/// Smart pointer to a resident page. The `RwLock` is a short-lived content latch;
/// transaction-level isolation comes from the lock manager.
pub type PagePtr = Arc<RwLock<HeapPage>>;
