use serde::{Deserialize, Serialize};

use crate::common::types::{Lsn, PageId, TransactionId};

/// Types of log records written by the storage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecordType {
    /// Marks the beginning of a transaction
    Begin,
    /// Full before/after images of a page written on behalf of a transaction
    Update,
    /// Marks the successful completion of a transaction
    Commit,
    /// Marks the abortion/rollback of a transaction
    Abort,
}

/// Content of a page update record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataOperationContent {
    pub page_id: PageId,
    /// Page bytes as of the last commit
    pub before_image: Vec<u8>,
    /// Page bytes about to be written
    pub after_image: Vec<u8>,
}

/// Content of a transaction boundary record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOperationContent {
    /// Seconds since the unix epoch
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecordContent {
    Data(DataOperationContent),
    Transaction(TransactionOperationContent),
}

/// Main log record structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log Sequence Number, strictly increasing across the log
    pub lsn: Lsn,
    /// Transaction that generated this record
    pub txn_id: TransactionId,
    /// LSN of the previous record of the same transaction (0 for the first)
    pub prev_lsn: Lsn,
    pub record_type: LogRecordType,
    pub content: LogRecordContent,
}

impl LogRecord {
    pub fn new(
        lsn: Lsn,
        txn_id: TransactionId,
        prev_lsn: Lsn,
        record_type: LogRecordType,
        content: LogRecordContent,
    ) -> Self {
        Self {
            lsn,
            txn_id,
            prev_lsn,
            record_type,
            content,
        }
    }

    /// Content for BEGIN/COMMIT/ABORT records stamped with the current time
    pub fn transaction_content() -> LogRecordContent {
        LogRecordContent::Transaction(TransactionOperationContent {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
