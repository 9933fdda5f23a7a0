// Transaction management: page locking, transaction lifecycle and write-ahead logging

pub mod concurrency;
pub mod wal;

// Public exports
pub use concurrency::{
    LockError, LockManager, LockMode, Transaction, TransactionError, TransactionManager,
    TransactionState,
};
pub use wal::{LogManager, LogManagerConfig, LogRecord, LogRecordType, TransactionLog};
