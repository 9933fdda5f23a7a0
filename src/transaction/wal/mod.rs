// Write-ahead logging

pub mod log_manager;
pub mod log_record;

pub use log_manager::{LogError, LogManager, LogManagerConfig};
pub use log_record::{LogRecord, LogRecordContent, LogRecordType};

use crate::common::types::{Lsn, PageId, TransactionId};

/// The log the buffer pool writes page images to before overwriting pages on disk.
///
/// Implementations must make every record appended before a `force` durable once
/// `force` returns.
pub trait TransactionLog: Send + Sync {
    fn log_begin(&self, tid: TransactionId) -> Result<Lsn, LogError>;

    /// Record the committed and the new image of a page written by `tid`
    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before_image: &[u8],
        after_image: &[u8],
    ) -> Result<Lsn, LogError>;

    fn log_commit(&self, tid: TransactionId) -> Result<Lsn, LogError>;

    fn log_abort(&self, tid: TransactionId) -> Result<Lsn, LogError>;

    fn force(&self) -> Result<(), LogError>;
}
