// Locking and transaction lifecycle

pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;
pub mod wait_for;

// Public exports
pub use lock_manager::{AbortReason, LockError, LockManager, LockMode, PageLock};
pub use transaction::{Transaction, TransactionError, TransactionState};
pub use transaction_manager::TransactionManager;
pub use wait_for::WaitForGraph;
