pub mod error;
pub mod manager;
mod replacer;

pub use error::BufferPoolError;
pub use manager::BufferPool;
