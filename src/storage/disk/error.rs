use thiserror::Error;

use crate::common::types::{PageId, TableId};
use crate::storage::page::PageError;

#[derive(Error, Debug)]
pub enum HeapFileError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Page {page_id} is beyond the end of the file ({num_pages} pages)")]
    PageOutOfRange { page_id: PageId, num_pages: u32 },
    #[error("Page {page_id} does not belong to table {table_id}")]
    WrongTable { page_id: PageId, table_id: TableId },
    #[error("Page error: {0}")]
    PageError(#[from] PageError),
}
