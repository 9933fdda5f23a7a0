use std::sync::Arc;
use std::vec;

use crate::catalog::Tuple;
use crate::common::types::{PageId, PageNo, Permissions, TransactionId};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::disk::heap_file::HeapFile;

#[derive(Debug)]
enum ScanState {
    NotStarted,
    OnPage {
        page_no: PageNo,
        tuples: vec::IntoIter<Tuple>,
    },
    Exhausted,
}

/// Sequential scan over a heap file.
///
/// Pages are fetched through the buffer pool with a shared lock, one at a time, and
/// their occupied slots are yielded in slot order. The page count is sampled when the
/// scan starts; `rewind` restarts from page 0 and samples it again.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    num_pages: PageNo,
    state: ScanState,
}

impl HeapFileIterator {
    pub fn new(file: Arc<HeapFile>, pool: Arc<BufferPool>, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            num_pages: 0,
            state: ScanState::NotStarted,
        }
    }

    /// Position the scan on page 0. Called implicitly by the first `next_tuple`.
    pub fn open(&mut self) -> Result<(), BufferPoolError> {
        self.num_pages = self.file.num_pages()?;
        self.state = if self.num_pages == 0 {
            ScanState::Exhausted
        } else {
            ScanState::OnPage {
                page_no: 0,
                tuples: self.load_page(0)?,
            }
        };
        Ok(())
    }

    pub fn next_tuple(&mut self) -> Result<Option<Tuple>, BufferPoolError> {
        loop {
            match &mut self.state {
                ScanState::NotStarted => self.open()?,
                ScanState::OnPage { page_no, tuples } => {
                    if let Some(tuple) = tuples.next() {
                        return Ok(Some(tuple));
                    }
                    let next = *page_no + 1;
                    if next >= self.num_pages {
                        self.state = ScanState::Exhausted;
                    } else {
                        let tuples = self.load_page(next)?;
                        self.state = ScanState::OnPage {
                            page_no: next,
                            tuples,
                        };
                    }
                }
                ScanState::Exhausted => return Ok(None),
            }
        }
    }

    /// Restart the scan from the first page
    pub fn rewind(&mut self) {
        self.state = ScanState::NotStarted;
    }

    pub fn close(&mut self) {
        self.state = ScanState::Exhausted;
    }

    fn load_page(&self, page_no: PageNo) -> Result<vec::IntoIter<Tuple>, BufferPoolError> {
        let page_id = PageId::new(self.file.table_id(), page_no);
        let page = self.pool.get_page(self.tid, page_id, Permissions::ReadOnly)?;
        let tuples = page.read().tuples()?;
        Ok(tuples.into_iter())
    }
}

impl Iterator for HeapFileIterator {
    type Item = Result<Tuple, BufferPoolError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_tuple() {
            Ok(tuple) => tuple.map(Ok),
            Err(e) => {
                self.state = ScanState::Exhausted;
                Some(Err(e))
            }
        }
    }
}
