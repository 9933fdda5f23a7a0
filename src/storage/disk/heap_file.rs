use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::catalog::{Schema, Tuple};
use crate::common::types::{PageId, PageNo, PagePtr, Permissions, TableId, TransactionId};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::disk::error::HeapFileError;
use crate::storage::disk::iterator::HeapFileIterator;
use crate::storage::page::{HeapPage, PageError, SlotLayout};

/// A table stored as a flat sequence of fixed-size pages. Page `n` lives at byte
/// offset `n * page_size`; there is no file header.
pub struct HeapFile {
    path: PathBuf,
    table_id: TableId,
    schema: Arc<Schema>,
    page_size: usize,
    file: Mutex<File>,
}

impl HeapFile {
    /// Open (or create) the file backing a table
    pub fn open(
        path: impl AsRef<Path>,
        table_id: TableId,
        schema: Arc<Schema>,
        page_size: usize,
    ) -> Result<Self, HeapFileError> {
        // Reject schemas whose tuples cannot fit in a page up front
        SlotLayout::new(page_size, schema.tuple_width())?;

        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Ok(Self {
            path,
            table_id,
            schema,
            page_size,
            file: Mutex::new(file),
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of whole pages in the file
    pub fn num_pages(&self) -> Result<u32, HeapFileError> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    /// Read a page from disk
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage, HeapFileError> {
        self.check_table(page_id)?;

        let offset = self.page_offset(page_id.page_no);
        let mut buffer = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock();
            let file_size = file.metadata()?.len();
            if offset + self.page_size as u64 > file_size {
                return Err(HeapFileError::PageOutOfRange {
                    page_id,
                    num_pages: (file_size / self.page_size as u64) as u32,
                });
            }

            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buffer)?;
        }

        Ok(HeapPage::from_bytes(
            page_id,
            self.schema.clone(),
            &buffer,
            self.page_size,
        )?)
    }

    /// Write a page to disk in place
    pub fn write_page(&self, page: &HeapPage) -> Result<(), HeapFileError> {
        self.check_table(page.id())?;

        let data = page.page_data();
        let offset = self.page_offset(page.id().page_no);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&data)?;
        file.flush()?;

        debug!("Wrote page {} to {}", page.id(), self.path.display());
        Ok(())
    }

    /// Append one empty page to the end of the file and return its id
    pub fn append_empty_page(&self) -> Result<PageId, HeapFileError> {
        let mut file = self.file.lock();
        let file_size = file.metadata()?.len();
        let page_no = (file_size / self.page_size as u64) as PageNo;

        file.seek(SeekFrom::Start(self.page_offset(page_no)))?;
        file.write_all(&HeapPage::empty_page_data(self.page_size))?;
        file.flush()?;

        let page_id = PageId::new(self.table_id, page_no);
        info!("Table {} grew to {} pages", self.table_id, page_no + 1);
        Ok(page_id)
    }

    /// Insert a tuple into the first page with a free slot, growing the file if every
    /// page is full. Sets the tuple's record id and returns the pages it dirtied.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError> {
        self.schema.validate(tuple).map_err(PageError::from)?;

        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_no);
            let page = pool.get_page(tid, page_id, Permissions::ReadWrite)?;
            if Self::try_insert(&page, tuple)? {
                return Ok(vec![page]);
            }
        }

        loop {
            let page_id = self.append_empty_page()?;
            let page = pool.get_page(tid, page_id, Permissions::ReadWrite)?;
            if Self::try_insert(&page, tuple)? {
                return Ok(vec![page]);
            }
            // Another transaction filled the appended page first
            debug!("Appended page {} was filled concurrently, appending again", page_id);
        }
    }

    /// Clear the tuple's slot on the page named by its record id
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError> {
        let rid = tuple.record_id().ok_or(PageError::MissingRecordId)?;
        self.check_table(rid.page_id)?;

        let num_pages = self.num_pages()?;
        if rid.page_id.page_no >= num_pages {
            return Err(HeapFileError::PageOutOfRange {
                page_id: rid.page_id,
                num_pages,
            }
            .into());
        }

        let page = pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        page.write().delete_tuple(rid)?;
        Ok(vec![page])
    }

    /// Sequential scan over every tuple in the file on behalf of `tid`
    pub fn iterator(self: &Arc<Self>, pool: Arc<BufferPool>, tid: TransactionId) -> HeapFileIterator {
        HeapFileIterator::new(self.clone(), pool, tid)
    }

    fn try_insert(page: &PagePtr, tuple: &mut Tuple) -> Result<bool, PageError> {
        let mut guard = page.write();
        if guard.num_empty_slots() == 0 {
            return Ok(false);
        }
        let rid = guard.insert_tuple(tuple)?;
        tuple.set_record_id(Some(rid));
        Ok(true)
    }

    fn check_table(&self, page_id: PageId) -> Result<(), HeapFileError> {
        if page_id.table_id != self.table_id {
            return Err(HeapFileError::WrongTable {
                page_id,
                table_id: self.table_id,
            });
        }
        Ok(())
    }

    fn page_offset(&self, page_no: PageNo) -> u64 {
        page_no as u64 * self.page_size as u64
    }
}
