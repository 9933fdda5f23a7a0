use thiserror::Error;

use crate::catalog::SchemaError;
use crate::common::types::{PageId, SlotNo};

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Page {0} has no free slot")]
    PageFull(PageId),
    #[error("Slot {slot} out of range on page {page_id} ({num_slots} slots)")]
    SlotOutOfRange {
        page_id: PageId,
        slot: SlotNo,
        num_slots: usize,
    },
    #[error("Slot {slot} on page {page_id} is already empty")]
    SlotEmpty { page_id: PageId, slot: SlotNo },
    #[error("Expected {expected} bytes of page data, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Tuples of {tuple_width} bytes do not fit in a {page_size} byte page")]
    TupleTooWide { tuple_width: usize, page_size: usize },
    #[error("Page of {page_size} bytes is too large")]
    PageTooLarge { page_size: usize },
    #[error("Page layout needs {num_slots} slots, at most {max} are addressable")]
    TooManySlots { num_slots: usize, max: usize },
    #[error("Tuple has no record id")]
    MissingRecordId,
    #[error("Record {slot} belongs to page {actual}, not {expected}")]
    WrongPage {
        expected: PageId,
        actual: PageId,
        slot: SlotNo,
    },
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}
