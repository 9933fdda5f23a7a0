use crate::common::types::SlotNo;
use crate::storage::page::error::PageError;

/// Largest slot count a page may have
pub const MAX_SLOTS: usize = SlotNo::MAX as usize + 1;

/// Slot arithmetic for a heap page.
///
/// A page is an occupancy bitmap (one bit per slot) followed by a fixed-width slot
/// array and zero padding:
///
/// ```text
/// +---------+--------+--------+-----+--------+---------+
/// | bitmap  | slot 0 | slot 1 | ... | slot n | padding |
/// +---------+--------+--------+-----+--------+---------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub page_size: usize,
    pub tuple_width: usize,
    pub num_slots: usize,
    pub header_len: usize,
}

impl SlotLayout {
    pub fn new(page_size: usize, tuple_width: usize) -> Result<Self, PageError> {
        if tuple_width == 0 {
            return Err(PageError::TupleTooWide {
                tuple_width,
                page_size,
            });
        }

        // Each slot costs its tuple bytes plus one bitmap bit
        let slot_bits = tuple_width
            .checked_mul(8)
            .and_then(|bits| bits.checked_add(1))
            .ok_or(PageError::TupleTooWide {
                tuple_width,
                page_size,
            })?;
        let page_bits = page_size
            .checked_mul(8)
            .ok_or(PageError::PageTooLarge { page_size })?;
        let num_slots = page_bits / slot_bits;
        if num_slots == 0 {
            return Err(PageError::TupleTooWide {
                tuple_width,
                page_size,
            });
        }
        // Every slot index must be addressable by a record id
        if num_slots > MAX_SLOTS {
            return Err(PageError::TooManySlots {
                num_slots,
                max: MAX_SLOTS,
            });
        }
        let header_len = num_slots.div_ceil(8);

        Ok(Self {
            page_size,
            tuple_width,
            num_slots,
            header_len,
        })
    }

    /// Byte range of a slot within the slot array
    pub fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = slot * self.tuple_width;
        start..start + self.tuple_width
    }

    /// Bytes of the slot array
    pub fn slots_len(&self) -> usize {
        self.num_slots * self.tuple_width
    }
}

/// Read bit `slot` of an occupancy bitmap (LSB first within each byte)
pub fn bit_is_set(bitmap: &[u8], slot: usize) -> bool {
    bitmap[slot / 8] & (1 << (slot % 8)) != 0
}

pub fn set_bit(bitmap: &mut [u8], slot: usize, value: bool) {
    let mask = 1u8 << (slot % 8);
    if value {
        bitmap[slot / 8] |= mask;
    } else {
        bitmap[slot / 8] &= !mask;
    }
}
