use std::sync::Arc;

use crate::catalog::{Schema, Tuple};
use crate::common::types::{PageId, RecordId, SlotNo, TransactionId};
use crate::storage::page::error::PageError;
use crate::storage::page::layout::{self, SlotLayout};

/// In-memory image of one slotted heap page.
///
/// The slot array is kept as raw bytes; deleting a tuple only clears its bit in the
/// occupancy bitmap and leaves the slot bytes untouched.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    layout: SlotLayout,
    header: Vec<u8>,
    slots: Vec<u8>,
    dirty: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Parse a page from exactly `page_size` bytes read from disk.
    /// The bytes become the page's before-image.
    pub fn from_bytes(
        page_id: PageId,
        schema: Arc<Schema>,
        data: &[u8],
        page_size: usize,
    ) -> Result<Self, PageError> {
        if data.len() != page_size {
            return Err(PageError::SizeMismatch {
                expected: page_size,
                actual: data.len(),
            });
        }

        let layout = SlotLayout::new(page_size, schema.tuple_width())?;
        let header = data[..layout.header_len].to_vec();
        let slots = data[layout.header_len..layout.header_len + layout.slots_len()].to_vec();

        Ok(Self {
            page_id,
            schema,
            layout,
            header,
            slots,
            dirty: None,
            before_image: data.to_vec(),
        })
    }

    /// A page with every slot free
    pub fn empty(page_id: PageId, schema: Arc<Schema>, page_size: usize) -> Result<Self, PageError> {
        Self::from_bytes(page_id, schema, &Self::empty_page_data(page_size), page_size)
    }

    /// On-disk bytes of an empty page. An all-zero page has an empty bitmap.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0; page_size]
    }

    pub fn id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Serialize the page to its on-disk form
    pub fn page_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.layout.page_size);
        data.extend_from_slice(&self.header);
        data.extend_from_slice(&self.slots);
        data.resize(self.layout.page_size, 0);
        data
    }

    /// Page bytes as of the last commit that touched this page
    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    /// Snapshot the current contents as the before-image for the next writer
    pub fn set_before_image(&mut self) {
        self.before_image = self.page_data();
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirty = tid;
    }

    /// The transaction that last dirtied this page, if any
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    pub fn num_slots(&self) -> usize {
        self.layout.num_slots
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.layout.num_slots)
            .filter(|&slot| !layout::bit_is_set(&self.header, slot))
            .count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.layout.num_slots && layout::bit_is_set(&self.header, slot)
    }

    /// Store a tuple in the lowest free slot and return its new address
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<RecordId, PageError> {
        self.schema.validate(tuple)?;

        let slot = (0..self.layout.num_slots)
            .find(|&slot| !layout::bit_is_set(&self.header, slot))
            .ok_or(PageError::PageFull(self.page_id))?;

        let range = self.layout.slot_range(slot);
        self.schema.encode(tuple, &mut self.slots[range])?;
        layout::set_bit(&mut self.header, slot, true);

        Ok(RecordId::new(self.page_id, slot as SlotNo))
    }

    /// Clear the occupancy bit of the tuple's slot
    pub fn delete_tuple(&mut self, rid: RecordId) -> Result<(), PageError> {
        if rid.page_id != self.page_id {
            return Err(PageError::WrongPage {
                expected: self.page_id,
                actual: rid.page_id,
                slot: rid.slot,
            });
        }

        let slot = self.check_slot(rid.slot)?;
        if !layout::bit_is_set(&self.header, slot) {
            return Err(PageError::SlotEmpty {
                page_id: self.page_id,
                slot: rid.slot,
            });
        }

        layout::set_bit(&mut self.header, slot, false);
        Ok(())
    }

    /// The tuple stored in a slot, or `None` if the slot is free
    pub fn tuple(&self, slot: SlotNo) -> Result<Option<Tuple>, PageError> {
        let index = self.check_slot(slot)?;
        if !layout::bit_is_set(&self.header, index) {
            return Ok(None);
        }
        self.decode_slot(index).map(Some)
    }

    /// All occupied tuples in slot order
    pub fn tuples(&self) -> Result<Vec<Tuple>, PageError> {
        (0..self.layout.num_slots)
            .filter(|&slot| layout::bit_is_set(&self.header, slot))
            .map(|slot| self.decode_slot(slot))
            .collect()
    }

    fn decode_slot(&self, slot: usize) -> Result<Tuple, PageError> {
        let tuple = self.schema.decode(&self.slots[self.layout.slot_range(slot)])?;
        Ok(tuple.with_record_id(RecordId::new(self.page_id, slot as SlotNo)))
    }

    fn check_slot(&self, slot: SlotNo) -> Result<usize, PageError> {
        let index = slot as usize;
        if index >= self.layout.num_slots {
            return Err(PageError::SlotOutOfRange {
                page_id: self.page_id,
                slot,
                num_slots: self.layout.num_slots,
            });
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;

    const PAGE_SIZE: usize = 64;

    fn int_page() -> HeapPage {
        let schema = Arc::new(Schema::parse("int,int").unwrap());
        HeapPage::empty(PageId::new(1, 0), schema, PAGE_SIZE).unwrap()
    }

    #[test]
    fn test_empty_page() {
        let page = int_page();
        // 512 bits / 65 bits per slot
        assert_eq!(page.num_slots(), 7);
        assert_eq!(page.num_empty_slots(), 7);
        assert!(page.tuples().unwrap().is_empty());
        assert_eq!(page.page_data(), vec![0u8; PAGE_SIZE]);
        assert_eq!(page.is_dirty(), None);
    }

    #[test]
    fn test_insert_fills_lowest_slot() {
        let mut page = int_page();
        let a = page.insert_tuple(&Tuple::from_ints(&[1, 10])).unwrap();
        let b = page.insert_tuple(&Tuple::from_ints(&[2, 20])).unwrap();
        assert_eq!((a.slot, b.slot), (0, 1));

        page.delete_tuple(a).unwrap();
        let c = page.insert_tuple(&Tuple::from_ints(&[3, 30])).unwrap();
        assert_eq!(c.slot, 0);
        assert_eq!(page.num_empty_slots(), 5);
    }

    #[test]
    fn test_page_full() {
        let mut page = int_page();
        for i in 0..7 {
            page.insert_tuple(&Tuple::from_ints(&[i, i])).unwrap();
        }
        assert!(matches!(
            page.insert_tuple(&Tuple::from_ints(&[8, 8])),
            Err(PageError::PageFull(_))
        ));
    }

    #[test]
    fn test_delete_only_clears_bit() {
        let mut page = int_page();
        let rid = page.insert_tuple(&Tuple::from_ints(&[7, 7])).unwrap();
        let before = page.page_data();

        page.delete_tuple(rid).unwrap();
        let after = page.page_data();

        assert_eq!(after[0], 0);
        // Slot bytes survive the delete
        assert_eq!(before[1..], after[1..]);
        assert_eq!(page.tuple(rid.slot).unwrap(), None);

        assert!(matches!(page.delete_tuple(rid), Err(PageError::SlotEmpty { .. })));
        assert!(matches!(
            page.delete_tuple(RecordId::new(rid.page_id, 100)),
            Err(PageError::SlotOutOfRange { .. })
        ));
        assert!(matches!(
            page.delete_tuple(RecordId::new(PageId::new(1, 5), 0)),
            Err(PageError::WrongPage { .. })
        ));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut page = int_page();
        page.insert_tuple(&Tuple::from_ints(&[1, 2])).unwrap();
        page.insert_tuple(&Tuple::from_ints(&[3, 4])).unwrap();

        let data = page.page_data();
        let reloaded = HeapPage::from_bytes(page.id(), page.schema().clone(), &data, PAGE_SIZE).unwrap();

        let values: Vec<_> = reloaded.tuples().unwrap().into_iter().map(|t| t.values().to_vec()).collect();
        assert_eq!(values, vec![Tuple::from_ints(&[1, 2]).values().to_vec(), Tuple::from_ints(&[3, 4]).values().to_vec()]);
        assert_eq!(reloaded.before_image(), &data[..]);
    }

    #[test]
    fn test_before_image_tracks_commits() {
        let mut page = int_page();
        let original = page.before_image().to_vec();

        page.insert_tuple(&Tuple::from_ints(&[5, 5])).unwrap();
        assert_eq!(page.before_image(), &original[..]);

        page.set_before_image();
        assert_eq!(page.before_image(), &page.page_data()[..]);
    }

    #[test]
    fn test_unaddressable_slots_rejected() {
        // A 1MB page would hold 254200 int slots, more than a record id can address
        let schema = Arc::new(Schema::parse("int").unwrap());
        assert!(matches!(
            HeapPage::empty(PageId::new(1, 0), schema, 1 << 20),
            Err(PageError::TooManySlots { num_slots: 254200, .. })
        ));

        let huge = Arc::new(Schema::from_types(&[FieldType::Text(usize::MAX)]));
        assert!(matches!(
            HeapPage::empty(PageId::new(1, 0), huge, PAGE_SIZE),
            Err(PageError::TupleTooWide { .. })
        ));
    }

    #[test]
    fn test_size_mismatch() {
        let schema = Arc::new(Schema::parse("int").unwrap());
        assert!(matches!(
            HeapPage::from_bytes(PageId::new(1, 0), schema, &[0u8; 10], PAGE_SIZE),
            Err(PageError::SizeMismatch { expected: 64, actual: 10 })
        ));
    }
}
