use linked_hash_map::LinkedHashMap;

use crate::common::types::{PageId, PagePtr};

/// Resident pages kept in insertion order with a no-steal victim policy.
///
/// A hit does not refresh a page's position, so the victim is the oldest
/// inserted page that no transaction has dirtied.
pub struct NoStealReplacer {
    pages: LinkedHashMap<PageId, PagePtr>,
}

impl NoStealReplacer {
    pub fn new() -> Self {
        Self {
            pages: LinkedHashMap::new(),
        }
    }

    pub fn get(&self, page_id: &PageId) -> Option<PagePtr> {
        self.pages.get(page_id).cloned()
    }

    pub fn contains(&self, page_id: &PageId) -> bool {
        self.pages.contains_key(page_id)
    }

    /// Insert or replace the resident copy of a page
    pub fn insert(&mut self, page_id: PageId, page: PagePtr) -> Option<PagePtr> {
        self.pages.insert(page_id, page)
    }

    pub fn remove(&mut self, page_id: &PageId) -> Option<PagePtr> {
        self.pages.remove(page_id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Resident page ids, oldest first
    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.keys().copied().collect()
    }

    /// Choose and remove the oldest clean page.
    ///
    /// A page whose latch is held for writing is being mutated and counts as dirty.
    pub fn victim(&mut self) -> Option<PageId> {
        let victim = self
            .pages
            .iter()
            .find(|(_, page)| page.try_read().is_some_and(|guard| guard.is_dirty().is_none()))
            .map(|(page_id, _)| *page_id)?;
        self.pages.remove(&victim);
        Some(victim)
    }
}

impl Default for NoStealReplacer {
    fn default() -> Self {
        Self::new()
    }
}
