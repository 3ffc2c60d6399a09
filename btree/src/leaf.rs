//! Leaf node view: a sorted page of `(key, rid)` pairs plus sibling links
//! forming the doubly linked leaf chain.

use byteorder::{ByteOrder, LittleEndian};

use common::api::{RecordId, PAGE_SIZE};
use common::PageId;

use crate::page::{node_type_of, NodeType, SlottedPage, SlottedPageRef, DATA_SIZE};

pub const LEAF_ENTRY_SIZE: usize = 12;

pub struct LeafPage<'a> {
    inner: SlottedPage<'a>,
}

impl<'a> LeafPage<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self {
            inner: SlottedPage::new(bytes),
        }
    }

    pub fn init(&mut self, pid: PageId) {
        self.inner.init(pid, NodeType::Leaf);
    }

    pub fn pid(&self) -> PageId {
        self.inner.pid()
    }

    pub fn prev(&self) -> PageId {
        self.inner.prev()
    }

    pub fn set_prev(&mut self, pid: PageId) {
        self.inner.set_prev(pid);
    }

    pub fn next(&self) -> PageId {
        self.inner.next()
    }

    pub fn set_next(&mut self, pid: PageId) {
        self.inner.set_next(pid);
    }

    pub fn num_entries(&self) -> usize {
        self.inner.num_slots()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn available_space(&self) -> i32 {
        self.inner.available_space()
    }

    pub fn is_at_least_half_full(&self) -> bool {
        self.available_space() <= DATA_SIZE as i32 / 2
    }

    fn entry_at(&self, i: usize) -> (i32, RecordId) {
        let bytes = self.inner.record_at(i);
        let key = LittleEndian::read_i32(&bytes[0..4]);
        let rid = RecordId::from_bytes(&bytes[4..12]);
        (key, rid)
    }

    pub fn get_first(&self) -> Option<(i32, RecordId)> {
        if self.inner.num_slots() == 0 {
            return None;
        }
        Some(self.entry_at(0))
    }

    pub fn get_last(&self) -> Option<(i32, RecordId)> {
        let n = self.inner.num_slots();
        if n == 0 {
            return None;
        }
        Some(self.entry_at(n - 1))
    }

    pub fn get_at(&self, i: usize) -> Option<(i32, RecordId)> {
        if i >= self.inner.num_slots() {
            return None;
        }
        Some(self.entry_at(i))
    }

    pub fn insert(&mut self, key: i32, rid: RecordId) -> Result<usize, common::error::TreeError> {
        let mut payload = [0u8; LEAF_ENTRY_SIZE];
        LittleEndian::write_i32(&mut payload[0..4], key);
        payload[4..12].copy_from_slice(&rid.to_bytes());
        self.inner.insert_sorted(&payload)
    }

    /// Deletes the entry matching both `key` and `rid` exactly, since
    /// duplicate keys with distinct record identifiers are allowed.
    pub fn delete(&mut self, key: i32, rid: RecordId) -> bool {
        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (entry_key, entry_rid) = self.entry_at(i);
            if entry_key == key && entry_rid == rid {
                self.inner.delete_at(i);
                return true;
            }
        }
        false
    }
}

pub fn is_leaf(bytes: &[u8]) -> bool {
    debug_assert_eq!(bytes.len(), PAGE_SIZE);
    node_type_of(bytes) == NodeType::Leaf
}

/// Read-only leaf accessors, for descents and diagnostics that never mutate
/// the page and so must not mark it dirty.
pub struct LeafPageRef<'a> {
    inner: SlottedPageRef<'a>,
}

impl<'a> LeafPageRef<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            inner: SlottedPageRef::new(bytes),
        }
    }

    pub fn pid(&self) -> PageId {
        self.inner.pid()
    }

    pub fn prev(&self) -> PageId {
        self.inner.prev()
    }

    pub fn next(&self) -> PageId {
        self.inner.next()
    }

    pub fn num_entries(&self) -> usize {
        self.inner.num_slots()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn available_space(&self) -> i32 {
        self.inner.available_space()
    }

    fn entry_at(&self, i: usize) -> (i32, RecordId) {
        let bytes = self.inner.record_at(i);
        let key = LittleEndian::read_i32(&bytes[0..4]);
        let rid = RecordId::from_bytes(&bytes[4..12]);
        (key, rid)
    }

    pub fn get_at(&self, i: usize) -> Option<(i32, RecordId)> {
        if i >= self.inner.num_slots() {
            return None;
        }
        Some(self.entry_at(i))
    }

    pub fn get_first(&self) -> Option<(i32, RecordId)> {
        self.get_at(0)
    }

    pub fn get_last(&self) -> Option<(i32, RecordId)> {
        let n = self.inner.num_slots();
        if n == 0 {
            return None;
        }
        self.get_at(n - 1)
    }
}
