//! A fixed-size slotted, sorted page: a header, a slot directory growing
//! from the low end of the data area, and records packed toward the high
//! end. Records are ordered by the `i32` key at the start of their payload;
//! the slot directory is kept compact (no empty slots) at all times, so a
//! delete closes its gap immediately rather than leaving a tombstone for a
//! later compaction pass.

use byteorder::{ByteOrder, LittleEndian};

use common::api::{INVALID_PAGE, PAGE_SIZE};
use common::error::TreeError;
use common::PageId;

const PID_OFF: usize = 0;
const PREV_OFF: usize = 4;
const NEXT_OFF: usize = 8;
const TYPE_OFF: usize = 12;
const NUM_SLOTS_OFF: usize = 16;
const FILL_PTR_OFF: usize = 20;
const FREE_SPACE_OFF: usize = 24;

/// Size of the fixed page header: `pid, prev, next, type, numSlots, fillPtr,
/// freeSpace`, each a little-endian `i32`.
pub const HEADER_SIZE: usize = 28;

/// Size of one slot directory entry: `{offset: i16, length: i16}`.
const SLOT_SIZE: usize = 4;

/// Usable bytes after the header, shared by the slot directory (growing up
/// from offset 0) and record storage (growing down from the top).
pub const DATA_SIZE: usize = PAGE_SIZE - HEADER_SIZE;

/// Reads the type tag out of a page's bytes without needing a full
/// `SlottedPage` view (which requires `&mut`); used when deciding which
/// view to construct.
pub fn node_type_of(bytes: &[u8]) -> NodeType {
    NodeType::from_tag(LittleEndian::read_i32(&bytes[TYPE_OFF..TYPE_OFF + 4]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Index,
    Leaf,
}

impl NodeType {
    fn to_tag(self) -> i32 {
        match self {
            NodeType::Index => 0,
            NodeType::Leaf => 1,
        }
    }

    fn from_tag(tag: i32) -> Self {
        match tag {
            1 => NodeType::Leaf,
            _ => NodeType::Index,
        }
    }
}

/// A read-only view, for call sites that only need to inspect a page
/// (descending a search, walking the tree for `Print`/`DumpStatistics`,
/// collecting a destroyed node's children) and must not flip the page's
/// dirty bit just by looking at it.
pub struct SlottedPageRef<'a> {
    bytes: &'a [u8],
}

impl<'a> SlottedPageRef<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len(), PAGE_SIZE);
        Self { bytes }
    }

    pub fn pid(&self) -> PageId {
        LittleEndian::read_i32(&self.bytes[PID_OFF..PID_OFF + 4])
    }

    pub fn prev(&self) -> PageId {
        LittleEndian::read_i32(&self.bytes[PREV_OFF..PREV_OFF + 4])
    }

    pub fn next(&self) -> PageId {
        LittleEndian::read_i32(&self.bytes[NEXT_OFF..NEXT_OFF + 4])
    }

    pub fn node_type(&self) -> NodeType {
        node_type_of(self.bytes)
    }

    pub fn num_slots(&self) -> usize {
        LittleEndian::read_i32(&self.bytes[NUM_SLOTS_OFF..NUM_SLOTS_OFF + 4]) as usize
    }

    fn free_space_raw(&self) -> i32 {
        LittleEndian::read_i32(&self.bytes[FREE_SPACE_OFF..FREE_SPACE_OFF + 4])
    }

    pub fn available_space(&self) -> i32 {
        self.free_space_raw() - SLOT_SIZE as i32
    }

    pub fn is_empty(&self) -> bool {
        self.num_slots() == 0
    }

    fn slot(&self, i: usize) -> (usize, usize) {
        let off = HEADER_SIZE + i * SLOT_SIZE;
        let rel_offset = LittleEndian::read_i16(&self.bytes[off..off + 2]) as usize;
        let length = LittleEndian::read_i16(&self.bytes[off + 2..off + 4]) as usize;
        (rel_offset, length)
    }

    pub fn record_at(&self, i: usize) -> &[u8] {
        let (rel_offset, length) = self.slot(i);
        let start = HEADER_SIZE + rel_offset;
        &self.bytes[start..start + length]
    }

    pub fn key_at(&self, i: usize) -> i32 {
        LittleEndian::read_i32(&self.record_at(i)[0..4])
    }
}

/// A view over one page's bytes. Every accessor works in terms of a slot
/// index into the (always-compact) slot directory.
pub struct SlottedPage<'a> {
    bytes: &'a mut [u8],
}

impl<'a> SlottedPage<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len(), PAGE_SIZE);
        Self { bytes }
    }

    pub fn init(&mut self, pid: PageId, node_type: NodeType) {
        self.set_pid(pid);
        self.set_prev(INVALID_PAGE);
        self.set_next(INVALID_PAGE);
        self.set_type(node_type);
        self.set_num_slots(0);
        self.set_fill_ptr(DATA_SIZE as i32);
        self.set_free_space(DATA_SIZE as i32 + SLOT_SIZE as i32);
    }

    pub fn pid(&self) -> PageId {
        LittleEndian::read_i32(&self.bytes[PID_OFF..PID_OFF + 4])
    }

    fn set_pid(&mut self, pid: PageId) {
        LittleEndian::write_i32(&mut self.bytes[PID_OFF..PID_OFF + 4], pid);
    }

    pub fn prev(&self) -> PageId {
        LittleEndian::read_i32(&self.bytes[PREV_OFF..PREV_OFF + 4])
    }

    pub fn set_prev(&mut self, pid: PageId) {
        LittleEndian::write_i32(&mut self.bytes[PREV_OFF..PREV_OFF + 4], pid);
    }

    pub fn next(&self) -> PageId {
        LittleEndian::read_i32(&self.bytes[NEXT_OFF..NEXT_OFF + 4])
    }

    pub fn set_next(&mut self, pid: PageId) {
        LittleEndian::write_i32(&mut self.bytes[NEXT_OFF..NEXT_OFF + 4], pid);
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::from_tag(LittleEndian::read_i32(&self.bytes[TYPE_OFF..TYPE_OFF + 4]))
    }

    fn set_type(&mut self, node_type: NodeType) {
        LittleEndian::write_i32(&mut self.bytes[TYPE_OFF..TYPE_OFF + 4], node_type.to_tag());
    }

    pub fn num_slots(&self) -> usize {
        LittleEndian::read_i32(&self.bytes[NUM_SLOTS_OFF..NUM_SLOTS_OFF + 4]) as usize
    }

    fn set_num_slots(&mut self, n: usize) {
        LittleEndian::write_i32(&mut self.bytes[NUM_SLOTS_OFF..NUM_SLOTS_OFF + 4], n as i32);
    }

    fn fill_ptr(&self) -> i32 {
        LittleEndian::read_i32(&self.bytes[FILL_PTR_OFF..FILL_PTR_OFF + 4])
    }

    fn set_fill_ptr(&mut self, v: i32) {
        LittleEndian::write_i32(&mut self.bytes[FILL_PTR_OFF..FILL_PTR_OFF + 4], v);
    }

    fn free_space_raw(&self) -> i32 {
        LittleEndian::read_i32(&self.bytes[FREE_SPACE_OFF..FREE_SPACE_OFF + 4])
    }

    fn set_free_space(&mut self, v: i32) {
        LittleEndian::write_i32(&mut self.bytes[FREE_SPACE_OFF..FREE_SPACE_OFF + 4], v);
    }

    /// Space available for a new record of any length, after reserving room
    /// for the slot directory entry that record would need.
    pub fn available_space(&self) -> i32 {
        self.free_space_raw() - SLOT_SIZE as i32
    }

    pub fn is_empty(&self) -> bool {
        self.num_slots() == 0
    }

    fn data_offset(&self, rel_offset: usize) -> usize {
        HEADER_SIZE + rel_offset
    }

    fn slot_entry_offset(&self, i: usize) -> usize {
        self.data_offset(i * SLOT_SIZE)
    }

    fn slot(&self, i: usize) -> (usize, usize) {
        let off = self.slot_entry_offset(i);
        let rel_offset = LittleEndian::read_i16(&self.bytes[off..off + 2]) as usize;
        let length = LittleEndian::read_i16(&self.bytes[off + 2..off + 4]) as usize;
        (rel_offset, length)
    }

    fn set_slot(&mut self, i: usize, rel_offset: usize, length: usize) {
        let off = self.slot_entry_offset(i);
        LittleEndian::write_i16(&mut self.bytes[off..off + 2], rel_offset as i16);
        LittleEndian::write_i16(&mut self.bytes[off + 2..off + 4], length as i16);
    }

    fn record_bytes(&self, i: usize) -> &[u8] {
        let (rel_offset, length) = self.slot(i);
        let start = self.data_offset(rel_offset);
        &self.bytes[start..start + length]
    }

    /// Reads the `i32` key stored as the first 4 bytes of slot `i`'s payload.
    pub fn key_at(&self, i: usize) -> i32 {
        LittleEndian::read_i32(&self.record_bytes(i)[0..4])
    }

    pub fn record_at(&self, i: usize) -> &[u8] {
        self.record_bytes(i)
    }

    /// Appends `payload` as a new record, then bubbles its slot leftward by
    /// swapping with its neighbor while its key is smaller, restoring sort
    /// order. Returns the final slot index.
    pub fn insert_sorted(&mut self, payload: &[u8]) -> Result<usize, TreeError> {
        if self.available_space() < payload.len() as i32 {
            return Err(TreeError::NoSpace);
        }

        let n = self.num_slots();
        let fill_ptr = self.fill_ptr() as usize;
        let new_fill_ptr = fill_ptr - payload.len();
        let start = self.data_offset(new_fill_ptr);
        self.bytes[start..start + payload.len()].copy_from_slice(payload);

        self.set_slot(n, new_fill_ptr, payload.len());
        self.set_num_slots(n + 1);
        self.set_fill_ptr(new_fill_ptr as i32);
        self.set_free_space(self.free_space_raw() - payload.len() as i32 - SLOT_SIZE as i32);

        let mut i = n;
        while i > 0 && self.key_at(i) < self.key_at(i - 1) {
            let (a_off, a_len) = self.slot(i);
            let (b_off, b_len) = self.slot(i - 1);
            self.set_slot(i, b_off, b_len);
            self.set_slot(i - 1, a_off, a_len);
            i -= 1;
        }

        Ok(i)
    }

    /// Removes the record at slot `i`, closes the gap it leaves in the data
    /// area, shifts every later-inserted (lower-offset) record's slot entry
    /// to account for the move, and shrinks the slot directory in place.
    pub fn delete_at(&mut self, i: usize) {
        let n = self.num_slots();
        let (offset, length) = self.slot(i);
        let fill_ptr = self.fill_ptr() as usize;

        if fill_ptr < offset {
            let src_start = self.data_offset(fill_ptr);
            let src_end = self.data_offset(offset);
            self.bytes.copy_within(src_start..src_end, src_start + length);

            for j in 0..n {
                if j == i {
                    continue;
                }
                let (j_off, j_len) = self.slot(j);
                if j_off < offset {
                    self.set_slot(j, j_off + length, j_len);
                }
            }
        }

        for j in i..n - 1 {
            let (next_off, next_len) = self.slot(j + 1);
            self.set_slot(j, next_off, next_len);
        }
        self.set_num_slots(n - 1);
        self.set_fill_ptr((fill_ptr + length) as i32);
        self.set_free_space(self.free_space_raw() + length as i32 + SLOT_SIZE as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_entry(key: i32, page_no: i32, slot_no: i32) -> [u8; 12] {
        let mut out = [0u8; 12];
        LittleEndian::write_i32(&mut out[0..4], key);
        LittleEndian::write_i32(&mut out[4..8], page_no);
        LittleEndian::write_i32(&mut out[8..12], slot_no);
        out
    }

    #[test]
    fn insert_keeps_slots_sorted() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut buf);
        page.init(7, NodeType::Leaf);

        page.insert_sorted(&leaf_entry(5, 0, 0)).unwrap();
        page.insert_sorted(&leaf_entry(1, 0, 0)).unwrap();
        page.insert_sorted(&leaf_entry(3, 0, 0)).unwrap();

        assert_eq!(page.num_slots(), 3);
        assert_eq!(page.key_at(0), 1);
        assert_eq!(page.key_at(1), 3);
        assert_eq!(page.key_at(2), 5);
    }

    #[test]
    fn delete_closes_gap_and_keeps_order() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut buf);
        page.init(7, NodeType::Leaf);

        for k in [5, 1, 3, 9, 2] {
            page.insert_sorted(&leaf_entry(k, 0, 0)).unwrap();
        }
        // slots are now 1, 2, 3, 5, 9 -- delete the middle one
        page.delete_at(2);
        assert_eq!(page.num_slots(), 4);
        let keys: Vec<i32> = (0..page.num_slots()).map(|i| page.key_at(i)).collect();
        assert_eq!(keys, vec![1, 2, 5, 9]);
    }

    #[test]
    fn available_space_shrinks_as_records_are_added() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut buf);
        page.init(7, NodeType::Leaf);
        let before = page.available_space();
        page.insert_sorted(&leaf_entry(1, 0, 0)).unwrap();
        let after = page.available_space();
        assert_eq!(before - after, 12 + SLOT_SIZE as i32);
    }
}
