//! Index (internal) node view: a sorted page of `(key, childPid)` entries
//! plus a `leftLink` (the page's `prev` field) for keys below the first
//! entry's key.

use byteorder::{ByteOrder, LittleEndian};

use common::api::PAGE_SIZE;
use common::PageId;

use crate::page::{node_type_of, NodeType, SlottedPage, SlottedPageRef, DATA_SIZE};

pub const INDEX_ENTRY_SIZE: usize = 8;

pub struct IndexPage<'a> {
    inner: SlottedPage<'a>,
}

impl<'a> IndexPage<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self {
            inner: SlottedPage::new(bytes),
        }
    }

    pub fn init(&mut self, pid: PageId) {
        self.inner.init(pid, NodeType::Index);
    }

    pub fn pid(&self) -> PageId {
        self.inner.pid()
    }

    pub fn left_link(&self) -> PageId {
        self.inner.prev()
    }

    pub fn set_left_link(&mut self, pid: PageId) {
        self.inner.set_prev(pid);
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

    fn entry_at(&self, i: usize) -> (i32, PageId) {
        let bytes = self.inner.record_at(i);
        let key = LittleEndian::read_i32(&bytes[0..4]);
        let child = LittleEndian::read_i32(&bytes[4..8]);
        (key, child)
    }

    pub fn get_first(&self) -> Option<(i32, PageId)> {
        if self.inner.num_slots() == 0 {
            return None;
        }
        Some(self.entry_at(0))
    }

    pub fn get_last(&self) -> Option<(i32, PageId)> {
        let n = self.inner.num_slots();
        if n == 0 {
            return None;
        }
        Some(self.entry_at(n - 1))
    }

    pub fn get_at(&self, i: usize) -> Option<(i32, PageId)> {
        if i >= self.inner.num_slots() {
            return None;
        }
        Some(self.entry_at(i))
    }

    pub fn insert(&mut self, key: i32, child: PageId) -> Result<usize, common::error::TreeError> {
        let mut payload = [0u8; INDEX_ENTRY_SIZE];
        LittleEndian::write_i32(&mut payload[0..4], key);
        LittleEndian::write_i32(&mut payload[4..8], child);
        self.inner.insert_sorted(&payload)
    }

    /// Deletes the first entry (scanning high to low) whose key equals
    /// `key`.
    pub fn delete(&mut self, key: i32) -> bool {
        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (entry_key, _) = self.entry_at(i);
            if entry_key == key {
                self.inner.delete_at(i);
                return true;
            }
        }
        false
    }

    fn delete_at(&mut self, i: usize) {
        self.inner.delete_at(i);
    }

    /// The child to descend into when searching for `search_key`: the
    /// rightmost entry with `entry.key <= search_key`, or `leftLink` if
    /// every entry's key exceeds it.
    pub fn get_page_id(&self, search_key: i32) -> PageId {
        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (key, child) = self.entry_at(i);
            if key <= search_key {
                return child;
            }
        }
        self.left_link()
    }

    /// Same contract as `get_page_id`, additionally reporting whether the
    /// chosen child is the `leftLink` (the leftmost child).
    pub fn find_page(&self, search_key: i32) -> (PageId, bool) {
        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (key, child) = self.entry_at(i);
            if key <= search_key {
                return (child, false);
            }
        }
        (self.left_link(), true)
    }

    /// An immediate sibling of `child_pid`: the left sibling, unless
    /// `child_pid` is the leftmost child (the `leftLink`), in which case the
    /// right sibling (the first entry's child).
    pub fn find_sibling_for_child(&self, child_pid: PageId) -> Option<(PageId, bool)> {
        if self.left_link() == child_pid {
            let (_, first_child) = self.get_first()?;
            return Some((first_child, true));
        }

        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (_, entry_child) = self.entry_at(i);
            if entry_child == child_pid {
                if i == 0 {
                    return Some((self.left_link(), false));
                }
                let (_, prev_child) = self.entry_at(i - 1);
                return Some((prev_child, false));
            }
        }
        None
    }

    /// The key for the separator entry routing to `child_pid`; `true` if
    /// `child_pid` is the `leftLink` (no separator entry of its own).
    pub fn find_key_with_page(&self, child_pid: PageId) -> Option<(i32, bool)> {
        if self.left_link() == child_pid {
            return Some((0, true));
        }
        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (key, entry_child) = self.entry_at(i);
            if entry_child == child_pid {
                return Some((key, false));
            }
        }
        None
    }

    /// The rightmost entry key `<= key`, used to locate the separator that
    /// currently routes to a given subtree.
    pub fn find_key(&self, key: i32) -> Option<i32> {
        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (entry_key, _) = self.entry_at(i);
            if entry_key <= key {
                return Some(entry_key);
            }
        }
        None
    }

    /// Rewrites the separator entry whose key equals `old_key` to `new_key`,
    /// preserving its child pointer.
    pub fn adjust_key(&mut self, new_key: i32, old_key: i32) -> bool {
        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (entry_key, child) = self.entry_at(i);
            if entry_key == old_key {
                self.delete_at(i);
                self.insert(new_key, child).expect("adjust_key shrinks or keeps payload size");
                return true;
            }
        }
        false
    }

    /// Removes the routing entry for a child that has been merged away. If
    /// `child_pid` was the `leftLink`, the next entry's child is promoted to
    /// `leftLink` and that entry is dropped; otherwise the entry routing to
    /// `child_pid` is removed outright, since the surviving sibling's own
    /// separator already covers the combined range up to the next entry.
    pub fn delete_page(&mut self, child_pid: PageId, right_sibling: bool) -> bool {
        if self.left_link() == child_pid {
            if let Some((first_key, first_child)) = self.get_first() {
                self.delete(first_key);
                self.set_left_link(first_child);
                return true;
            }
            return false;
        }

        let n = self.inner.num_slots();
        let (mut cur_key, mut cur_child) = match self.get_first() {
            Some(e) => e,
            None => return false,
        };

        if cur_child == child_pid && right_sibling {
            self.delete(cur_key);
            return true;
        }

        let mut idx = 0;
        while cur_child != child_pid {
            idx += 1;
            if idx >= n {
                return false;
            }
            let (k, c) = self.entry_at(idx);
            cur_key = k;
            cur_child = c;
        }

        let target_key = cur_key;
        self.delete(target_key);
        true
    }
}

pub fn is_index(bytes: &[u8]) -> bool {
    debug_assert_eq!(bytes.len(), PAGE_SIZE);
    node_type_of(bytes) == NodeType::Index
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: PageId = 10;
    const B: PageId = 11;
    const C: PageId = 12;
    const D: PageId = 13;

    fn three_child_parent(buf: &mut [u8; PAGE_SIZE]) -> IndexPage<'_> {
        let mut page = IndexPage::new(buf);
        page.init(1);
        page.set_left_link(A);
        page.insert(0, B).unwrap();
        page.insert(1, C).unwrap();
        page.insert(2, D).unwrap();
        page
    }

    #[test]
    fn delete_page_for_a_middle_child_only_removes_its_own_entry() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = three_child_parent(&mut buf);

        // C underflows and merges into its left sibling B; the parent drops
        // C's routing entry and leaves D's separator untouched.
        assert!(page.delete_page(C, false));

        assert_eq!(page.num_entries(), 2);
        assert_eq!(page.get_at(0), Some((0, B)));
        assert_eq!(page.get_at(1), Some((2, D)));
        // Keys in [1, 2), now covered by B after the merge, still route there.
        assert_eq!(page.get_page_id(1), B);
        assert_eq!(page.get_page_id(2), D);
    }

    #[test]
    fn delete_page_for_the_left_link_promotes_the_next_child() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = three_child_parent(&mut buf);

        // A (the leftLink) merges into its right sibling B.
        assert!(page.delete_page(A, true));

        assert_eq!(page.left_link(), B);
        assert_eq!(page.num_entries(), 2);
        assert_eq!(page.get_at(0), Some((1, C)));
        assert_eq!(page.get_at(1), Some((2, D)));
    }

    #[test]
    fn delete_page_for_the_rightmost_child_drops_its_entry() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = three_child_parent(&mut buf);

        // D merges into its left sibling C.
        assert!(page.delete_page(D, false));

        assert_eq!(page.num_entries(), 2);
        assert_eq!(page.get_at(0), Some((0, B)));
        assert_eq!(page.get_at(1), Some((1, C)));
    }
}

/// Read-only index accessors, for descents and diagnostics that never mutate
/// the page and so must not mark it dirty.
pub struct IndexPageRef<'a> {
    inner: SlottedPageRef<'a>,
}

impl<'a> IndexPageRef<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            inner: SlottedPageRef::new(bytes),
        }
    }

    pub fn pid(&self) -> PageId {
        self.inner.pid()
    }

    pub fn left_link(&self) -> PageId {
        self.inner.prev()
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

    fn entry_at(&self, i: usize) -> (i32, PageId) {
        let bytes = self.inner.record_at(i);
        let key = LittleEndian::read_i32(&bytes[0..4]);
        let child = LittleEndian::read_i32(&bytes[4..8]);
        (key, child)
    }

    pub fn get_first(&self) -> Option<(i32, PageId)> {
        if self.inner.num_slots() == 0 {
            return None;
        }
        Some(self.entry_at(0))
    }

    pub fn get_last(&self) -> Option<(i32, PageId)> {
        let n = self.inner.num_slots();
        if n == 0 {
            return None;
        }
        Some(self.entry_at(n - 1))
    }

    pub fn get_at(&self, i: usize) -> Option<(i32, PageId)> {
        if i >= self.inner.num_slots() {
            return None;
        }
        Some(self.entry_at(i))
    }

    /// The child to descend into when searching for `search_key`: the
    /// rightmost entry with `entry.key <= search_key`, or `leftLink` if
    /// every entry's key exceeds it.
    pub fn get_page_id(&self, search_key: i32) -> PageId {
        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (key, child) = self.entry_at(i);
            if key <= search_key {
                return child;
            }
        }
        self.left_link()
    }

    /// An immediate sibling of `child_pid`: the left sibling, unless
    /// `child_pid` is the leftmost child (the `leftLink`), in which case the
    /// right sibling (the first entry's child).
    pub fn find_sibling_for_child(&self, child_pid: PageId) -> Option<(PageId, bool)> {
        if self.left_link() == child_pid {
            let (_, first_child) = self.get_first()?;
            return Some((first_child, true));
        }

        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (_, entry_child) = self.entry_at(i);
            if entry_child == child_pid {
                if i == 0 {
                    return Some((self.left_link(), false));
                }
                let (_, prev_child) = self.entry_at(i - 1);
                return Some((prev_child, false));
            }
        }
        None
    }

    /// The key for the separator entry routing to `child_pid`; `true` if
    /// `child_pid` is the `leftLink` (no separator entry of its own).
    pub fn find_key_with_page(&self, child_pid: PageId) -> Option<(i32, bool)> {
        if self.left_link() == child_pid {
            return Some((0, true));
        }
        let n = self.inner.num_slots();
        for i in (0..n).rev() {
            let (key, entry_child) = self.entry_at(i);
            if entry_child == child_pid {
                return Some((key, false));
            }
        }
        None
    }
}
