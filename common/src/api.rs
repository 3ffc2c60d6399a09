
//! Defines the common API for all buffer pool manager implementations.
use std::ops::{Deref, DerefMut};

use crate::PageId;
use crate::error::BufferPoolError;

/// A reserved page id meaning "no page" (empty tree root, end of sibling chain, ...).
/// Persisted as a signed 32-bit little-endian `-1`.
pub const INVALID_PAGE: PageId = -1;

/// The size of a single page in bytes. Fixed at compile time: every page on a given
/// backing file must agree on one size, and the slot directory's `i16` offsets are
/// sized against this constant.
pub const PAGE_SIZE: usize = 4096;

/// `(pageNo, slotNo)` identifying a record in a (separate) heap file. The B+ tree
/// never interprets this value; it is opaque payload carried alongside each key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub page_no: i32,
    pub slot_no: i32,
}

impl RecordId {
    pub const fn new(page_no: i32, slot_no: i32) -> Self {
        Self { page_no, slot_no }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0..4].copy_from_slice(&self.page_no.to_le_bytes());
        out[4..8].copy_from_slice(&self.slot_no.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let page_no = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let slot_no = i32::from_le_bytes(bytes[4..8].try_into().unwrap());
        Self { page_no, slot_no }
    }
}

/// A smart pointer representing a pinned page.
///
/// This guard provides mutable access to the page's byte data. When the guard
/// is dropped, it automatically informs the buffer pool manager to unpin the page,
/// allowing it to be considered for eviction. Taking `&mut` through `DerefMut`
/// marks the page dirty eagerly, matching the pool's "write intent implies dirty"
/// policy.
pub trait PageGuard: Deref<Target = [u8]> + DerefMut {
    /// Returns the ID of the page being held.
    fn page_id(&self) -> PageId;
}

/// The main trait defining the behavior of a Buffer Pool Manager.
///
/// This trait is designed to be object-safe, so it can be used with
/// trait objects (`Box<dyn BufferPoolManager>`), and the tree file is
/// parameterized over it rather than reaching for a global singleton.
pub trait BufferPoolManager {
    /// Fetches a page from the buffer pool, reading from disk if necessary.
    ///
    /// This method pins the page and returns a `PageGuard`. The page remains
    /// pinned until the `PageGuard` is dropped.
    fn fetch_page(&self, page_id: PageId) -> Result<Box<dyn PageGuard + '_>, BufferPoolError>;

    /// Allocates a fresh page, already pinned, with zeroed contents.
    fn new_page(&self) -> Result<Box<dyn PageGuard + '_>, BufferPoolError>;

    /// Unpins a page. `is_dirty` is OR'd into the frame's dirty flag; it does not
    /// clear a dirty flag set by an earlier `DerefMut` or a previous unpin.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError>;

    /// Releases an allocation. The page must be unpinned; it is an error to free
    /// a page someone still holds pinned.
    fn free_page(&self, page_id: PageId) -> Result<(), BufferPoolError>;

    /// Flushes a specific page to disk if it is resident and dirty.
    fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError>;

    /// Flushes every resident dirty page to disk.
    fn flush_all_pages(&self) -> Result<(), BufferPoolError>;
}
