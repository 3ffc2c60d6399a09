//! Raw fixed-size page I/O against a backing file.

use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use common::api::PAGE_SIZE;
use common::PageId;

/// Reads and writes whole pages to a single backing file by positioned I/O.
/// Single-threaded: allocation bookkeeping is a plain `Cell`, not a `Mutex`.
#[derive(Debug)]
pub struct DiskManager {
    db_file: File,
    next_page_id: Cell<PageId>,
}

impl DiskManager {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let len = file.metadata()?.len();
        let next_page_id = (len / PAGE_SIZE as u64) as PageId;

        Ok(Self {
            db_file: file,
            next_page_id: Cell::new(next_page_id),
        })
    }

    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.db_file.read_exact_at(data, offset)
    }

    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> io::Result<()> {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.db_file.write_all_at(data, offset)
    }

    /// Hands out the next unused page id. Freed ids are not reused within a
    /// session (no free-page-id recycling), matching the source's simple
    /// monotonic allocator.
    pub fn allocate_page(&self) -> PageId {
        let id = self.next_page_id.get();
        self.next_page_id.set(id + 1);
        id
    }

    /// The number of pages currently known to exist, including page 0 (the
    /// catalog) if it has been allocated.
    pub fn page_count(&self) -> PageId {
        self.next_page_id.get()
    }
}
