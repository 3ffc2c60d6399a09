//! The catalog living on page 0: a small directory mapping tree names to the
//! page id of their root/header page, so a driver can reopen a named tree
//! across runs instead of having to remember a page id itself.
//!
//! This plays the role the source's `get_file_entry` / `add_file_entry` /
//! `delete_file_entry` calls play against its buffer manager's header page,
//! simplified to a flat array of fixed-width entries rather than a general
//! slotted directory, since the catalog never needs to reclaim space for
//! deleted entries in the middle of the page.

use byteorder::{ByteOrder, LittleEndian};

use common::api::{BufferPoolManager, INVALID_PAGE, PAGE_SIZE};
use common::error::BufferPoolError;
use common::PageId;

const NAME_LEN: usize = 32;
const ENTRY_LEN: usize = 2 + NAME_LEN + 4;
const CATALOG_PAGE: PageId = 0;
const COUNT_OFFSET: usize = 0;
const ENTRIES_OFFSET: usize = 4;
const MAX_ENTRIES: usize = (PAGE_SIZE - ENTRIES_OFFSET) / ENTRY_LEN;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("tree name {0:?} is too long (max {NAME_LEN} bytes)")]
    NameTooLong(String),

    #[error("no catalog entry named {0:?}")]
    NotFound(String),

    #[error("a catalog entry named {0:?} already exists")]
    AlreadyExists(String),

    #[error("catalog is full (max {MAX_ENTRIES} entries)")]
    Full,

    #[error(transparent)]
    BufferPool(#[from] BufferPoolError),
}

/// Looks up, adds, and removes `(name, header page id)` entries on the fixed
/// catalog page. Callers allocate page 0 once (via `init`) before first use.
pub struct Catalog<'a> {
    pool: &'a dyn BufferPoolManager,
}

impl<'a> Catalog<'a> {
    pub fn new(pool: &'a dyn BufferPoolManager) -> Self {
        Self { pool }
    }

    /// Ensures page 0 exists and is initialized to an empty directory. Safe to
    /// call on an already-initialized backing file; it only allocates page 0
    /// when the disk manager has not yet handed out any pages.
    pub fn init(&self) -> Result<(), CatalogError> {
        let existing = self.pool.fetch_page(CATALOG_PAGE);
        let (mut guard, freshly_allocated) = match existing {
            Ok(guard) => (guard, false),
            Err(_) => (self.pool.new_page()?, true),
        };
        if guard.page_id() != CATALOG_PAGE {
            // The disk manager's first allocation wasn't page 0; nothing to do
            // but this should not happen in a fresh backing file.
            return Ok(());
        }
        if freshly_allocated {
            LittleEndian::write_u32(&mut guard[COUNT_OFFSET..COUNT_OFFSET + 4], 0);
        }
        Ok(())
    }

    pub fn get_file_entry(&self, name: &str) -> Result<PageId, CatalogError> {
        let guard = self.pool.fetch_page(CATALOG_PAGE)?;
        let count = LittleEndian::read_u32(&guard[COUNT_OFFSET..COUNT_OFFSET + 4]) as usize;
        for i in 0..count {
            let (entry_name, header_pid) = read_entry(&guard, i);
            if entry_name == name {
                return Ok(header_pid);
            }
        }
        Err(CatalogError::NotFound(name.to_string()))
    }

    pub fn add_file_entry(&self, name: &str, header_pid: PageId) -> Result<(), CatalogError> {
        if name.len() > NAME_LEN {
            return Err(CatalogError::NameTooLong(name.to_string()));
        }
        if self.get_file_entry(name).is_ok() {
            return Err(CatalogError::AlreadyExists(name.to_string()));
        }

        let mut guard = self.pool.fetch_page(CATALOG_PAGE)?;
        let count = LittleEndian::read_u32(&guard[COUNT_OFFSET..COUNT_OFFSET + 4]) as usize;
        if count >= MAX_ENTRIES {
            return Err(CatalogError::Full);
        }

        write_entry(&mut guard, count, name, header_pid);
        LittleEndian::write_u32(&mut guard[COUNT_OFFSET..COUNT_OFFSET + 4], (count + 1) as u32);
        Ok(())
    }

    pub fn delete_file_entry(&self, name: &str) -> Result<(), CatalogError> {
        let mut guard = self.pool.fetch_page(CATALOG_PAGE)?;
        let count = LittleEndian::read_u32(&guard[COUNT_OFFSET..COUNT_OFFSET + 4]) as usize;

        let found = (0..count).find(|&i| read_entry(&guard, i).0 == name);
        let index = match found {
            Some(i) => i,
            None => return Err(CatalogError::NotFound(name.to_string())),
        };

        // Shift the tail down by one slot, then shrink the count.
        for i in index..count - 1 {
            let (next_name, next_pid) = read_entry(&guard, i + 1);
            write_entry(&mut guard, i, &next_name, next_pid);
        }
        clear_entry(&mut guard, count - 1);
        LittleEndian::write_u32(&mut guard[COUNT_OFFSET..COUNT_OFFSET + 4], (count - 1) as u32);
        Ok(())
    }
}

fn entry_offset(index: usize) -> usize {
    ENTRIES_OFFSET + index * ENTRY_LEN
}

fn read_entry(data: &[u8], index: usize) -> (String, PageId) {
    let off = entry_offset(index);
    let name_len = LittleEndian::read_u16(&data[off..off + 2]) as usize;
    let name = String::from_utf8_lossy(&data[off + 2..off + 2 + name_len]).into_owned();
    let pid_off = off + 2 + NAME_LEN;
    let header_pid = LittleEndian::read_i32(&data[pid_off..pid_off + 4]);
    (name, header_pid)
}

fn write_entry(data: &mut [u8], index: usize, name: &str, header_pid: PageId) {
    let off = entry_offset(index);
    let bytes = name.as_bytes();
    LittleEndian::write_u16(&mut data[off..off + 2], bytes.len() as u16);
    data[off + 2..off + 2 + bytes.len()].copy_from_slice(bytes);
    for b in &mut data[off + 2 + bytes.len()..off + 2 + NAME_LEN] {
        *b = 0;
    }
    let pid_off = off + 2 + NAME_LEN;
    LittleEndian::write_i32(&mut data[pid_off..pid_off + 4], header_pid);
}

fn clear_entry(data: &mut [u8], index: usize) {
    write_entry(data, index, "", INVALID_PAGE);
}
