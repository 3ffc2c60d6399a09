//! The page store: positioned file I/O, a CLOCK-replacement buffer pool on
//! top of it, and a small catalog page for naming trees across runs.

pub mod catalog;
pub mod disk_manager;
pub mod pool;

use std::io;
use std::rc::Rc;

pub use catalog::{Catalog, CatalogError};
pub use disk_manager::DiskManager;
pub use pool::BufferPool;

/// Opens (or creates) a backing file and wraps it in a buffer pool of the
/// given size, ready for `Catalog::init` and tree operations.
pub fn open(path: impl AsRef<std::path::Path>, pool_size: usize) -> io::Result<BufferPool> {
    let disk_manager = Rc::new(DiskManager::open(path)?);
    Ok(BufferPool::new(pool_size, disk_manager))
}
