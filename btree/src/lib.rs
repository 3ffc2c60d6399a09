//! The B+ tree itself, built on top of the `buffer-pool` page store: a
//! slotted page layout, leaf/index node views over it, the tree file that
//! ties them together with split/merge logic, and a range-scan cursor.

pub mod index;
pub mod leaf;
pub mod page;
pub mod scan;
pub mod tree;

pub use leaf::LEAF_ENTRY_SIZE;
pub use scan::BTreeScan;
pub use tree::{BTreeFile, TreeStats};
