//! A forward range scan over the leaf chain, bounded by an optional
//! `(lo, hi)` key range. Holds its own copy of the pool reference rather
//! than a borrow of the `BTreeFile` it was opened from, so a scan and a
//! `delete_current` call against the same tree don't fight the borrow
//! checker over one shared reference.

use common::api::{BufferPoolManager, RecordId, INVALID_PAGE};
use common::error::TreeError;
use common::PageId;

use crate::leaf::LeafPageRef;
use crate::tree::BTreeFile;

pub struct BTreeScan<'a> {
    pool: &'a dyn BufferPoolManager,
    lo: Option<i32>,
    hi: Option<i32>,
    cur_pid: Option<PageId>,
    cur_idx: usize,
    last_returned: Option<(i32, RecordId)>,
    done: bool,
}

impl<'a> BTreeFile<'a> {
    /// Opens a scan over `[lo, hi]` (either bound may be omitted). Positions
    /// at the leaf that would hold `lo`, or the leftmost leaf if `lo` is
    /// `None`.
    pub fn open_scan(&self, lo: Option<i32>, hi: Option<i32>) -> Result<BTreeScan<'a>, TreeError> {
        let cur_pid = self.find_leaf_for_scan(lo)?;
        let done = cur_pid.is_none();
        Ok(BTreeScan {
            pool: self.pool(),
            lo,
            hi,
            cur_pid,
            cur_idx: 0,
            last_returned: None,
            done,
        })
    }
}

impl<'a> BTreeScan<'a> {
    /// Returns the next `(key, rid)` pair in range, advancing across leaf
    /// boundaries as needed, or `None` once the chain or the upper bound is
    /// exhausted.
    pub fn get_next(&mut self) -> Result<Option<(i32, RecordId)>, TreeError> {
        if self.done {
            return Ok(None);
        }

        loop {
            let pid = match self.cur_pid {
                Some(p) => p,
                None => {
                    self.done = true;
                    return Ok(None);
                }
            };

            let guard = self.pool.fetch_page(pid)?;
            let leaf = LeafPageRef::new(&guard);

            if self.cur_idx >= leaf.num_entries() {
                let next = leaf.next();
                drop(guard);
                self.cur_pid = if next == INVALID_PAGE { None } else { Some(next) };
                self.cur_idx = 0;
                continue;
            }

            let (key, rid) = leaf.get_at(self.cur_idx).unwrap();
            self.cur_idx += 1;

            if let Some(lo) = self.lo {
                if key < lo {
                    continue;
                }
            }
            if let Some(hi) = self.hi {
                if key > hi {
                    self.done = true;
                    return Ok(None);
                }
            }

            self.last_returned = Some((key, rid));
            return Ok(Some((key, rid)));
        }
    }

    /// Deletes the record most recently returned by `get_next`, against the
    /// tree the scan was opened over. Errors if called before any record has
    /// been returned, or twice in a row without an intervening `get_next`.
    ///
    /// The delete may merge the leaf the scan was parked on into a sibling,
    /// freeing its page, so afterwards the scan re-positions itself at the
    /// leaf that would now hold `key` rather than trusting its old
    /// `cur_pid`/`cur_idx`.
    pub fn delete_current(&mut self, tree: &mut BTreeFile<'a>) -> Result<(), TreeError> {
        let (key, rid) = self
            .last_returned
            .take()
            .ok_or_else(|| TreeError::Invariant("no current record to delete".to_string()))?;
        tree.delete(key, rid)?;

        self.lo = Some(key);
        self.cur_pid = tree.find_leaf_for_scan(self.lo)?;
        self.cur_idx = 0;
        self.done = self.cur_pid.is_none();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::api::RecordId;

    fn open_pool(dir: &std::path::Path) -> buffer_pool::BufferPool {
        buffer_pool::open(dir.join("scan.db"), 16).unwrap()
    }

    #[test]
    fn delete_current_before_any_get_next_is_an_invariant_error() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(dir.path());
        let mut tree = crate::tree::BTreeFile::create(&pool, "t").unwrap();
        tree.insert(1, RecordId::new(0, 0)).unwrap();

        let mut scan = tree.open_scan(None, None).unwrap();
        assert!(scan.delete_current(&mut tree).is_err());
    }

    #[test]
    fn delete_current_removes_exactly_the_last_returned_record() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(dir.path());
        let mut tree = crate::tree::BTreeFile::create(&pool, "t").unwrap();
        for k in 0..5 {
            tree.insert(k, RecordId::new(k, k)).unwrap();
        }

        let mut scan = tree.open_scan(None, None).unwrap();
        scan.get_next().unwrap();
        scan.get_next().unwrap();
        scan.delete_current(&mut tree).unwrap();

        assert!(tree.search(1).is_err());
        assert_eq!(tree.search(0).unwrap(), RecordId::new(0, 0));
        assert_eq!(tree.search(2).unwrap(), RecordId::new(2, 2));
    }
}
