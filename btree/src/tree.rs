//! The tree file itself: header page bookkeeping, search, insert with split
//! propagation, delete with redistribute/merge/root-collapse, and the
//! diagnostic `print`/`dump_statistics` surface.
//!
//! Insert and delete both descend once, recording the path of index pages
//! visited in a `Vec<PageId>` and walking it back up as splits or merges
//! propagate, rather than recursing the way the page-oriented source does.

use byteorder::{ByteOrder, LittleEndian};

use buffer_pool::Catalog;
use common::api::{BufferPoolManager, PageGuard, RecordId, INVALID_PAGE};
use common::error::TreeError;
use common::PageId;

use crate::index::{IndexPage, IndexPageRef};
use crate::leaf::{LeafPage, LeafPageRef};
use crate::page::{node_type_of, NodeType, DATA_SIZE};

const ROOT_PID_OFFSET: usize = 0;

fn is_sufficient(available: i32) -> bool {
    available <= DATA_SIZE as i32 / 2
}

fn merge_feasible(a_avail: i32, b_avail: i32) -> bool {
    a_avail + b_avail >= DATA_SIZE as i32
}

/// Running counts produced by `BTreeFile::dump_statistics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub height: usize,
    pub leaf_pages: usize,
    pub index_pages: usize,
    pub entries: usize,
}

/// A named B+ tree backed by a buffer pool. The header page (holding the
/// root page id) is fetched once at `create`/`open` time and kept pinned for
/// the tree's whole lifetime, since every operation needs to read or update
/// it.
pub struct BTreeFile<'a> {
    pool: &'a dyn BufferPoolManager,
    name: String,
    header_guard: Box<dyn PageGuard + 'a>,
}

impl<'a> BTreeFile<'a> {
    pub fn create(pool: &'a dyn BufferPoolManager, name: &str) -> Result<Self, TreeError> {
        let catalog = Catalog::new(pool);
        catalog.init().map_err(|e| TreeError::Invariant(e.to_string()))?;
        if catalog.get_file_entry(name).is_ok() {
            return Err(TreeError::Invariant(format!("tree {name:?} already exists")));
        }

        let mut header_guard = pool.new_page()?;
        let header_pid = header_guard.page_id();
        LittleEndian::write_i32(&mut header_guard[ROOT_PID_OFFSET..ROOT_PID_OFFSET + 4], INVALID_PAGE);

        catalog
            .add_file_entry(name, header_pid)
            .map_err(|e| TreeError::Invariant(e.to_string()))?;

        tracing::info!(name, header_pid, "created tree");
        Ok(Self {
            pool,
            name: name.to_string(),
            header_guard,
        })
    }

    pub fn open(pool: &'a dyn BufferPoolManager, name: &str) -> Result<Self, TreeError> {
        let catalog = Catalog::new(pool);
        let header_pid = catalog.get_file_entry(name).map_err(|e| TreeError::Invariant(e.to_string()))?;
        let header_guard = pool.fetch_page(header_pid)?;
        Ok(Self {
            pool,
            name: name.to_string(),
            header_guard,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header_pid(&self) -> PageId {
        self.header_guard.page_id()
    }

    pub fn root_pid(&self) -> PageId {
        LittleEndian::read_i32(&self.header_guard[ROOT_PID_OFFSET..ROOT_PID_OFFSET + 4])
    }

    fn set_root_pid(&mut self, pid: PageId) {
        LittleEndian::write_i32(&mut self.header_guard[ROOT_PID_OFFSET..ROOT_PID_OFFSET + 4], pid);
    }

    pub(crate) fn pool(&self) -> &'a dyn BufferPoolManager {
        self.pool
    }

    pub fn search(&self, key: i32) -> Result<RecordId, TreeError> {
        let root = self.root_pid();
        if root == INVALID_PAGE {
            return Err(TreeError::NotFound);
        }

        let mut cur = root;
        loop {
            let guard = self.pool.fetch_page(cur)?;
            match node_type_of(&guard) {
                NodeType::Leaf => {
                    let leaf = LeafPageRef::new(&guard);
                    for i in 0..leaf.num_entries() {
                        let (k, rid) = leaf.get_at(i).unwrap();
                        if k == key {
                            return Ok(rid);
                        }
                    }
                    return Err(TreeError::NotFound);
                }
                NodeType::Index => {
                    cur = IndexPageRef::new(&guard).get_page_id(key);
                }
            }
        }
    }

    /// Descends from the root to the leaf that would hold `key`, returning
    /// `None` if the tree is empty. When `key` is `None`, always follows
    /// `leftLink`, landing on the leftmost leaf.
    pub(crate) fn find_leaf_for_scan(&self, key: Option<i32>) -> Result<Option<PageId>, TreeError> {
        let root = self.root_pid();
        if root == INVALID_PAGE {
            return Ok(None);
        }

        let mut cur = root;
        loop {
            let guard = self.pool.fetch_page(cur)?;
            match node_type_of(&guard) {
                NodeType::Leaf => return Ok(Some(cur)),
                NodeType::Index => {
                    let index = IndexPageRef::new(&guard);
                    let next = match key {
                        Some(k) => index.get_page_id(k),
                        None => index.left_link(),
                    };
                    drop(guard);
                    cur = next;
                }
            }
        }
    }

    pub fn insert(&mut self, key: i32, rid: RecordId) -> Result<(), TreeError> {
        let root = self.root_pid();

        if root == INVALID_PAGE {
            let mut leaf_guard = self.pool.new_page()?;
            let leaf_pid = leaf_guard.page_id();
            {
                let mut leaf = LeafPage::new(&mut leaf_guard);
                leaf.init(leaf_pid);
                leaf.insert(key, rid)?;
            }
            drop(leaf_guard);
            self.set_root_pid(leaf_pid);
            tracing::debug!(key, leaf_pid, "bootstrapped tree with first leaf");
            return Ok(());
        }

        let mut path: Vec<PageId> = Vec::new();
        let mut cur = root;
        loop {
            let guard = self.pool.fetch_page(cur)?;
            if node_type_of(&guard) == NodeType::Leaf {
                drop(guard);
                break;
            }
            let next = IndexPageRef::new(&guard).get_page_id(key);
            drop(guard);
            path.push(cur);
            cur = next;
        }

        let mut split = self.insert_into_leaf(cur, key, rid)?;
        while let Some((sep_key, new_child_pid)) = split {
            split = match path.pop() {
                Some(parent_pid) => self.insert_into_index(parent_pid, sep_key, new_child_pid)?,
                None => {
                    let mut new_root_guard = self.pool.new_page()?;
                    let new_root_pid = new_root_guard.page_id();
                    {
                        let mut new_root = IndexPage::new(&mut new_root_guard);
                        new_root.init(new_root_pid);
                        new_root.set_left_link(root);
                        new_root.insert(sep_key, new_child_pid)?;
                    }
                    drop(new_root_guard);
                    self.set_root_pid(new_root_pid);
                    tracing::debug!(new_root_pid, "grew tree by one level");
                    None
                }
            };
        }
        Ok(())
    }

    fn insert_into_leaf(&self, pid: PageId, key: i32, rid: RecordId) -> Result<Option<(i32, PageId)>, TreeError> {
        let mut guard = self.pool.fetch_page(pid)?;
        let mut leaf = LeafPage::new(&mut guard);
        match leaf.insert(key, rid) {
            Ok(_) => Ok(None),
            Err(TreeError::NoSpace) => {
                drop(leaf);
                drop(guard);
                let (sep_key, new_pid) = self.split_leaf_node(pid, key, rid)?;
                tracing::debug!(pid, new_pid, sep_key, "split leaf node");
                Ok(Some((sep_key, new_pid)))
            }
            Err(e) => Err(e),
        }
    }

    fn insert_into_index(&self, pid: PageId, key: i32, child: PageId) -> Result<Option<(i32, PageId)>, TreeError> {
        let mut guard = self.pool.fetch_page(pid)?;
        let mut index = IndexPage::new(&mut guard);
        match index.insert(key, child) {
            Ok(_) => Ok(None),
            Err(TreeError::NoSpace) => {
                drop(index);
                drop(guard);
                let (sep_key, new_pid) = self.split_index_node(pid, key, child)?;
                tracing::debug!(pid, new_pid, sep_key, "split index node");
                Ok(Some((sep_key, new_pid)))
            }
            Err(e) => Err(e),
        }
    }

    /// Moves every entry of `old_pid` into a freshly allocated sibling, then
    /// migrates entries back into `old_pid` smallest-first until neither page
    /// is emptier than the other, and finally places the entry that didn't
    /// fit wherever its key belongs. Returns `(separator_key, new_pid)`.
    fn split_leaf_node(&self, old_pid: PageId, new_key: i32, new_rid: RecordId) -> Result<(i32, PageId), TreeError> {
        let mut old_guard = self.pool.fetch_page(old_pid)?;
        let mut new_guard = self.pool.new_page()?;
        let new_pid = new_guard.page_id();

        let (old_prev, old_next, entries) = {
            let old_leaf = LeafPage::new(&mut old_guard);
            let entries: Vec<(i32, RecordId)> = (0..old_leaf.num_entries()).map(|i| old_leaf.get_at(i).unwrap()).collect();
            (old_leaf.prev(), old_leaf.next(), entries)
        };

        {
            let mut new_leaf = LeafPage::new(&mut new_guard);
            new_leaf.init(new_pid);
            for (k, rid) in &entries {
                new_leaf
                    .insert(*k, *rid)
                    .expect("freshly emptied page has room for every entry it held");
            }
        }
        {
            let mut old_leaf = LeafPage::new(&mut old_guard);
            old_leaf.init(old_pid);
            old_leaf.set_prev(old_prev);
        }

        loop {
            let (old_avail, new_avail, first) = {
                let old_leaf = LeafPage::new(&mut old_guard);
                let new_leaf = LeafPage::new(&mut new_guard);
                (old_leaf.available_space(), new_leaf.available_space(), new_leaf.get_first())
            };
            if old_avail <= new_avail {
                break;
            }
            let (k, rid) = match first {
                Some(e) => e,
                None => break,
            };
            LeafPage::new(&mut new_guard).delete(k, rid);
            LeafPage::new(&mut old_guard)
                .insert(k, rid)
                .expect("space was just freed in the sibling");
        }

        let boundary = LeafPage::new(&mut new_guard).get_first().map(|(k, _)| k);
        match boundary {
            Some(b) if new_key >= b => {
                LeafPage::new(&mut new_guard).insert(new_key, new_rid)?;
            }
            _ => {
                LeafPage::new(&mut old_guard).insert(new_key, new_rid)?;
            }
        }

        LeafPage::new(&mut old_guard).set_next(new_pid);
        {
            let mut new_leaf = LeafPage::new(&mut new_guard);
            new_leaf.set_prev(old_pid);
            new_leaf.set_next(old_next);
        }
        if old_next != INVALID_PAGE {
            let mut next_guard = self.pool.fetch_page(old_next)?;
            LeafPage::new(&mut next_guard).set_prev(new_pid);
        }

        let sep_key = LeafPage::new(&mut new_guard)
            .get_first()
            .expect("split never leaves the new node empty")
            .0;

        Ok((sep_key, new_pid))
    }

    /// Same move-all-then-move-back policy as `split_leaf_node`, generalized
    /// for index entries: the new node's first entry is removed and its
    /// child promoted to the new node's `leftLink`, since that key is what
    /// gets pushed up to the parent as the separator.
    fn split_index_node(&self, old_pid: PageId, new_key: i32, new_child: PageId) -> Result<(i32, PageId), TreeError> {
        let mut old_guard = self.pool.fetch_page(old_pid)?;
        let mut new_guard = self.pool.new_page()?;
        let new_pid = new_guard.page_id();

        let (old_left_link, entries) = {
            let old_index = IndexPage::new(&mut old_guard);
            let entries: Vec<(i32, PageId)> = (0..old_index.num_entries()).map(|i| old_index.get_at(i).unwrap()).collect();
            (old_index.left_link(), entries)
        };

        {
            let mut new_index = IndexPage::new(&mut new_guard);
            new_index.init(new_pid);
            new_index.set_left_link(old_left_link);
            for (k, c) in &entries {
                new_index
                    .insert(*k, *c)
                    .expect("freshly emptied page has room for every entry it held");
            }
        }
        {
            let mut old_index = IndexPage::new(&mut old_guard);
            old_index.init(old_pid);
            old_index.set_left_link(old_left_link);
        }

        loop {
            let (old_avail, new_avail, first) = {
                let old_index = IndexPage::new(&mut old_guard);
                let new_index = IndexPage::new(&mut new_guard);
                (old_index.available_space(), new_index.available_space(), new_index.get_first())
            };
            if old_avail <= new_avail {
                break;
            }
            let (k, c) = match first {
                Some(e) => e,
                None => break,
            };
            IndexPage::new(&mut new_guard).delete(k);
            IndexPage::new(&mut old_guard)
                .insert(k, c)
                .expect("space was just freed in the sibling");
        }

        let boundary = IndexPage::new(&mut new_guard).get_first().map(|(k, _)| k);
        match boundary {
            Some(b) if new_key >= b => {
                IndexPage::new(&mut new_guard).insert(new_key, new_child)?;
            }
            _ => {
                IndexPage::new(&mut old_guard).insert(new_key, new_child)?;
            }
        }

        let (sep_key, sep_child) = IndexPage::new(&mut new_guard)
            .get_first()
            .expect("split never leaves the new node empty");
        {
            let mut new_index = IndexPage::new(&mut new_guard);
            new_index.delete(sep_key);
            new_index.set_left_link(sep_child);
        }

        Ok((sep_key, new_pid))
    }

    pub fn delete(&mut self, key: i32, rid: RecordId) -> Result<(), TreeError> {
        let root = self.root_pid();
        if root == INVALID_PAGE {
            return Err(TreeError::NotFound);
        }

        let mut path: Vec<PageId> = Vec::new();
        let mut cur = root;
        loop {
            let guard = self.pool.fetch_page(cur)?;
            if node_type_of(&guard) == NodeType::Leaf {
                drop(guard);
                break;
            }
            let next = IndexPageRef::new(&guard).get_page_id(key);
            drop(guard);
            path.push(cur);
            cur = next;
        }

        let leaf_pid = cur;
        let deleted = {
            let mut guard = self.pool.fetch_page(leaf_pid)?;
            LeafPage::new(&mut guard).delete(key, rid)
        };
        if !deleted {
            return Err(TreeError::NotFound);
        }

        self.rebalance_after_delete(leaf_pid, &mut path)
    }

    /// Walks back up `path` from `start_pid`, redistributing or merging with
    /// a sibling at each underflowing level, stopping as soon as a level is
    /// sufficiently full or a redistribution (rather than a merge) absorbs
    /// the underflow. Collapses the root when it becomes an empty leaf or an
    /// empty index node with a single remaining child.
    fn rebalance_after_delete(&mut self, start_pid: PageId, path: &mut Vec<PageId>) -> Result<(), TreeError> {
        let mut node_pid = start_pid;

        loop {
            let (num_entries, available, is_leaf) = {
                let guard = self.pool.fetch_page(node_pid)?;
                if node_type_of(&guard) == NodeType::Leaf {
                    let leaf = LeafPageRef::new(&guard);
                    (leaf.num_entries(), leaf.available_space(), true)
                } else {
                    let index = IndexPageRef::new(&guard);
                    (index.num_entries(), index.available_space(), false)
                }
            };

            let parent_pid = match path.pop() {
                Some(p) => p,
                None => {
                    if is_leaf && num_entries == 0 {
                        self.pool.free_page(node_pid)?;
                        self.set_root_pid(INVALID_PAGE);
                        tracing::debug!("tree emptied, root cleared");
                    } else if !is_leaf && num_entries == 0 {
                        let new_root = {
                            let guard = self.pool.fetch_page(node_pid)?;
                            IndexPageRef::new(&guard).left_link()
                        };
                        self.pool.free_page(node_pid)?;
                        self.set_root_pid(new_root);
                        tracing::debug!(new_root, "tree shrank by one level");
                    }
                    return Ok(());
                }
            };

            if is_sufficient(available) {
                return Ok(());
            }

            let merged_away = if is_leaf {
                self.rebalance_leaf(node_pid, parent_pid)?
            } else {
                self.rebalance_index(node_pid, parent_pid)?
            };

            if !merged_away {
                return Ok(());
            }
            node_pid = parent_pid;
        }
    }

    fn rebalance_leaf(&mut self, node_pid: PageId, parent_pid: PageId) -> Result<bool, TreeError> {
        let (sibling_pid, right_sibling) = {
            let guard = self.pool.fetch_page(parent_pid)?;
            IndexPageRef::new(&guard)
                .find_sibling_for_child(node_pid)
                .ok_or_else(|| TreeError::Invariant("underflowing leaf has no sibling".to_string()))?
        };

        let (node_avail, sibling_avail) = {
            let node_guard = self.pool.fetch_page(node_pid)?;
            let sibling_guard = self.pool.fetch_page(sibling_pid)?;
            (
                LeafPageRef::new(&node_guard).available_space(),
                LeafPageRef::new(&sibling_guard).available_space(),
            )
        };

        if merge_feasible(node_avail, sibling_avail) {
            self.merge_leaves(node_pid, sibling_pid, right_sibling)?;
            let mut parent_guard = self.pool.fetch_page(parent_pid)?;
            IndexPage::new(&mut parent_guard).delete_page(node_pid, right_sibling);
            tracing::debug!(node_pid, sibling_pid, "merged leaf into sibling");
            return Ok(true);
        }

        self.redistribute_leaves(node_pid, sibling_pid, right_sibling, parent_pid)?;
        tracing::debug!(node_pid, sibling_pid, "redistributed leaf entries");
        Ok(false)
    }

    fn merge_leaves(&self, node_pid: PageId, sibling_pid: PageId, right_sibling: bool) -> Result<(), TreeError> {
        let node_entries: Vec<(i32, RecordId)> = {
            let guard = self.pool.fetch_page(node_pid)?;
            let leaf = LeafPageRef::new(&guard);
            (0..leaf.num_entries()).map(|i| leaf.get_at(i).unwrap()).collect()
        };

        {
            let mut sibling_guard = self.pool.fetch_page(sibling_pid)?;
            let mut sibling = LeafPage::new(&mut sibling_guard);
            for (k, rid) in &node_entries {
                sibling.insert(*k, *rid)?;
            }
        }

        let (node_prev, node_next) = {
            let guard = self.pool.fetch_page(node_pid)?;
            let leaf = LeafPageRef::new(&guard);
            (leaf.prev(), leaf.next())
        };

        if right_sibling {
            LeafPage::new(&mut self.pool.fetch_page(sibling_pid)?).set_prev(node_prev);
            if node_prev != INVALID_PAGE {
                LeafPage::new(&mut self.pool.fetch_page(node_prev)?).set_next(sibling_pid);
            }
        } else {
            LeafPage::new(&mut self.pool.fetch_page(sibling_pid)?).set_next(node_next);
            if node_next != INVALID_PAGE {
                LeafPage::new(&mut self.pool.fetch_page(node_next)?).set_prev(sibling_pid);
            }
        }

        self.pool.free_page(node_pid)?;
        Ok(())
    }

    fn redistribute_leaves(
        &self,
        node_pid: PageId,
        sibling_pid: PageId,
        right_sibling: bool,
        parent_pid: PageId,
    ) -> Result<(), TreeError> {
        loop {
            let (node_avail, sibling_avail) = {
                let node_guard = self.pool.fetch_page(node_pid)?;
                let sibling_guard = self.pool.fetch_page(sibling_pid)?;
                (
                    LeafPageRef::new(&node_guard).available_space(),
                    LeafPageRef::new(&sibling_guard).available_space(),
                )
            };
            if node_avail <= sibling_avail {
                break;
            }

            let entry = {
                let guard = self.pool.fetch_page(sibling_pid)?;
                let sibling = LeafPageRef::new(&guard);
                if right_sibling {
                    sibling.get_first()
                } else {
                    sibling.get_last()
                }
            };
            let (k, rid) = match entry {
                Some(e) => e,
                None => break,
            };

            LeafPage::new(&mut self.pool.fetch_page(sibling_pid)?).delete(k, rid);
            LeafPage::new(&mut self.pool.fetch_page(node_pid)?).insert(k, rid)?;
        }

        let reroute_pid = if right_sibling { sibling_pid } else { node_pid };
        let new_key = {
            let guard = self.pool.fetch_page(reroute_pid)?;
            LeafPageRef::new(&guard).get_first().map(|(k, _)| k)
        };
        let mut parent_guard = self.pool.fetch_page(parent_pid)?;
        let mut parent_index = IndexPage::new(&mut parent_guard);
        if let (Some((old_key, is_left_link)), Some(new_key)) = (parent_index.find_key_with_page(reroute_pid), new_key) {
            if !is_left_link {
                parent_index.adjust_key(new_key, old_key);
            }
        }
        Ok(())
    }

    fn rebalance_index(&mut self, node_pid: PageId, parent_pid: PageId) -> Result<bool, TreeError> {
        let (sibling_pid, right_sibling) = {
            let guard = self.pool.fetch_page(parent_pid)?;
            IndexPageRef::new(&guard)
                .find_sibling_for_child(node_pid)
                .ok_or_else(|| TreeError::Invariant("underflowing index node has no sibling".to_string()))?
        };

        let (node_avail, sibling_avail) = {
            let node_guard = self.pool.fetch_page(node_pid)?;
            let sibling_guard = self.pool.fetch_page(sibling_pid)?;
            (
                IndexPageRef::new(&node_guard).available_space(),
                IndexPageRef::new(&sibling_guard).available_space(),
            )
        };

        if merge_feasible(node_avail, sibling_avail) {
            self.merge_index(node_pid, sibling_pid, right_sibling, parent_pid)?;
            let mut parent_guard = self.pool.fetch_page(parent_pid)?;
            IndexPage::new(&mut parent_guard).delete_page(node_pid, right_sibling);
            tracing::debug!(node_pid, sibling_pid, "merged index node into sibling");
            return Ok(true);
        }

        self.redistribute_index(node_pid, sibling_pid, right_sibling, parent_pid)?;
        tracing::debug!(node_pid, sibling_pid, "redistributed index entries");
        Ok(false)
    }

    /// Folds `node_pid`'s subtree into `sibling_pid` along with the
    /// connecting separator pulled out of the parent (an index node's
    /// entries don't carry the key that routes to the node itself, so a
    /// merge has to bring that key along as a regular entry), then frees
    /// `node_pid`.
    fn merge_index(&self, node_pid: PageId, sibling_pid: PageId, right_sibling: bool, parent_pid: PageId) -> Result<(), TreeError> {
        let (node_left_link, node_entries) = {
            let guard = self.pool.fetch_page(node_pid)?;
            let index = IndexPageRef::new(&guard);
            let entries: Vec<(i32, PageId)> = (0..index.num_entries()).map(|i| index.get_at(i).unwrap()).collect();
            (index.left_link(), entries)
        };

        if right_sibling {
            let parent_sep = {
                let guard = self.pool.fetch_page(parent_pid)?;
                IndexPageRef::new(&guard).find_key_with_page(sibling_pid).map(|(k, _)| k)
            }
            .ok_or_else(|| TreeError::Invariant("missing parent separator for sibling".to_string()))?;

            let (bridge_child, existing) = {
                let guard = self.pool.fetch_page(sibling_pid)?;
                let sibling = IndexPageRef::new(&guard);
                let existing: Vec<(i32, PageId)> = (0..sibling.num_entries()).map(|i| sibling.get_at(i).unwrap()).collect();
                (sibling.left_link(), existing)
            };

            let mut sibling_guard = self.pool.fetch_page(sibling_pid)?;
            let mut sibling = IndexPage::new(&mut sibling_guard);
            sibling.init(sibling_pid);
            sibling.set_left_link(node_left_link);
            for (k, c) in &node_entries {
                sibling.insert(*k, *c)?;
            }
            sibling.insert(parent_sep, bridge_child)?;
            for (k, c) in &existing {
                sibling.insert(*k, *c)?;
            }
        } else {
            let parent_sep = {
                let guard = self.pool.fetch_page(parent_pid)?;
                IndexPageRef::new(&guard).find_key_with_page(node_pid).map(|(k, _)| k)
            }
            .ok_or_else(|| TreeError::Invariant("missing parent separator for node".to_string()))?;

            let mut sibling_guard = self.pool.fetch_page(sibling_pid)?;
            let mut sibling = IndexPage::new(&mut sibling_guard);
            sibling.insert(parent_sep, node_left_link)?;
            for (k, c) in &node_entries {
                sibling.insert(*k, *c)?;
            }
        }

        self.pool.free_page(node_pid)?;
        Ok(())
    }

    /// Rotates one entry through the parent at a time (the classic internal
    /// redistribution: the parent's separator becomes a new entry in the
    /// receiving node, and the sibling's extreme entry's key becomes the new
    /// separator) until neither side is emptier than the other.
    fn redistribute_index(
        &self,
        node_pid: PageId,
        sibling_pid: PageId,
        right_sibling: bool,
        parent_pid: PageId,
    ) -> Result<(), TreeError> {
        loop {
            let (node_avail, sibling_avail) = {
                let node_guard = self.pool.fetch_page(node_pid)?;
                let sibling_guard = self.pool.fetch_page(sibling_pid)?;
                (
                    IndexPageRef::new(&node_guard).available_space(),
                    IndexPageRef::new(&sibling_guard).available_space(),
                )
            };
            if node_avail <= sibling_avail {
                break;
            }

            if right_sibling {
                let old_sep = {
                    let guard = self.pool.fetch_page(parent_pid)?;
                    IndexPageRef::new(&guard).find_key_with_page(sibling_pid).map(|(k, _)| k)
                };
                let old_sep = match old_sep {
                    Some(k) => k,
                    None => break,
                };
                let (sibling_left_link, first_entry) = {
                    let guard = self.pool.fetch_page(sibling_pid)?;
                    let sibling = IndexPageRef::new(&guard);
                    (sibling.left_link(), sibling.get_first())
                };
                let first_entry = match first_entry {
                    Some(e) => e,
                    None => break,
                };

                IndexPage::new(&mut self.pool.fetch_page(node_pid)?).insert(old_sep, sibling_left_link)?;
                {
                    let mut sibling_guard = self.pool.fetch_page(sibling_pid)?;
                    let mut sibling = IndexPage::new(&mut sibling_guard);
                    sibling.delete(first_entry.0);
                    sibling.set_left_link(first_entry.1);
                }
                IndexPage::new(&mut self.pool.fetch_page(parent_pid)?).adjust_key(first_entry.0, old_sep);
            } else {
                let old_sep = {
                    let guard = self.pool.fetch_page(parent_pid)?;
                    IndexPageRef::new(&guard).find_key_with_page(node_pid).map(|(k, _)| k)
                };
                let old_sep = match old_sep {
                    Some(k) => k,
                    None => break,
                };
                let node_left_link = {
                    let guard = self.pool.fetch_page(node_pid)?;
                    IndexPageRef::new(&guard).left_link()
                };
                let last_entry = {
                    let guard = self.pool.fetch_page(sibling_pid)?;
                    IndexPageRef::new(&guard).get_last()
                };
                let last_entry = match last_entry {
                    Some(e) => e,
                    None => break,
                };

                {
                    let mut node_guard = self.pool.fetch_page(node_pid)?;
                    let mut node = IndexPage::new(&mut node_guard);
                    node.insert(old_sep, node_left_link)?;
                    node.set_left_link(last_entry.1);
                }
                IndexPage::new(&mut self.pool.fetch_page(sibling_pid)?).delete(last_entry.0);
                IndexPage::new(&mut self.pool.fetch_page(parent_pid)?).adjust_key(last_entry.0, old_sep);
            }
        }
        Ok(())
    }

    /// Renders every `(key, rid)` pair in key order, one per line, by
    /// walking the leaf chain from the leftmost leaf.
    pub fn print(&self) -> Result<String, TreeError> {
        use std::fmt::Write;

        let mut out = String::new();
        let mut cur = self.find_leaf_for_scan(None)?;
        while let Some(pid) = cur {
            let guard = self.pool.fetch_page(pid)?;
            let leaf = LeafPageRef::new(&guard);
            for i in 0..leaf.num_entries() {
                let (k, rid) = leaf.get_at(i).unwrap();
                let _ = writeln!(out, "{k} -> ({}, {})", rid.page_no, rid.slot_no);
            }
            let next = leaf.next();
            cur = if next == INVALID_PAGE { None } else { Some(next) };
        }
        Ok(out)
    }

    /// Walks the whole tree once for a page-type/entry census, plus one
    /// leftmost descent to measure height.
    pub fn dump_statistics(&self) -> Result<TreeStats, TreeError> {
        let root = self.root_pid();
        if root == INVALID_PAGE {
            return Ok(TreeStats::default());
        }

        let mut height = 1;
        let mut cur = root;
        loop {
            let guard = self.pool.fetch_page(cur)?;
            match node_type_of(&guard) {
                NodeType::Leaf => break,
                NodeType::Index => {
                    let next = IndexPageRef::new(&guard).left_link();
                    drop(guard);
                    cur = next;
                    height += 1;
                }
            }
        }

        let mut stats = TreeStats {
            height,
            ..Default::default()
        };
        let mut stack = vec![root];
        while let Some(pid) = stack.pop() {
            let guard = self.pool.fetch_page(pid)?;
            match node_type_of(&guard) {
                NodeType::Leaf => {
                    stats.leaf_pages += 1;
                    stats.entries += LeafPageRef::new(&guard).num_entries();
                }
                NodeType::Index => {
                    stats.index_pages += 1;
                    let index = IndexPageRef::new(&guard);
                    stack.push(index.left_link());
                    for i in 0..index.num_entries() {
                        stack.push(index.get_at(i).unwrap().1);
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Frees every page belonging to this tree, including the header page,
    /// and removes its catalog entry. Consumes `self` so nothing can use the
    /// tree (or its now-stale header guard) afterward.
    pub fn destroy(self) -> Result<(), TreeError> {
        let root = self.root_pid();
        let BTreeFile { pool, name, header_guard } = self;
        let header_pid = header_guard.page_id();
        drop(header_guard);

        if root != INVALID_PAGE {
            Self::destroy_subtree(pool, root)?;
        }
        pool.free_page(header_pid)?;

        let catalog = Catalog::new(pool);
        catalog.delete_file_entry(&name).map_err(|e| TreeError::Invariant(e.to_string()))?;
        tracing::info!(name, "destroyed tree");
        Ok(())
    }

    fn destroy_subtree(pool: &dyn BufferPoolManager, pid: PageId) -> Result<(), TreeError> {
        let children: Vec<PageId> = {
            let guard = pool.fetch_page(pid)?;
            match node_type_of(&guard) {
                NodeType::Leaf => Vec::new(),
                NodeType::Index => {
                    let index = IndexPageRef::new(&guard);
                    let mut kids = vec![index.left_link()];
                    for i in 0..index.num_entries() {
                        kids.push(index.get_at(i).unwrap().1);
                    }
                    kids
                }
            }
        };
        for child in children {
            Self::destroy_subtree(pool, child)?;
        }
        pool.free_page(pid)?;
        Ok(())
    }
}
