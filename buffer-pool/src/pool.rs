//! A single-threaded, CLOCK-replacement buffer pool manager.
//!
//! The replacement algorithm and frame bookkeeping mirror a concurrent,
//! actor-driven design this codebase also contains, with the channel and
//! locking stripped out: the tree is single-threaded end to end, so `&self`
//! methods backed by a `RefCell` are enough.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use common::api::{BufferPoolManager, PageGuard, INVALID_PAGE, PAGE_SIZE};
use common::error::BufferPoolError;
use common::PageId;

use crate::disk_manager::DiskManager;

type FrameId = usize;

struct Frame {
    page_id: PageId,
    pin_count: usize,
    is_dirty: bool,
    is_referenced: bool,
}

struct PoolState {
    frames: Vec<Frame>,
    frame_data: Vec<Box<[u8; PAGE_SIZE]>>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    clock_hand: usize,
}

impl PoolState {
    fn new(pool_size: usize) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut frame_data = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);
        for i in 0..pool_size {
            frames.push(Frame {
                page_id: INVALID_PAGE,
                pin_count: 0,
                is_dirty: false,
                is_referenced: false,
            });
            frame_data.push(Box::new([0u8; PAGE_SIZE]));
            free_list.push(i);
        }
        Self {
            frames,
            frame_data,
            page_table: HashMap::new(),
            free_list,
            clock_hand: 0,
        }
    }

    /// Pops the free list if non-empty, else runs CLOCK: give referenced frames
    /// one second chance, evict the first unpinned, unreferenced frame found.
    /// Bounded to two full sweeps of the frame table.
    fn find_victim(&mut self) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = self.free_list.pop() {
            return Ok(frame_id);
        }

        let pool_size = self.frames.len();
        for _ in 0..(2 * pool_size) {
            let frame_id = self.clock_hand;
            self.clock_hand = (self.clock_hand + 1) % pool_size;

            if self.frames[frame_id].pin_count != 0 {
                continue;
            }
            if self.frames[frame_id].is_referenced {
                self.frames[frame_id].is_referenced = false;
                continue;
            }
            return Ok(frame_id);
        }

        Err(BufferPoolError::PoolExhausted)
    }
}

pub struct BufferPool {
    state: RefCell<PoolState>,
    disk_manager: Rc<DiskManager>,
}

impl BufferPool {
    pub fn new(pool_size: usize, disk_manager: Rc<DiskManager>) -> Self {
        Self {
            state: RefCell::new(PoolState::new(pool_size)),
            disk_manager,
        }
    }

    fn evict(&self, state: &mut PoolState, frame_id: FrameId) -> Result<(), BufferPoolError> {
        if state.frames[frame_id].is_dirty {
            let old_page_id = state.frames[frame_id].page_id;
            if old_page_id != INVALID_PAGE {
                self.disk_manager
                    .write_page(old_page_id, &state.frame_data[frame_id][..])?;
            }
        }
        let old_page_id = state.frames[frame_id].page_id;
        if old_page_id != INVALID_PAGE {
            state.page_table.remove(&old_page_id);
        }
        Ok(())
    }

    fn unpin_with_data(&self, page_id: PageId, data: Box<[u8; PAGE_SIZE]>, is_dirty: bool) {
        let mut state = self.state.borrow_mut();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            if is_dirty {
                state.frame_data[frame_id] = data;
                state.frames[frame_id].is_dirty = true;
            }
            if state.frames[frame_id].pin_count > 0 {
                state.frames[frame_id].pin_count -= 1;
            }
        }
    }
}

impl BufferPoolManager for BufferPool {
    fn fetch_page(&self, page_id: PageId) -> Result<Box<dyn PageGuard + '_>, BufferPoolError> {
        let mut state = self.state.borrow_mut();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.frames[frame_id].pin_count += 1;
            state.frames[frame_id].is_referenced = true;
            let data = state.frame_data[frame_id].clone();
            return Ok(Box::new(SyncPageGuard {
                pool: self,
                page_id,
                data,
                is_dirty: false,
            }));
        }

        let frame_id = state.find_victim()?;
        self.evict(&mut state, frame_id)?;

        let mut data = Box::new([0u8; PAGE_SIZE]);
        self.disk_manager.read_page(page_id, &mut data[..])?;

        state.page_table.insert(page_id, frame_id);
        state.frames[frame_id] = Frame {
            page_id,
            pin_count: 1,
            is_dirty: false,
            is_referenced: true,
        };
        state.frame_data[frame_id] = data.clone();

        Ok(Box::new(SyncPageGuard {
            pool: self,
            page_id,
            data,
            is_dirty: false,
        }))
    }

    fn new_page(&self) -> Result<Box<dyn PageGuard + '_>, BufferPoolError> {
        let mut state = self.state.borrow_mut();

        let frame_id = state.find_victim()?;
        self.evict(&mut state, frame_id)?;

        let page_id = self.disk_manager.allocate_page();
        let data = Box::new([0u8; PAGE_SIZE]);

        state.page_table.insert(page_id, frame_id);
        state.frames[frame_id] = Frame {
            page_id,
            pin_count: 1,
            is_dirty: true,
            is_referenced: true,
        };
        state.frame_data[frame_id] = data.clone();

        tracing::debug!(page_id, "allocated new page");

        Ok(Box::new(SyncPageGuard {
            pool: self,
            page_id,
            data,
            is_dirty: true,
        }))
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let mut state = self.state.borrow_mut();
        let frame_id = *state
            .page_table
            .get(&page_id)
            .ok_or(BufferPoolError::NotResident { page_id })?;
        if state.frames[frame_id].pin_count == 0 {
            return Err(BufferPoolError::NotPinned { page_id });
        }
        state.frames[frame_id].pin_count -= 1;
        if is_dirty {
            state.frames[frame_id].is_dirty = true;
        }
        Ok(())
    }

    fn free_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut state = self.state.borrow_mut();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            if state.frames[frame_id].pin_count != 0 {
                return Err(BufferPoolError::StillPinned { page_id });
            }
            state.page_table.remove(&page_id);
            state.frames[frame_id] = Frame {
                page_id: INVALID_PAGE,
                pin_count: 0,
                is_dirty: false,
                is_referenced: false,
            };
            state.free_list.push(frame_id);
        }
        Ok(())
    }

    fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut state = self.state.borrow_mut();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            if state.frames[frame_id].is_dirty {
                self.disk_manager
                    .write_page(page_id, &state.frame_data[frame_id][..])?;
                state.frames[frame_id].is_dirty = false;
            }
        }
        Ok(())
    }

    fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let page_ids: Vec<PageId> = {
            let state = self.state.borrow();
            state.page_table.keys().copied().collect()
        };
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }
}

/// RAII guard for a pinned page. Holds its own copy of the frame's bytes and
/// writes them back into the pool on drop if dirty; this mirrors the
/// channel-based guard this pool's replacement algorithm was lifted from,
/// adapted to synchronous, single-threaded access.
struct SyncPageGuard<'a> {
    pool: &'a BufferPool,
    page_id: PageId,
    data: Box<[u8; PAGE_SIZE]>,
    is_dirty: bool,
}

impl<'a> PageGuard for SyncPageGuard<'a> {
    fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl<'a> Deref for SyncPageGuard<'a> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.data[..]
    }
}

impl<'a> DerefMut for SyncPageGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.is_dirty = true;
        &mut self.data[..]
    }
}

impl<'a> Drop for SyncPageGuard<'a> {
    fn drop(&mut self) {
        let data = std::mem::replace(&mut self.data, Box::new([0u8; PAGE_SIZE]));
        self.pool.unpin_with_data(self.page_id, data, self.is_dirty);
    }
}
