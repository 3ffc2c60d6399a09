//! Buffer pool allocation, fetch, and pin/unpin-driven eviction, exercised
//! against a real temp file and the CLOCK replacer.

use common::api::BufferPoolManager;

fn open_pool(dir: &std::path::Path, pool_size: usize) -> buffer_pool::BufferPool {
    buffer_pool::open(dir.join("pool.db"), pool_size).unwrap()
}

#[test]
fn new_page_hands_out_sequential_ids() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 10);

    let page = pool.new_page().unwrap();
    assert_eq!(page.page_id(), 0);
}

#[test]
fn fetch_page_returns_the_same_page_after_drop() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 10);

    let page = pool.new_page().unwrap();
    let page_id = page.page_id();
    drop(page);

    let fetched = pool.fetch_page(page_id).unwrap();
    assert_eq!(fetched.page_id(), page_id);
}

#[test]
fn new_page_fails_when_every_frame_is_pinned() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 3);

    let page0 = pool.new_page().unwrap();
    let page1 = pool.new_page().unwrap();
    let page2 = pool.new_page().unwrap();

    assert!(pool.new_page().is_err(), "pool is full and every frame is pinned");

    drop(page1);
    let page3 = pool.new_page().unwrap();
    assert_eq!(page3.page_id(), 3, "unpinning page1 frees a frame for eviction");

    drop(page0);
    drop(page2);
    drop(page3);
}

#[test]
fn dirty_pages_survive_eviction_through_the_disk() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 1);

    let mut page0 = pool.new_page().unwrap();
    let id0 = page0.page_id();
    page0[0] = 42;
    drop(page0);

    // Only one frame: allocating again must evict page0, writing it back first.
    let page1 = pool.new_page().unwrap();
    let id1 = page1.page_id();
    drop(page1);

    let refetched = pool.fetch_page(id0).unwrap();
    assert_eq!(refetched[0], 42);
    drop(refetched);

    assert!(pool.fetch_page(id1).is_ok());
}
