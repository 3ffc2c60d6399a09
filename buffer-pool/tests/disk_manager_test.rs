//! Positioned file I/O and monotonic page allocation, exercised against a
//! real temp file.

use buffer_pool::DiskManager;
use common::api::PAGE_SIZE;

#[test]
fn allocate_page_hands_out_sequential_ids() {
    let dir = tempfile::tempdir().unwrap();
    let disk_manager = DiskManager::open(dir.path().join("alloc.db")).unwrap();
    assert_eq!(disk_manager.allocate_page(), 0);
    assert_eq!(disk_manager.allocate_page(), 1);
}

#[test]
fn write_then_read_page_round_trips_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let disk_manager = DiskManager::open(dir.path().join("rw.db")).unwrap();
    let page_id = disk_manager.allocate_page();

    let mut data = [0u8; PAGE_SIZE];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = i as u8;
    }
    disk_manager.write_page(page_id, &data).unwrap();

    let mut read_back = [0u8; PAGE_SIZE];
    disk_manager.read_page(page_id, &mut read_back).unwrap();
    assert_eq!(data, read_back);
}

#[test]
fn reopening_an_existing_file_resumes_allocation_past_its_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.db");
    {
        let disk_manager = DiskManager::open(&path).unwrap();
        disk_manager.allocate_page();
        disk_manager.allocate_page();
        disk_manager.write_page(1, &[7u8; PAGE_SIZE]).unwrap();
    }

    let disk_manager = DiskManager::open(&path).unwrap();
    assert_eq!(disk_manager.page_count(), 2);
    assert_eq!(disk_manager.allocate_page(), 2);
}
