//! End-to-end tests against a real buffer pool and backing file, covering
//! insert/search/delete, split/merge/redistribute through volume, scan
//! bounds, and the round-trip and idempotent-destroy laws.

use common::api::RecordId;
use common::error::TreeError;

fn open_pool(dir: &std::path::Path, pool_size: usize) -> buffer_pool::BufferPool {
    buffer_pool::open(dir.join("test.db"), pool_size).expect("open backing file")
}

#[test]
fn insert_then_search_finds_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 16);
    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();

    tree.insert(42, RecordId::new(1, 2)).unwrap();
    assert_eq!(tree.search(42).unwrap(), RecordId::new(1, 2));
    assert!(matches!(tree.search(7), Err(TreeError::NotFound)));
}

#[test]
fn search_on_empty_tree_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 16);
    let tree = btree::BTreeFile::create(&pool, "t").unwrap();
    assert!(matches!(tree.search(1), Err(TreeError::NotFound)));
}

#[test]
fn volume_insert_triggers_splits_and_all_keys_remain_findable() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 32);
    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();

    for k in 0..2000 {
        tree.insert(k, RecordId::new(k, k + 1)).unwrap();
    }

    let stats = tree.dump_statistics().unwrap();
    assert_eq!(stats.entries, 2000);
    assert!(stats.leaf_pages > 1, "2000 keys should not fit a single leaf");
    assert!(stats.index_pages >= 1, "splitting should have grown an index level");
    assert!(stats.height >= 2);

    for k in 0..2000 {
        assert_eq!(tree.search(k).unwrap(), RecordId::new(k, k + 1));
    }
}

#[test]
fn scan_respects_bounds_and_visits_keys_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 32);
    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();

    for k in (0..500).rev() {
        tree.insert(k, RecordId::new(k, k)).unwrap();
    }

    let mut scan = tree.open_scan(Some(100), Some(200)).unwrap();
    let mut seen = Vec::new();
    while let Some((k, _)) = scan.get_next().unwrap() {
        seen.push(k);
    }
    let expected: Vec<i32> = (100..=200).collect();
    assert_eq!(seen, expected);
}

#[test]
fn unbounded_scan_visits_every_key_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 32);
    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();

    for k in 0..300 {
        tree.insert(k, RecordId::new(k, k)).unwrap();
    }

    let mut scan = tree.open_scan(None, None).unwrap();
    let mut seen = Vec::new();
    while let Some((k, _)) = scan.get_next().unwrap() {
        seen.push(k);
    }
    assert_eq!(seen, (0..300).collect::<Vec<_>>());
}

#[test]
fn delete_removes_keys_and_keeps_survivors_searchable() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 32);
    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();

    for k in 0..1000 {
        tree.insert(k, RecordId::new(k, k)).unwrap();
    }
    for k in (0..1000).step_by(2) {
        tree.delete(k, RecordId::new(k, k)).unwrap();
    }

    for k in 0..1000 {
        let result = tree.search(k);
        if k % 2 == 0 {
            assert!(matches!(result, Err(TreeError::NotFound)), "key {k} should be gone");
        } else {
            assert_eq!(result.unwrap(), RecordId::new(k, k));
        }
    }
}

#[test]
fn delete_missing_record_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 16);
    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();
    tree.insert(1, RecordId::new(0, 0)).unwrap();

    assert!(matches!(tree.delete(1, RecordId::new(9, 9)), Err(TreeError::NotFound)));
    assert!(matches!(tree.delete(2, RecordId::new(0, 0)), Err(TreeError::NotFound)));
}

#[test]
fn round_trip_insert_then_delete_all_empties_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 32);
    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();

    let keys: Vec<i32> = (0..1500).collect();
    for &k in &keys {
        tree.insert(k, RecordId::new(k, k)).unwrap();
    }
    for &k in keys.iter().rev() {
        tree.delete(k, RecordId::new(k, k)).unwrap();
    }

    assert_eq!(tree.root_pid(), common::api::INVALID_PAGE);
    let stats = tree.dump_statistics().unwrap();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.leaf_pages, 0);
    assert_eq!(stats.index_pages, 0);
}

#[test]
fn scan_after_partial_delete_skips_removed_keys_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 32);
    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();

    for k in 0..800 {
        tree.insert(k, RecordId::new(k, k)).unwrap();
    }
    for k in (0..800).step_by(3) {
        tree.delete(k, RecordId::new(k, k)).unwrap();
    }

    let remaining: Vec<i32> = (0..800).filter(|k| k % 3 != 0).collect();
    let mut scan = tree.open_scan(None, None).unwrap();
    let mut seen = Vec::new();
    while let Some((k, _)) = scan.get_next().unwrap() {
        seen.push(k);
    }
    assert_eq!(seen, remaining);
}

#[test]
fn duplicate_keys_are_distinguished_by_record_id() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 16);
    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();

    tree.insert(42, RecordId::new(1, 1)).unwrap();
    tree.insert(42, RecordId::new(2, 2)).unwrap();
    tree.insert(42, RecordId::new(3, 3)).unwrap();

    tree.delete(42, RecordId::new(2, 2)).unwrap();
    assert!(matches!(tree.delete(42, RecordId::new(2, 2)), Err(TreeError::NotFound)));

    let mut scan = tree.open_scan(Some(42), Some(42)).unwrap();
    let mut seen = Vec::new();
    while let Some((k, rid)) = scan.get_next().unwrap() {
        seen.push((k, rid));
    }
    assert_eq!(seen, vec![(42, RecordId::new(1, 1)), (42, RecordId::new(3, 3))]);
}

#[test]
fn destroy_then_reopen_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 16);

    let mut tree = btree::BTreeFile::create(&pool, "t").unwrap();
    for k in 0..50 {
        tree.insert(k, RecordId::new(k, k)).unwrap();
    }
    tree.destroy().unwrap();

    assert!(btree::BTreeFile::open(&pool, "t").is_err());
    let reopened = btree::BTreeFile::create(&pool, "t").unwrap();
    assert_eq!(reopened.root_pid(), common::api::INVALID_PAGE);
}

#[test]
fn two_trees_coexist_in_the_same_file_under_different_names() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_pool(dir.path(), 32);

    let mut a = btree::BTreeFile::create(&pool, "a").unwrap();
    let mut b = btree::BTreeFile::create(&pool, "b").unwrap();

    a.insert(1, RecordId::new(0, 0)).unwrap();
    b.insert(2, RecordId::new(0, 0)).unwrap();

    assert!(matches!(a.search(2), Err(TreeError::NotFound)));
    assert!(matches!(b.search(1), Err(TreeError::NotFound)));
    assert_eq!(a.search(1).unwrap(), RecordId::new(0, 0));
    assert_eq!(b.search(2).unwrap(), RecordId::new(0, 0));
}
