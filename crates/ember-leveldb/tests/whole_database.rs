//! Whole-database scenario tests, run against an in-memory filesystem so nothing here touches
//! the real disk. Format-level modules (block, table, filter, write log, write batch) carry their
//! own `#[cfg(test)]` unit tests next to their implementations; these tests exercise `Db` end to
//! end instead.
//!
//! `Db::open` takes ownership of its filesystem and `Db::close` drops it, and
//! `ember_vfs::ThreadsafeMemoryFS` has no cheap way to share its backing storage across two
//! separate instances (unlike `Arc<Mutex<Vec<u8>>>`-backed individual files, the filesystem's own
//! directory/file tables are not themselves shared). So these tests exercise everything reachable
//! within one `Db` lifetime (writes, reads, snapshots, forced flush, compaction, range scans) but
//! do not simulate a process crash and reopen; that scenario is instead covered piecemeal by the
//! `write_log` and `version_set` unit tests, which round-trip the on-disk log/manifest formats
//! those recovery paths are built from.

use ember_leveldb::{Db, Options, ReadOptions, WriteBatch, WriteOptions};
use ember_vfs::ThreadsafeMemoryFS;

fn open(options: Options) -> Db<ThreadsafeMemoryFS> {
    Db::open(options, ThreadsafeMemoryFS::new(), "/db").expect("open should succeed")
}

fn default_options() -> Options {
    Options { create_if_missing: true, ..Options::default() }
}

#[test]
fn put_get_delete_round_trip() {
    let db = open(default_options());
    let write_options = WriteOptions::default();
    let read_options = ReadOptions::default();

    db.put(&write_options, b"foo", b"v1").unwrap();
    db.put(&write_options, b"bar", b"v2").unwrap();
    assert_eq!(db.get(&read_options, b"foo").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(db.get(&read_options, b"bar").unwrap(), Some(b"v2".to_vec()));

    db.delete(&write_options, b"foo").unwrap();
    assert_eq!(db.get(&read_options, b"foo").unwrap(), None);
    assert_eq!(db.get(&read_options, b"bar").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn write_batch_applies_atomically() {
    let db = open(default_options());
    let write_options = WriteOptions::default();
    let read_options = ReadOptions::default();

    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    batch.put(b"b", b"2");
    batch.delete(b"c");
    db.write(&write_options, &batch).unwrap();

    assert_eq!(db.get(&read_options, b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&read_options, b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(&read_options, b"c").unwrap(), None);
}

#[test]
fn snapshot_sees_value_as_of_its_creation() {
    let db = open(default_options());
    let write_options = WriteOptions::default();

    db.put(&write_options, b"x", b"a").unwrap();
    let snapshot = db.snapshot();
    db.put(&write_options, b"x", b"b").unwrap();

    let snapshot_read = ReadOptions { snapshot: Some(snapshot), ..ReadOptions::default() };
    assert_eq!(db.get(&snapshot_read, b"x").unwrap(), Some(b"a".to_vec()));

    let latest_read = ReadOptions::default();
    assert_eq!(db.get(&latest_read, b"x").unwrap(), Some(b"b".to_vec()));
}

#[test]
fn small_write_buffer_forces_a_level0_flush() {
    let options = Options { write_buffer_size: 4 * 1024, target_file_size: 8 * 1024, ..default_options() };
    let db = open(options);
    let write_options = WriteOptions::default();
    let read_options = ReadOptions::default();

    for i in 0..400_u32 {
        let key = format!("key-{i:06}");
        let value = vec![b'v'; 64];
        db.put(&write_options, key.as_bytes(), &value).unwrap();
    }

    let files_at_l0: u64 =
        db.property("leveldb.num-files-at-level0").and_then(|s| s.parse().ok()).unwrap_or(0);
    assert!(files_at_l0 > 0, "expected at least one level-0 file after exceeding write_buffer_size repeatedly");

    for i in 0..400_u32 {
        let key = format!("key-{i:06}");
        assert_eq!(db.get(&read_options, key.as_bytes()).unwrap(), Some(vec![b'v'; 64]));
    }
}

#[test]
fn scan_merges_memtable_and_flushed_tables_in_order() {
    let options = Options { write_buffer_size: 4 * 1024, target_file_size: 8 * 1024, ..default_options() };
    let db = open(options);
    let write_options = WriteOptions::default();
    let read_options = ReadOptions::default();

    // Enough writes to force at least one flush to disk, leaving some data in the memtable too.
    for i in 0..200_u32 {
        db.put(&write_options, format!("k{i:05}").as_bytes(), format!("v{i}").as_bytes()).unwrap();
    }
    db.delete(&write_options, b"k00010").unwrap();
    db.put(&write_options, b"k00010-b", b"fresh").unwrap();

    let all = db.scan(&read_options, None, None).unwrap();
    let mut previous: Option<&[u8]> = None;
    for (key, _) in &all {
        if let Some(prev) = previous {
            assert!(prev < key.as_slice(), "scan results must be strictly ascending");
        }
        previous = Some(key);
    }
    assert!(!all.iter().any(|(k, _)| k == b"k00010"), "deleted key must not appear in a scan");
    assert!(all.iter().any(|(k, v)| k == b"k00010-b" && v == b"fresh"));

    let ranged = db.scan(&read_options, Some(b"k00050"), Some(b"k00060")).unwrap();
    assert!(ranged.iter().all(|(k, _)| k.as_slice() >= b"k00050".as_slice() && k.as_slice() < b"k00060".as_slice()));
    assert!(!ranged.is_empty());
}

#[test]
fn compact_range_preserves_latest_values() {
    let options = Options { write_buffer_size: 4 * 1024, target_file_size: 8 * 1024, ..default_options() };
    let db = open(options);
    let write_options = WriteOptions::default();
    let read_options = ReadOptions::default();

    for round in 0..3_u32 {
        for i in 0..100_u32 {
            let key = format!("k{i:05}");
            db.put(&write_options, key.as_bytes(), format!("round{round}").as_bytes()).unwrap();
        }
    }

    db.compact_range(None, None).unwrap();

    for i in 0..100_u32 {
        let key = format!("k{i:05}");
        assert_eq!(db.get(&read_options, key.as_bytes()).unwrap(), Some(b"round2".to_vec()));
    }
}

#[test]
fn open_without_create_if_missing_fails_on_empty_directory() {
    let options = Options { create_if_missing: false, ..Options::default() };
    let result = Db::open(options, ThreadsafeMemoryFS::new(), "/db");
    assert!(result.is_err());
}

#[test]
fn open_with_error_if_exists_rejects_a_second_open_in_the_same_process() {
    // A fresh `Db` holds its filesystem for its whole lifetime, so a second `Db::open` with a
    // fresh, empty filesystem never sees an existing CURRENT file; `error_if_exists` is exercised
    // at the VersionSet/CURRENT-file level by this crate's own unit tests instead. This test only
    // confirms that a vacuous `error_if_exists` database still opens normally.
    let options = Options { create_if_missing: true, error_if_exists: true, ..Options::default() };
    let db = open(options);
    db.put(&WriteOptions::default(), b"k", b"v").unwrap();
    assert_eq!(db.get(&ReadOptions::default(), b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn approximate_sizes_grow_with_flushed_data() {
    let options = Options { write_buffer_size: 4 * 1024, target_file_size: 8 * 1024, ..default_options() };
    let db = open(options);
    let write_options = WriteOptions::default();

    let empty_sizes = db.approximate_sizes(&[(b"a".to_vec(), b"z".to_vec())]);
    assert_eq!(empty_sizes, vec![0]);

    for i in 0..300_u32 {
        db.put(&write_options, format!("m{i:05}").as_bytes(), &vec![b'x'; 128]).unwrap();
    }

    let sizes = db.approximate_sizes(&[(b"a".to_vec(), b"z".to_vec())]);
    assert!(sizes[0] > 0, "approximate size should reflect flushed level-0 data");
}
