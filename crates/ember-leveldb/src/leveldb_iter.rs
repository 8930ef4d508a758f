use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use ember_sstable::table::{Table, TableIter};
use ember_vfs::traits::WritableFilesystem;
use seekable_iterator::{CursorLendingIterator, Seekable};

use crate::comparator::Comparator;
use crate::config_constants::NUM_LEVELS;
use crate::db::Db;
use crate::error::{Error, Result};
use crate::format::{EntryType, InternalKey, SequenceNumber};
use crate::memtable::MemtableValue;
use crate::options::ReadOptions;
use crate::snapshot::SnapshotHandle;
use crate::version::{user_key, FileMetadata};

/// Materializes every live user key/value pair within `[begin, end)` as of `read_options.snapshot`
/// (or the latest sequence number, if unset), merging the memtable with every on-disk table that
/// overlaps the requested range.
///
/// The teacher's `DBIter` merges a lazily-advanced `mem_iter`/`imm_iter`/per-table-iterator stack
/// one key at a time via a binary heap, so a caller can stop early without reading the rest of the
/// database. This crate instead pulls every overlapping entry up front into a `HashMap` and returns
/// a sorted `Vec`; see DESIGN.md for why a lazy heap-merge iterator isn't implemented here.
pub(crate) fn scan<FS: WritableFilesystem>(
    db: &Db<FS>,
    read_options: &ReadOptions,
    begin: Option<&[u8]>,
    end: Option<&[u8]>,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let comparator = Arc::clone(db.comparator());
    let db_directory = db.db_directory().to_path_buf();

    db.with_inner(|inner| {
        let snapshot_sequence = read_options
            .snapshot
            .as_ref()
            .map_or_else(|| inner.last_sequence(), SnapshotHandle::sequence_number);

        let mut merged: HashMap<Vec<u8>, MemtableValue> = HashMap::new();
        for (key, value) in inner.memtable().collect_range(snapshot_sequence, begin, end) {
            merged.entry(key).or_insert(value);
        }

        let version = inner.current_version();
        for level in 0..NUM_LEVELS {
            let mut files = files_overlapping(version.files(level), comparator.as_ref(), begin, end);
            if level == 0 {
                // Within L0, files can overlap in key range, so the newest file (highest file
                // number) must be consulted first for any key more than one file claims.
                files.sort_by(|a, b| b.file_number.0.cmp(&a.file_number.0));
            }

            for file in files {
                let table = inner.table_cache().get(inner.fs(), &db_directory, file.file_number, file.file_size)?;
                let _ = file.record_seek();
                merge_table_into(&table, comparator.as_ref(), snapshot_sequence, begin, end, &mut merged)?;
            }
        }

        let mut result: Vec<(Vec<u8>, Vec<u8>)> = merged
            .into_iter()
            .filter_map(|(key, value)| match value {
                MemtableValue::Value(v) => Some((key, v)),
                MemtableValue::Deletion => None,
            })
            .collect();
        result.sort_by(|a, b| comparator.compare(&a.0, &b.0));
        Ok(result)
    })
}

/// Folds every entry of `table` within `[begin, end)` visible at `snapshot_sequence` into `out`,
/// without overwriting a key `out` already has an answer for (the caller visits tables in
/// descending precedence order).
fn merge_table_into<File: ember_vfs::traits::RandomAccess>(
    table: &Table<File>,
    comparator: &dyn Comparator,
    snapshot_sequence: SequenceNumber,
    begin: Option<&[u8]>,
    end: Option<&[u8]>,
    out: &mut HashMap<Vec<u8>, MemtableValue>,
) -> Result<()> {
    let mut iter = TableIter::new(table);
    match begin {
        Some(b) => iter.seek(InternalKey::new_lookup(b, SequenceNumber::MAX_SEQUENCE_NUMBER).as_bytes()),
        None => iter.seek_to_first(),
    }

    while let Some((key, value)) = iter.current() {
        let internal_key = InternalKey::from_bytes(key.to_vec());
        let parsed = internal_key
            .decode()
            .map_err(|_| Error::Corruption("corrupt internal key during scan".to_owned()))?;

        if end.is_some_and(|e| comparator.compare(parsed.user_key, e) != Ordering::Less) {
            break;
        }

        if parsed.sequence_number <= snapshot_sequence && !out.contains_key(parsed.user_key) {
            let entry = match parsed.entry_type {
                EntryType::Value => MemtableValue::Value(value.to_vec()),
                EntryType::Deletion => MemtableValue::Deletion,
            };
            out.insert(parsed.user_key.to_vec(), entry);
        }

        iter.next();
    }

    Ok(())
}

fn files_overlapping(
    files: &[Arc<FileMetadata>],
    comparator: &dyn Comparator,
    begin: Option<&[u8]>,
    end: Option<&[u8]>,
) -> Vec<Arc<FileMetadata>> {
    files
        .iter()
        .filter(|f| {
            let smallest = user_key(&f.smallest_key);
            let largest = user_key(&f.largest_key);
            let after_begin = begin.is_none_or(|b| comparator.compare(largest, b) != Ordering::Less);
            let before_end = end.is_none_or(|e| comparator.compare(smallest, e) != Ordering::Greater);
            after_begin && before_end
        })
        .cloned()
        .collect()
}
