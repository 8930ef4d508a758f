use std::cmp::Ordering;
use std::sync::Arc;

use ember_sstable::TableComparator;

use crate::format::compare_internal_keys;

/// User-extensible seam for ordering user keys, matching the spec's requirement that
/// `Comparator` be swappable via `Arc<dyn Comparator>` rather than baked in at compile time.
pub trait Comparator: Send + Sync {
    #[must_use]
    fn name(&self) -> &'static str;

    #[must_use]
    fn compare(&self, lhs: &[u8], rhs: &[u8]) -> Ordering;
}

/// The default comparator: plain byte-lexicographic order, matching LevelDB's `BytewiseComparator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &'static str {
        "leveldb.BytewiseComparator"
    }

    fn compare(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        lhs.cmp(rhs)
    }
}

/// Orders encoded internal keys using a user [`Comparator`] over the user-key portion, with
/// sequence number and entry type as tiebreakers. Implements [`TableComparator`] so that
/// [`ember_sstable::table::Table`] can be used directly for on-disk storage of internal keys.
#[derive(Clone)]
pub(crate) struct InternalKeyComparator(pub Arc<dyn Comparator>);

impl TableComparator for InternalKeyComparator {
    fn id(&self) -> &'static [u8] {
        b"leveldb.InternalKeyComparator"
    }

    fn cmp(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        let user_cmp = self.0.as_ref();
        compare_internal_keys(&|a, b| user_cmp.compare(a, b), lhs, rhs)
    }

    fn find_short_separator(&self, from: &[u8], to: &[u8], separator: &mut Vec<u8>) {
        // Simplified relative to LevelDB's byte-shortening variant: internal keys carry a
        // sequence/type tag that must not be perturbed, so the separator is simply `from`.
        let _ = to;
        separator.extend_from_slice(from);
    }

    fn find_short_successor(&self, key: &[u8], successor: &mut Vec<u8>) {
        successor.extend_from_slice(key);
    }
}

/// Adapts [`BytewiseComparator`] (or any [`Comparator`]) to [`ember_sstable`]'s
/// [`TableComparator`], for use on user keys directly (e.g. within the memtable).
pub(crate) struct UserKeyComparatorAdapter(pub Arc<dyn Comparator>);

impl TableComparator for UserKeyComparatorAdapter {
    fn id(&self) -> &'static [u8] {
        b"leveldb.UserKeyComparator"
    }

    fn cmp(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        self.0.compare(lhs, rhs)
    }

    fn find_short_separator(&self, from: &[u8], _to: &[u8], separator: &mut Vec<u8>) {
        separator.extend_from_slice(from);
    }

    fn find_short_successor(&self, key: &[u8], successor: &mut Vec<u8>) {
        successor.extend_from_slice(key);
    }
}
