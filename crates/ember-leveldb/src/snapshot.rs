use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::format::SequenceNumber;

/// Tracks every sequence number a live snapshot is pinned to, so compaction knows which
/// superseded entries are still observable and must not be dropped.
#[derive(Debug, Default)]
pub(crate) struct SnapshotList {
    inner: Mutex<BTreeSet<u64>>,
}

impl SnapshotList {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The oldest sequence number any live snapshot is pinned to, or `None` if there are no
    /// live snapshots. Entries superseded at or before this sequence number, for a key absent
    /// from every snapshot, are safe to drop during compaction.
    #[must_use]
    pub fn oldest(&self) -> Option<SequenceNumber> {
        #[expect(clippy::unwrap_used, reason = "poisoning would mean a prior panic already occurred")]
        self.inner.lock().unwrap().iter().next().copied().map(SequenceNumber::new_unchecked)
    }

    fn insert(&self, sequence_number: u64) {
        #[expect(clippy::unwrap_used, reason = "poisoning would mean a prior panic already occurred")]
        self.inner.lock().unwrap().insert(sequence_number);
    }

    fn remove(&self, sequence_number: u64) {
        #[expect(clippy::unwrap_used, reason = "poisoning would mean a prior panic already occurred")]
        self.inner.lock().unwrap().remove(&sequence_number);
    }
}

/// A handle to a point-in-time view of the database. Reads made with
/// [`ReadOptions::snapshot`](crate::options::ReadOptions::snapshot) set only observe writes with
/// a sequence number at most the snapshot's. The snapshot stays pinned (and compaction retains
/// whatever data it needs) for as long as any clone of the handle is alive.
#[derive(Clone)]
pub struct SnapshotHandle {
    sequence_number: SequenceNumber,
    list: Arc<SnapshotList>,
    refcount: Arc<()>,
}

impl SnapshotHandle {
    pub(crate) fn new(sequence_number: SequenceNumber, list: Arc<SnapshotList>) -> Self {
        list.insert(sequence_number.inner());
        Self { sequence_number, list, refcount: Arc::new(()) }
    }

    #[must_use]
    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }
}

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        // Only release the sequence number once the last clone of this handle is gone.
        if Arc::strong_count(&self.refcount) == 1 {
            self.list.remove(self.sequence_number.inner());
        }
    }
}

impl std::fmt::Debug for SnapshotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotHandle").field("sequence_number", &self.sequence_number).finish()
    }
}
