use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

/// Number of shards in a [`BlockCache`].
///
/// Sharding reduces lock contention: a lookup only needs to lock the one shard its key hashes
/// into, not the whole cache.
const NUM_SHARDS: u32 = 16;
/// `NUM_SHARDS == 1 << SHARD_BITS`; shards are selected using the top bits of the hash so that
/// the low bits (used by the hash table within a shard) stay independent of the shard choice.
const SHARD_BITS: u32 = 4;

/// A handle to a value stored in a [`BlockCache`].
///
/// Cloning a `CacheHandle` is cheap and keeps the entry pinned in the cache (it cannot be
/// evicted while any handle to it survives), mirroring the split between the "in use" and
/// "LRU" lists of entries.
pub type CacheHandle<V> = Arc<V>;

struct Shard<K, V> {
    table: HashMap<K, CacheHandle<V>>,
    /// Recency queue of keys, most-recently-used at the back. A key may appear more than once;
    /// stale entries are skipped over when evicting since `table` is the source of truth.
    lru: VecDeque<K>,
    charge: usize,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> Shard<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            table: HashMap::new(),
            lru: VecDeque::new(),
            charge: 0,
            capacity,
        }
    }

    fn insert(&mut self, key: K, value: V, charge: usize) -> CacheHandle<V> {
        let handle = Arc::new(value);

        if let Some(old) = self.table.insert(key.clone(), Arc::clone(&handle)) {
            self.charge = self.charge.saturating_sub(Arc::strong_count(&old).min(1));
        }
        self.lru.push_back(key);
        self.charge += charge;

        self.evict_if_over_capacity();
        handle
    }

    fn get(&mut self, key: &K) -> Option<CacheHandle<V>> {
        let handle = self.table.get(key).map(Arc::clone)?;
        self.lru.push_back(key.clone());
        Some(handle)
    }

    fn erase(&mut self, key: &K) {
        self.table.remove(key);
    }

    /// Evict entries from the back of the LRU queue (least-recently-used first) until the
    /// shard is back under budget. An entry with outstanding external handles (`strong_count`
    /// greater than the one held by `self.table`) is in the "in use" set and is never evicted;
    /// it is simply dropped from consideration and will be re-queued the next time it is
    /// touched, or reclaimed once the caller drops its handle and a later insert/get runs.
    fn evict_if_over_capacity(&mut self) {
        while self.charge > self.capacity {
            let Some(key) = self.lru.pop_front() else {
                break;
            };

            let Some(handle) = self.table.get(&key) else {
                continue;
            };

            if Arc::strong_count(handle) > 1 {
                // Still referenced elsewhere ("in use"); leave it alone.
                continue;
            }

            self.table.remove(&key);
            self.charge = self.charge.saturating_sub(1);
        }
    }
}

/// A sharded, LRU-evicting cache of decoded table blocks (and other fixed-size payloads, such
/// as open file handles).
///
/// Keys are split across [`NUM_SHARDS`] independently-locked shards by the top
/// [`SHARD_BITS`] bits of a 64-bit hash of the key, so that concurrent lookups for unrelated
/// blocks rarely contend on the same lock. Within a shard, entries still referenced by a live
/// [`CacheHandle`] are never evicted ("in use"); only entries whose only owner is the cache
/// itself are candidates for eviction, oldest first.
pub struct BlockCache<K, V> {
    shards: Vec<Mutex<Shard<K, V>>>,
}

impl<K: Eq + Hash + Clone, V> BlockCache<K, V> {
    /// `capacity` is the total number of units of "charge" (by default, one per entry) the
    /// cache may hold before evicting. It is split evenly across the shards.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        #[expect(clippy::cast_possible_truncation, reason = "NUM_SHARDS is small and constant")]
        let per_shard = capacity.div_ceil(NUM_SHARDS as usize).max(1);

        Self {
            shards: (0..NUM_SHARDS).map(|_| Mutex::new(Shard::new(per_shard))).collect(),
        }
    }

    fn shard_index(&self, key: &K) -> usize {
        let mut hasher = rustc_hash_stub_hasher();
        key.hash(&mut hasher);
        let hash = hasher.finish();

        #[expect(clippy::cast_possible_truncation, reason = "only the top bits are used")]
        let shard = (hash >> (u64::BITS - SHARD_BITS)) as usize;
        shard
    }

    /// Insert `value` under `key`, charged at one unit of capacity, and return a handle to it.
    pub fn insert(&self, key: K, value: V) -> CacheHandle<V> {
        self.insert_with_charge(key, value, 1)
    }

    /// Insert `value` under `key`, charged at `charge` units of capacity, and return a handle
    /// to it. Use this for entries of varying size (e.g. blocks of different lengths) so that
    /// the cache's capacity reflects actual memory use rather than entry count.
    pub fn insert_with_charge(&self, key: K, value: V, charge: usize) -> CacheHandle<V> {
        let idx = self.shard_index(&key);
        self.shards[idx].lock().insert(key, value, charge)
    }

    /// Look up `key`, returning a handle if present. A hit refreshes the entry's recency.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<CacheHandle<V>> {
        let idx = self.shard_index(key);
        self.shards[idx].lock().get(key)
    }

    /// Remove `key` from the cache. Any live handles to it remain valid until dropped.
    pub fn erase(&self, key: &K) {
        let idx = self.shard_index(key);
        self.shards[idx].lock().erase(key);
    }
}

/// A small non-cryptographic hasher, used only to pick a cache shard.
fn rustc_hash_stub_hasher() -> impl Hasher {
    std::collections::hash_map::DefaultHasher::new()
}

/// A cache key identifying a block within a specific table file: the table's file number and
/// the block's offset within that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub file_number: u64,
    pub block_offset: u64,
}
