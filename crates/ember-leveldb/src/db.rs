use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use ember_sstable::table::{Table, TableBuilder, TableIter, WriteTableOptions};
use ember_sstable::{BlockCache, CacheKey, CompressorList, TableComparator as _};
use ember_vfs::traits::{IntoDirectoryIterator as _, ReadableFilesystem, WritableFile, WritableFilesystem};
use seekable_iterator::{CursorLendingIterator, Seekable};

use crate::comparator::{Comparator, InternalKeyComparator};
use crate::compaction::{pick_compaction, CompactionPlan};
use crate::config_constants::{NUM_LEVELS, NUM_LEVELS_USIZE};
use crate::error::{Error, Result};
use crate::filename::{log_file_name, table_file_name, LevelDBFileName};
use crate::format::{EntryType, FileNumber, InternalKey, SequenceNumber};
use crate::logger::log_component;
use crate::memtable::{Memtable, MemtableValue};
use crate::options::{Options, ReadOptions, WriteOptions};
use crate::read_sampling::ReadSampler;
use crate::snapshot::{SnapshotHandle, SnapshotList};
use crate::table_cache::TableCache;
use crate::version::{user_key, FileMetadata, Version, VersionEdit};
use crate::version_set::VersionSet;
use crate::write_batch::{BatchEntry, WriteBatch};
use crate::write_log::{WriteLogReader, WriteLogWriter};

/// An embedded, ordered key-value store.
///
/// Unlike the teacher's `InnerGenericDB<LDBG, WriteImpl>`, which is parameterized over a whole
/// family of generic containers and refcounting strategies (`LdbContainer`, `LdbRwCell`,
/// `MirroredClone`), `Db` takes a single type parameter for the filesystem it runs on and keeps
/// every other piece of mutable state behind one lock. There is no background compaction thread:
/// a write that fills the memtable past `write_buffer_size` flushes and, if needed, compacts
/// synchronously before returning. See DESIGN.md for why.
pub struct Db<FS: WritableFilesystem> {
    options: Options,
    comparator: Arc<dyn Comparator>,
    db_directory: PathBuf,
    snapshots: Arc<SnapshotList>,
    inner: Mutex<DbInner<FS>>,
}

struct DbInner<FS: WritableFilesystem> {
    fs: FS,
    lockfile: FS::Lockfile,
    version_set: VersionSet,
    memtable: Memtable,
    log_writer: WriteLogWriter<FS::WriteFile>,
    log_file_number: FileNumber,
    manifest_writer: WriteLogWriter<FS::WriteFile>,
    table_cache: TableCache<FS>,
    snapshots: Arc<SnapshotList>,
    #[expect(dead_code, reason = "consulted by the DB-level iterator's scan, not by point lookups")]
    read_sampler: ReadSampler,
}

impl<FS: WritableFilesystem> Db<FS> {
    /// Opens (or, with `options.create_if_missing`, creates) a database rooted at `db_directory`.
    pub fn open(options: Options, mut fs: FS, db_directory: impl Into<PathBuf>) -> Result<Self> {
        options.validate()?;
        let db_directory = db_directory.into();
        let comparator = Arc::clone(&options.comparator);

        fs.create_dir_all(&db_directory)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        let lockfile = fs
            .create_and_lock(&LevelDBFileName::Lock.path_in(&db_directory), true)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        let current_path = LevelDBFileName::Current.path_in(&db_directory);
        let current_exists = fs
            .exists(&current_path)
            .map_err(|e| Error::Corruption(format!("checking for CURRENT: {e}")))?;

        if current_exists && options.error_if_exists {
            return Err(Error::InvalidArgument(format!("database already exists at {db_directory:?}")));
        }
        if !current_exists && !options.create_if_missing {
            return Err(Error::InvalidArgument(format!(
                "no database exists at {db_directory:?}, and create_if_missing is false",
            )));
        }

        let (version_set, recovered_memtable) = if current_exists {
            recover(&fs, &db_directory, Arc::clone(&comparator))?
        } else {
            (VersionSet::new(Arc::clone(&comparator)), Memtable::new(Arc::clone(&comparator)))
        };

        let (version_set, manifest_writer, log_writer, log_file_number) =
            rewrite_manifest_and_roll_log(&mut fs, &db_directory, version_set, &options)?;

        let block_cache: Arc<BlockCache<CacheKey, Vec<u8>>> = Arc::new(BlockCache::new(options.block_cache_capacity));
        let table_cache = TableCache::new(
            options.max_open_files,
            Arc::new(CompressorList::with_default_compressors()),
            options.filter_policy.clone(),
            Arc::new(InternalKeyComparator(Arc::clone(&comparator))),
            block_cache,
            options.paranoid_checks,
        );

        log_component!(options.logger, Info, "recovery", "opened database at {db_directory:?}");

        let snapshots = SnapshotList::new();
        let inner = DbInner {
            fs,
            lockfile,
            version_set,
            memtable: recovered_memtable,
            log_writer,
            log_file_number,
            manifest_writer,
            table_cache,
            snapshots: Arc::clone(&snapshots),
            read_sampler: ReadSampler::new(options.iter_read_sample_period, 0xd1ce),
        };

        let db = Self { comparator, db_directory, snapshots, options, inner: Mutex::new(inner) };

        {
            let mut inner = db.inner.lock();
            // If recovery replayed a non-empty write-ahead log into `memtable`, flush it to an L0
            // table before the old log becomes unreachable (its file number is no longer
            // `log_file_number`), matching LevelDB's own recovery-time flush.
            if !inner.memtable.is_empty() {
                inner.flush_memtable(&db.options, &db.comparator, &db.db_directory)?;
            }
            inner.remove_obsolete_files(&db.db_directory, &db.options);
        }

        Ok(db)
    }

    /// Releases the advisory lock on `LOCK`. The database may not be used again afterwards.
    pub fn close(self) -> Result<()> {
        let mut inner = self.inner.into_inner();
        inner
            .fs
            .unlock_and_close(inner.lockfile)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
    }

    pub fn put(&self, write_options: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(write_options, &batch)
    }

    pub fn delete(&self, write_options: &WriteOptions, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(write_options, &batch)
    }

    /// Atomically applies every operation in `batch`.
    pub fn write(&self, write_options: &WriteOptions, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.lock();
        inner.make_room_for_write(&self.options, &self.comparator, &self.db_directory)?;

        let first_sequence = inner
            .version_set
            .last_sequence()
            .checked_add(1)
            .map_err(|e| Error::Corruption(e.to_string()))?;
        let last_sequence = inner
            .version_set
            .last_sequence()
            .checked_add(u64::from(batch.len()))
            .map_err(|e| Error::Corruption(e.to_string()))?;

        let encoded = batch.encode(first_sequence);
        inner.log_writer.add_record(&encoded).map_err(|e| Error::Io(e.0))?;
        if write_options.sync {
            inner.log_writer.sync_log_data()?;
        }

        let (_, iter) = WriteBatch::decode(&encoded)
            .map_err(|_| Error::Corruption("just-encoded write batch failed to decode".to_owned()))?;
        let mut sequence = first_sequence;
        for entry in iter {
            let entry = entry
                .map_err(|_| Error::Corruption("just-encoded write batch entry failed to decode".to_owned()))?;
            match entry {
                BatchEntry::Put { key, value } => inner.memtable.add(sequence, EntryType::Value, key, value),
                BatchEntry::Delete { key } => inner.memtable.add(sequence, EntryType::Deletion, key, b""),
            }
            sequence = sequence.checked_add(1).map_err(|e| Error::Corruption(e.to_string()))?;
        }

        inner.version_set.set_last_sequence(last_sequence);
        Ok(())
    }

    /// Looks up `key`, honoring `read_options.snapshot` if set.
    pub fn get(&self, read_options: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        let snapshot_sequence = read_options
            .snapshot
            .as_ref()
            .map_or_else(|| inner.version_set.last_sequence(), SnapshotHandle::sequence_number);

        if let Some(result) = inner.memtable.get(key, snapshot_sequence) {
            return Ok(result);
        }

        let version = inner.version_set.current();
        let lookup_key = InternalKey::new_lookup(key, snapshot_sequence).into_bytes();

        for level in 0..NUM_LEVELS {
            for file in version.files(level) {
                if self.comparator.compare(user_key(&file.smallest_key), key) == Ordering::Greater
                    || self.comparator.compare(user_key(&file.largest_key), key) == Ordering::Less
                {
                    continue;
                }

                let table = inner.table_cache.get(&inner.fs, &self.db_directory, file.file_number, file.file_size)?;
                let found = point_lookup(&table, &lookup_key, key, self.comparator.as_ref())?;
                let _ = file.record_seek();

                if let Some(value) = found {
                    return Ok(value);
                }
            }
        }

        Ok(None)
    }

    /// Takes a consistent point-in-time view of the database.
    #[must_use]
    pub fn snapshot(&self) -> SnapshotHandle {
        let sequence = self.inner.lock().version_set.last_sequence();
        SnapshotHandle::new(sequence, Arc::clone(&self.snapshots))
    }

    /// Materializes every live user key/value pair within `[begin, end)` (or the whole keyspace,
    /// with `None` bounds) as of `read_options.snapshot`, in ascending key order.
    ///
    /// This is a simplified stand-in for the teacher's lazy, two-level streaming merge iterator
    /// (`mem_iter` + `imm_iter` + one iterator per table, merged and wrapped in a `DBIter`); see
    /// DESIGN.md for why a materialized snapshot is used instead.
    pub fn scan(&self, read_options: &ReadOptions, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        crate::leveldb_iter::scan(self, read_options, begin, end)
    }

    pub(crate) fn comparator(&self) -> &Arc<dyn Comparator> {
        &self.comparator
    }

    pub(crate) fn db_directory(&self) -> &Path {
        &self.db_directory
    }

    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&mut DbInner<FS>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Forces every file overlapping `[begin, end)` (unbounded ends allowed) down one level,
    /// repeatedly, until no such file remains above its target level.
    pub fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.memtable.is_empty() {
            inner.flush_memtable(&self.options, &self.comparator, &self.db_directory)?;
        }

        for level in 0..NUM_LEVELS - 1 {
            loop {
                let version = inner.version_set.current();
                let inputs = files_in_range(version.files(level), self.comparator.as_ref(), begin, end);
                if inputs.is_empty() {
                    break;
                }

                let (smallest, largest) = key_range(&inputs, self.comparator.as_ref());
                let next_level_inputs = version.overlapping_inputs(level + 1, self.comparator.as_ref(), &smallest, &largest);
                let grandparents = if level + 2 < NUM_LEVELS {
                    version.overlapping_inputs(level + 2, self.comparator.as_ref(), &smallest, &largest)
                } else {
                    Vec::new()
                };

                let plan = CompactionPlan { level, inputs, next_level_inputs, grandparents, next_compact_pointer: largest };
                inner.run_compaction(plan, &self.options, &self.comparator, &self.db_directory)?;
            }
        }

        Ok(())
    }

    /// A rough estimate, in bytes, of the on-disk size of `[begin, end)` for each requested range.
    #[must_use]
    pub fn approximate_sizes(&self, ranges: &[(Vec<u8>, Vec<u8>)]) -> Vec<u64> {
        let inner = self.inner.lock();
        let version = inner.version_set.current();

        ranges
            .iter()
            .map(|(begin, end)| {
                let mut total = 0_u64;
                for level in 0..NUM_LEVELS {
                    for file in files_in_range(version.files(level), self.comparator.as_ref(), Some(begin), Some(end)) {
                        total += file.file_size;
                    }
                }
                total
            })
            .collect()
    }

    /// Exposes a handful of internal counters, matching LevelDB's `GetProperty` surface.
    /// Recognized names: `"leveldb.num-files-at-levelN"`, `"leveldb.sequence"`.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        let inner = self.inner.lock();
        if let Some(level) = name.strip_prefix("leveldb.num-files-at-level") {
            let level: u8 = level.parse().ok()?;
            return Some(inner.version_set.current().files(level).len().to_string());
        }
        if name == "leveldb.sequence" {
            return Some(inner.version_set.last_sequence().inner().to_string());
        }
        None
    }
}

impl<FS: WritableFilesystem> DbInner<FS> {
    /// Rotates the active memtable (and, if the level-0 file count or memtable usage calls for
    /// it, runs a compaction) before a write is allowed to proceed. Synchronous and inline, per
    /// the simplification documented on [`Db`].
    fn make_room_for_write(&mut self, options: &Options, comparator: &Arc<dyn Comparator>, db_directory: &Path) -> Result<()> {
        if self.memtable.approximate_memory_usage() >= options.write_buffer_size {
            self.flush_memtable(options, comparator, db_directory)?;
        }
        self.maybe_compact(options, comparator, db_directory)
    }

    fn flush_memtable(&mut self, options: &Options, comparator: &Arc<dyn Comparator>, db_directory: &Path) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let file_number = self.version_set.new_file_number()?;
        let path = table_file_name(file_number).path_in(db_directory);
        let file = self
            .fs
            .open_writable(&path, true)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        let write_opts = write_table_options(options, comparator);
        let mut builder = TableBuilder::new(&write_opts, Arc::new(CompressorList::with_default_compressors()), file);

        let (mut smallest, mut largest) = (Vec::new(), Vec::new());
        self.memtable.for_each(|key, value| {
            if smallest.is_empty() {
                smallest = key.to_vec();
            }
            largest = key.to_vec();
            let value = match value {
                MemtableValue::Value(v) => v.as_slice(),
                MemtableValue::Deletion => &[],
            };
            let _ = builder.add_entry(key, value);
        });

        let file_size = builder.finish(true)?;

        let new_log_number = self.version_set.new_file_number()?;
        let new_log_path = log_file_name(new_log_number).path_in(db_directory);
        let new_log_file = self
            .fs
            .open_writable(&new_log_path, true)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        let mut edit = VersionEdit::new();
        edit.log_number = Some(new_log_number);
        edit.add_file(0, FileMetadata::new(file_number, file_size, smallest, largest));
        self.version_set.log_and_apply(&mut self.manifest_writer, edit)?;

        self.memtable = Memtable::new(Arc::clone(comparator));
        self.log_writer = WriteLogWriter::new_empty(new_log_file);
        self.log_file_number = new_log_number;

        log_component!(options.logger, Info, "compaction", "flushed memtable to L0 file {}", file_number.0);
        self.remove_obsolete_files(db_directory, options);
        Ok(())
    }

    fn maybe_compact(&mut self, options: &Options, comparator: &Arc<dyn Comparator>, db_directory: &Path) -> Result<()> {
        for _ in 0..4 {
            let version = self.version_set.current();
            let compact_pointers: [Option<Vec<u8>>; NUM_LEVELS_USIZE] =
                std::array::from_fn(|level| self.version_set.compact_pointer(level as u8).map(<[u8]>::to_vec));

            let Some(plan) = pick_compaction(&version, comparator.as_ref(), &compact_pointers, options.target_file_size) else {
                break;
            };
            self.run_compaction(plan, options, comparator, db_directory)?;
        }
        Ok(())
    }

    fn run_compaction(
        &mut self,
        plan: CompactionPlan,
        options: &Options,
        comparator: &Arc<dyn Comparator>,
        db_directory: &Path,
    ) -> Result<()> {
        let tables: Result<Vec<_>> = plan
            .inputs
            .iter()
            .chain(&plan.next_level_inputs)
            .map(|f| self.table_cache.get(&self.fs, db_directory, f.file_number, f.file_size))
            .collect();
        let tables = tables?;
        let mut cursors: Vec<_> = tables.iter().map(|t| TableIter::new(t)).collect();
        for cursor in &mut cursors {
            cursor.seek_to_first();
        }

        let internal_comparator = InternalKeyComparator(Arc::clone(comparator));
        let smallest_snapshot = self.snapshots.oldest().unwrap_or_else(|| self.version_set.last_sequence());
        let output_level = plan.level + 1;
        let is_base_level = output_level + 1 >= NUM_LEVELS;
        let grandparent_limit = plan.grandparent_overlap_limit(options.target_file_size);

        let write_opts = write_table_options(options, comparator);
        let compressor_list = Arc::new(CompressorList::with_default_compressors());

        let mut new_files = Vec::new();
        let mut builder: Option<TableBuilder<FS::WriteFile>> = None;
        let mut output_file_number = FileNumber(0);
        let mut output_smallest = Vec::new();
        let mut output_largest = Vec::new();
        let mut grandparent_bytes_consumed = 0_u64;

        let mut current_user_key: Option<Vec<u8>> = None;
        let mut last_sequence_for_key = SequenceNumber::MAX_SEQUENCE_NUMBER;

        loop {
            let Some(index) = pick_smallest(&cursors, &internal_comparator) else { break };
            let (key, value) = {
                #[expect(clippy::expect_used, reason = "pick_smallest only returns indices with a current entry")]
                let (key, value) = cursors[index].current().expect("just selected a valid cursor");
                (key.to_vec(), value.to_vec())
            };

            let internal_key = InternalKey::from_bytes(key.clone());
            let parsed = internal_key
                .decode()
                .map_err(|_| Error::Corruption("corrupt internal key during compaction".to_owned()))?;

            let is_new_key = current_user_key
                .as_deref()
                .is_none_or(|k| comparator.compare(k, parsed.user_key) != Ordering::Equal);
            if is_new_key {
                current_user_key = Some(parsed.user_key.to_vec());
                last_sequence_for_key = SequenceNumber::MAX_SEQUENCE_NUMBER;
            }

            let drop = if last_sequence_for_key <= smallest_snapshot {
                true
            } else {
                matches!(parsed.entry_type, EntryType::Deletion) && parsed.sequence_number <= smallest_snapshot && is_base_level
            };
            last_sequence_for_key = parsed.sequence_number;
            let parsed_user_key = parsed.user_key.to_vec();

            if !drop {
                if builder.is_none() {
                    output_file_number = self.version_set.new_file_number()?;
                    let path = table_file_name(output_file_number).path_in(db_directory);
                    let file = self.fs.open_writable(&path, true).map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
                    builder = Some(TableBuilder::new(&write_opts, Arc::clone(&compressor_list), file));
                    output_smallest = key.clone();
                    grandparent_bytes_consumed = 0;
                }
                #[expect(clippy::unwrap_used, reason = "just ensured Some above")]
                let b = builder.as_mut().unwrap();
                b.add_entry(&key, &value)?;
                output_largest = key.clone();

                for grandparent in &plan.grandparents {
                    if comparator.compare(user_key(&grandparent.smallest_key), &parsed_user_key) != Ordering::Greater
                        && comparator.compare(user_key(&grandparent.largest_key), &parsed_user_key) != Ordering::Less
                    {
                        grandparent_bytes_consumed += 1;
                    }
                }

                #[expect(clippy::unwrap_used, reason = "just ensured Some above")]
                let finished_len = builder.as_ref().unwrap().estimated_finished_file_length();
                if finished_len >= options.target_file_size || grandparent_bytes_consumed >= grandparent_limit {
                    #[expect(clippy::unwrap_used, reason = "just ensured Some above")]
                    let finished_builder = builder.take().unwrap();
                    let file_size = finished_builder.finish(true)?;
                    new_files.push(FileMetadata::new(
                        output_file_number,
                        file_size,
                        std::mem::take(&mut output_smallest),
                        std::mem::take(&mut output_largest),
                    ));
                }
            }

            cursors[index].next();
        }

        if let Some(finished_builder) = builder {
            let file_size = finished_builder.finish(true)?;
            new_files.push(FileMetadata::new(output_file_number, file_size, output_smallest, output_largest));
        }

        let mut edit = VersionEdit::new();
        for file in &plan.inputs {
            edit.delete_file(plan.level, file.file_number);
        }
        for file in &plan.next_level_inputs {
            edit.delete_file(output_level, file.file_number);
        }
        for metadata in new_files {
            edit.add_file(output_level, metadata);
        }
        if !plan.next_compact_pointer.is_empty() {
            edit.compact_pointers.push((plan.level, plan.next_compact_pointer));
        }

        log_component!(
            options.logger,
            Info,
            "compaction",
            "compacted level {} ({} + {} inputs) into level {}",
            plan.level,
            plan.inputs.len(),
            plan.next_level_inputs.len(),
            output_level,
        );

        self.version_set.log_and_apply(&mut self.manifest_writer, edit)?;
        self.remove_obsolete_files(db_directory, options);
        Ok(())
    }

    /// Accessors used by [`crate::leveldb_iter::scan`], which runs outside this module and so
    /// cannot reach `DbInner`'s private fields directly.
    pub(crate) fn last_sequence(&self) -> SequenceNumber {
        self.version_set.last_sequence()
    }

    pub(crate) fn memtable(&self) -> &Memtable {
        &self.memtable
    }

    pub(crate) fn current_version(&self) -> Arc<Version> {
        self.version_set.current()
    }

    pub(crate) fn table_cache(&self) -> &TableCache<FS> {
        &self.table_cache
    }

    pub(crate) fn fs(&self) -> &FS {
        &self.fs
    }

    fn remove_obsolete_files(&mut self, db_directory: &Path, options: &Options) {
        let Ok(children) = self.fs.children(db_directory) else { return };
        let live_tables: std::collections::HashSet<u64> = {
            let version = self.version_set.current();
            (0..NUM_LEVELS)
                .flat_map(|level| version.files(level).iter().map(|f| f.file_number.0).collect::<Vec<_>>())
                .collect()
        };
        let current_log = self.log_file_number;
        let current_manifest = self.version_set.manifest_file_number();

        for entry in children.dir_iter() {
            let Ok(entry) = entry else { continue };
            let Some(name) = entry.file_name().and_then(|n| n.to_str()).map(str::to_owned) else { continue };
            let parsed = LevelDBFileName::parse(&name);
            let obsolete = match parsed {
                LevelDBFileName::Table { file_number } => !live_tables.contains(&file_number),
                LevelDBFileName::Log { file_number } => FileNumber(file_number) != current_log,
                LevelDBFileName::Manifest { file_number } => FileNumber(file_number) != current_manifest,
                LevelDBFileName::Current | LevelDBFileName::Lock | LevelDBFileName::Unknown => false,
            };
            if obsolete {
                let path = db_directory.join(&name);
                if self.fs.delete(&path).is_ok() {
                    log_component!(options.logger, Debug, "compaction", "removed obsolete file {name}");
                }
            }
        }
    }
}

fn write_table_options(options: &Options, comparator: &Arc<dyn Comparator>) -> WriteTableOptions {
    WriteTableOptions {
        comparator: Arc::new(InternalKeyComparator(Arc::clone(comparator))),
        filter_policy: options.filter_policy.clone(),
        compressor_id: options.compressor.compressor_id(),
        block_size: options.block_size,
        block_restart_interval: options.block_restart_interval,
    }
}

/// Finds the most recent record for `user_key` at or below the sequence number encoded in
/// `lookup_key`. Returns `Ok(None)` if the table has no entry for `user_key` at all,
/// `Ok(Some(None))` for a tombstone, and `Ok(Some(Some(value)))` for a live value.
fn point_lookup<File: ember_vfs::traits::RandomAccess>(
    table: &Table<File>,
    lookup_key: &[u8],
    user_key: &[u8],
    comparator: &dyn Comparator,
) -> Result<Option<Option<Vec<u8>>>> {
    let mut iter = TableIter::new(table);
    iter.seek(lookup_key);
    let Some((found_key, found_value)) = iter.current() else { return Ok(None) };

    let internal_key = InternalKey::from_bytes(found_key.to_vec());
    let parsed = internal_key
        .decode()
        .map_err(|_| Error::Corruption("corrupt internal key in table".to_owned()))?;
    if comparator.compare(parsed.user_key, user_key) != Ordering::Equal {
        return Ok(None);
    }

    Ok(Some(match parsed.entry_type {
        EntryType::Value => Some(found_value.to_vec()),
        EntryType::Deletion => None,
    }))
}

fn pick_smallest<File: ember_vfs::traits::RandomAccess>(
    cursors: &[TableIter<'_, File>],
    comparator: &InternalKeyComparator,
) -> Option<usize> {
    let mut best: Option<(usize, &[u8])> = None;
    for (index, cursor) in cursors.iter().enumerate() {
        if let Some((key, _)) = cursor.current() {
            best = match best {
                None => Some((index, key)),
                Some((best_index, best_key)) => {
                    if comparator.cmp(key, best_key) == Ordering::Less {
                        Some((index, key))
                    } else {
                        Some((best_index, best_key))
                    }
                }
            };
        }
    }
    best.map(|(index, _)| index)
}

fn files_in_range(
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

fn key_range(files: &[Arc<FileMetadata>], comparator: &dyn Comparator) -> (Vec<u8>, Vec<u8>) {
    #[expect(clippy::expect_used, reason = "callers only ever pass non-empty file lists")]
    let first = files.first().expect("key_range called with no files");
    let mut smallest = first.smallest_key.clone();
    let mut largest = first.largest_key.clone();
    for file in files {
        if comparator.compare(&file.smallest_key, &smallest) == Ordering::Less {
            smallest = file.smallest_key.clone();
        }
        if comparator.compare(&file.largest_key, &largest) == Ordering::Greater {
            largest = file.largest_key.clone();
        }
    }
    (smallest, largest)
}

/// Replays the write-ahead log named by `version_set.log_number()` into a fresh memtable, since
/// records written after the last manifest checkpoint are not yet reflected in any `Version`.
fn recover<FS: ReadableFilesystem + WritableFilesystem>(
    fs: &FS,
    db_directory: &Path,
    comparator: Arc<dyn Comparator>,
) -> Result<(VersionSet, Memtable)> {
    let mut version_set = VersionSet::recover(fs, db_directory, Arc::clone(&comparator))?;
    let memtable = Memtable::new(Arc::clone(&comparator));

    let log_path = log_file_name(version_set.log_number()).path_in(db_directory);
    if fs.exists(&log_path).unwrap_or(false) {
        let log_file = fs
            .open_sequential(&log_path)
            .map_err(|e| Error::Corruption(format!("cannot open {log_path:?}: {e}")))?;
        let mut reader = WriteLogReader::new(log_file);

        while let Some(record) = reader.next_record().map_err(|e| Error::Io(e.0))? {
            let (first_sequence, iter) = WriteBatch::decode(&record)
                .map_err(|_| Error::Corruption("malformed write-ahead log record".to_owned()))?;
            let mut sequence = first_sequence;
            let mut highest_sequence = first_sequence;
            for entry in iter {
                let entry = entry.map_err(|_| Error::Corruption("malformed write-ahead log entry".to_owned()))?;
                match entry {
                    BatchEntry::Put { key, value } => memtable.add(sequence, EntryType::Value, key, value),
                    BatchEntry::Delete { key } => memtable.add(sequence, EntryType::Deletion, key, b""),
                }
                highest_sequence = sequence;
                sequence = sequence.checked_add(1).map_err(|e| Error::Corruption(e.to_string()))?;
            }
            if highest_sequence > version_set.last_sequence() {
                version_set.set_last_sequence(highest_sequence);
            }
        }
    }

    Ok((version_set, memtable))
}

/// Consolidates the recovered (or fresh) version set into a brand-new MANIFEST file and rolls
/// onto a brand-new write-ahead log, so that `open` never has to reopen an existing MANIFEST or
/// log for appending at an offset. A simplification relative to the teacher's manifest reuse; see
/// DESIGN.md.
#[expect(clippy::type_complexity, reason = "the alternative is a dedicated struct used exactly once")]
fn rewrite_manifest_and_roll_log<FS: WritableFilesystem>(
    fs: &mut FS,
    db_directory: &Path,
    mut version_set: VersionSet,
    options: &Options,
) -> Result<(VersionSet, WriteLogWriter<FS::WriteFile>, WriteLogWriter<FS::WriteFile>, FileNumber)> {
    let manifest_file_number = version_set.new_file_number()?;
    let manifest_path = LevelDBFileName::Manifest { file_number: manifest_file_number.0 }.path_in(db_directory);
    let manifest_file = fs
        .open_writable(&manifest_path, true)
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    let mut manifest_writer = WriteLogWriter::new_empty(manifest_file);

    let log_file_number = version_set.new_file_number()?;
    let log_path = log_file_name(log_file_number).path_in(db_directory);
    let log_file = fs.open_writable(&log_path, true).map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    let log_writer = WriteLogWriter::new_empty(log_file);

    version_set.set_manifest_file_number(manifest_file_number);

    let mut edit = VersionEdit::new();
    edit.comparator_name = Some(options.comparator.name().as_bytes().to_vec());
    edit.log_number = Some(log_file_number);
    {
        let current = version_set.current();
        for level in 0..NUM_LEVELS {
            for file in current.files(level) {
                edit.add_file(
                    level,
                    FileMetadata::new(file.file_number, file.file_size, file.smallest_key.clone(), file.largest_key.clone()),
                );
            }
        }
    }
    version_set.log_and_apply(&mut manifest_writer, edit)?;

    let current_path = LevelDBFileName::Current.path_in(db_directory);
    let mut current_file =
        fs.open_writable(&current_path, true).map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    let manifest_name = LevelDBFileName::Manifest { file_number: manifest_file_number.0 }.file_name();
    current_file.write_all(format!("{manifest_name}\n").as_bytes()).map_err(Error::Io)?;
    current_file.sync_data().map_err(Error::Io)?;

    Ok((version_set, manifest_writer, log_writer, log_file_number))
}
