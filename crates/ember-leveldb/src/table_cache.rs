use std::sync::Arc;

use ember_sstable::table::{ReadTableOptions, Table};
use ember_sstable::{BlockCache, CacheKey, CompressorList, FilterPolicy, TableComparator};
use ember_vfs::traits::ReadableFilesystem;

use crate::comparator::InternalKeyComparator;
use crate::error::{Error, Result};
use crate::filename::table_file_name;
use crate::format::FileNumber;

/// Caches open [`Table`] handles (footer, index block, and filter block already parsed) across
/// lookups, so that repeated reads of the same SSTable don't re-open and re-parse it every time.
///
/// Reuses [`ember_sstable::BlockCache`], the same sharded LRU cache the table format itself uses
/// for decoded data blocks, keyed here by file number instead of `(file number, block offset)`.
pub(crate) struct TableCache<FS: ReadableFilesystem> {
    cache: BlockCache<u64, Table<FS::RandomAccessFile>>,
    compressor_list: Arc<CompressorList>,
    filter_policy: Option<Arc<dyn FilterPolicy + Send + Sync>>,
    comparator: Arc<dyn TableComparator + Send + Sync>,
    block_cache: Arc<BlockCache<CacheKey, Vec<u8>>>,
    verify_checksums: bool,
}

impl<FS: ReadableFilesystem> TableCache<FS> {
    #[must_use]
    pub fn new(
        capacity: usize,
        compressor_list: Arc<CompressorList>,
        filter_policy: Option<Arc<dyn FilterPolicy + Send + Sync>>,
        internal_comparator: Arc<InternalKeyComparator>,
        block_cache: Arc<BlockCache<CacheKey, Vec<u8>>>,
        verify_checksums: bool,
    ) -> Self {
        Self {
            cache: BlockCache::new(capacity),
            compressor_list,
            filter_policy,
            comparator: internal_comparator,
            block_cache,
            verify_checksums,
        }
    }

    /// Returns the open table for `file_number`, opening and caching it on a miss.
    pub fn get(
        &self,
        fs: &FS,
        db_directory: &std::path::Path,
        file_number: FileNumber,
        file_size: u64,
    ) -> Result<Arc<Table<FS::RandomAccessFile>>> {
        if let Some(table) = self.cache.get(&file_number.0) {
            return Ok(table);
        }

        let path = table_file_name(file_number).path_in(db_directory);
        let file = fs.open_random_access(&path).map_err(|e| Error::Corruption(format!("{path:?}: {e}")))?;

        let opts = ReadTableOptions {
            compressor_list: Arc::clone(&self.compressor_list),
            filter_policy: self.filter_policy.clone(),
            comparator: Arc::clone(&self.comparator),
            verify_checksums: self.verify_checksums,
            block_cache: Some(Arc::clone(&self.block_cache)),
        };

        let table = Table::new(opts, file, file_size, file_number.0)
            .map_err(|e| Error::Corruption(format!("opening table {}: {e:?}", file_number.0)))?;

        Ok(self.cache.insert(file_number.0, table))
    }

    pub fn evict(&self, file_number: FileNumber) {
        self.cache.erase(&file_number.0);
    }
}
