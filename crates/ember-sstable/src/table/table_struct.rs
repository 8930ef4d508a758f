use std::sync::Arc;

use ember_vfs::traits::RandomAccess;
use seekable_iterator::{CursorLendingIterator as _, Seekable as _};

use crate::block::{Block, TableBlock};
use crate::cache::{BlockCache, CacheKey};
use crate::comparator::{ComparatorAdapter, MetaindexComparator, TableComparator};
use crate::compressors::CompressorList;
use crate::filter_block::FilterBlockReader;
use crate::filters::FilterPolicy;

use super::format::{BlockHandle, TableFooter};
use super::read::{BlockReadError, TableBlockReader};

#[derive(Clone)]
pub struct ReadTableOptions {
    pub compressor_list: Arc<CompressorList>,
    pub filter_policy: Option<Arc<dyn FilterPolicy + Send + Sync>>,
    pub comparator: Arc<dyn TableComparator + Send + Sync>,
    pub verify_checksums: bool,
    pub block_cache: Option<Arc<BlockCache<CacheKey, Vec<u8>>>>,
}

/// A read-only handle to a single on-disk SSTable.
///
/// Opening a `Table` reads its footer, metaindex block, optional filter block, and index
/// block up front; data blocks are read lazily (and, if a [`BlockCache`] is configured,
/// cached) as lookups and iteration touch them.
pub struct Table<File> {
    compressor_list: Arc<CompressorList>,
    verify_checksums: bool,

    file: File,
    file_number: u64,
    metaindex_offset: u64,

    block_cache: Option<Arc<BlockCache<CacheKey, Vec<u8>>>>,

    index_block: TableBlock<Vec<u8>, Arc<dyn TableComparator + Send + Sync>>,
    filter_block: Option<FilterBlockReader<Arc<dyn FilterPolicy + Send + Sync>, Vec<u8>>>,
}

impl<File: RandomAccess> Table<File> {
    /// Open a table backed by `file`, which must be exactly `file_size` bytes long and a
    /// valid encoded table. `file_number` identifies this table uniquely for cache keys.
    pub fn new(
        opts: ReadTableOptions,
        file: File,
        file_size: u64,
        file_number: u64,
    ) -> Result<Self, BlockReadError> {
        let mut footer_buf = vec![0_u8; TableFooter::ENCODED_LENGTH];
        let footer_offset = file_size.saturating_sub(
            u64::try_from(TableFooter::ENCODED_LENGTH).unwrap_or(u64::MAX),
        );
        file.read_exact_at(footer_offset, &mut footer_buf)?;
        let footer = TableFooter::decode_from(&footer_buf)
            .map_err(|()| BlockReadError::ChecksumMismatch)?;

        let mut scratch = Vec::new();
        let mut block_reader = TableBlockReader {
            file: &file,
            compressor_list: &opts.compressor_list,
            verify_checksums: opts.verify_checksums,
            scratch_buffer: &mut scratch,
        };

        let mut metaindex_buf = Vec::new();
        block_reader.read_table_block(footer.metaindex, &mut metaindex_buf)?;
        let metaindex_block = Block::new(metaindex_buf, ComparatorAdapter(MetaindexComparator));

        let filter_block = if let Some(policy) = opts.filter_policy.clone() {
            let mut key = super::FILTER_META_PREFIX.to_vec();
            key.extend_from_slice(policy.name());

            let mut iter = metaindex_block.iter();
            iter.seek(&key);

            if let Some((found_key, handle_bytes)) = iter.current() {
                if found_key == key {
                    if let Ok((handle, _)) = BlockHandle::decode_from(handle_bytes) {
                        let mut filter_buf = Vec::new();
                        block_reader.read_table_block(handle, &mut filter_buf)?;
                        Some(FilterBlockReader::new(policy, filter_buf))
                    } else {
                        None
                    }
                } else {
                    None
                }
            } else {
                None
            }
        } else {
            None
        };

        let mut index_buf = Vec::new();
        block_reader.read_table_block(footer.index, &mut index_buf)?;
        let index_block = Block::new(index_buf, ComparatorAdapter(Arc::clone(&opts.comparator)));

        Ok(Self {
            compressor_list: opts.compressor_list,
            verify_checksums: opts.verify_checksums,
            file,
            file_number,
            metaindex_offset: footer.metaindex.offset,
            block_cache: opts.block_cache,
            index_block,
            filter_block,
        })
    }

    /// Return the offset (within the table file) of the data block that would contain `key`,
    /// or the offset just past the last data block if `key` is greater than every key stored.
    #[must_use]
    pub fn approximate_offset_of_key(&self, key: &[u8]) -> u64 {
        let mut iter = self.index_block.iter();
        iter.seek(key);

        if let Some((_, encoded_handle)) = iter.current() {
            if let Ok((handle, _)) = BlockHandle::decode_from(encoded_handle) {
                return handle.offset;
            }
        }
        self.metaindex_offset
    }

    /// Look up `key` (which must compare exactly, per the table's comparator) and return its
    /// value, if present. Returns `Ok(None)` both when the key is absent and when the filter
    /// (if any) conclusively rules it out.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BlockReadError> {
        let mut index_iter = self.index_block.iter();
        index_iter.seek(key);

        let Some((_, encoded_handle)) = index_iter.current() else {
            return Ok(None);
        };
        let Ok((handle, _)) = BlockHandle::decode_from(encoded_handle) else {
            return Ok(None);
        };

        if let Some(filter) = &self.filter_block {
            if !filter.key_may_match(handle.offset, key) {
                return Ok(None);
            }
        }

        let block_contents = self.read_block(handle)?;
        let block = Block::new(block_contents, ComparatorAdapter(self.index_block.cmp.0.clone()));
        let mut data_iter = block.iter();
        data_iter.seek(key);

        Ok(data_iter.current().filter(|(k, _)| *k == key).map(|(_, v)| v.to_vec()))
    }

    /// Read and cache the data block at `handle`, returning its (decompressed) contents.
    pub(super) fn read_block(&self, handle: BlockHandle) -> Result<Vec<u8>, BlockReadError> {
        let cache_key = CacheKey {
            file_number: self.file_number,
            block_offset: handle.offset,
        };

        if let Some(cache) = &self.block_cache {
            if let Some(cached) = cache.get(&cache_key) {
                return Ok((*cached).clone());
            }
        }

        let mut scratch = Vec::new();
        let mut block_reader = TableBlockReader {
            file: &self.file,
            compressor_list: &self.compressor_list,
            verify_checksums: self.verify_checksums,
            scratch_buffer: &mut scratch,
        };

        let mut block_buffer = Vec::new();
        block_reader.read_table_block(handle, &mut block_buffer)?;

        if let Some(cache) = &self.block_cache {
            let charge = block_buffer.len().max(1);
            cache.insert_with_charge(cache_key, block_buffer.clone(), charge);
        }

        Ok(block_buffer)
    }

    #[must_use]
    pub const fn file_number(&self) -> u64 {
        self.file_number
    }

    pub(super) fn index_block_for_iter(
        &self,
    ) -> TableBlock<Vec<u8>, Arc<dyn TableComparator + Send + Sync>> {
        self.index_block.clone()
    }

    pub(super) fn comparator_adapter(&self) -> ComparatorAdapter<Arc<dyn TableComparator + Send + Sync>> {
        self.index_block.cmp.clone()
    }
}
