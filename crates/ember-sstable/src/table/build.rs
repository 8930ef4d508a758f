use std::io::{Result as IoResult, Write};
use std::sync::Arc;

use crc32c::{crc32c, crc32c_append};
use ember_vfs::traits::WritableFile;

use crate::block::BlockBuilder;
use crate::comparator::{ComparatorAdapter, TableComparator};
use crate::compressors::CompressorList;
use crate::filter_block::FilterBlockBuilder;
use crate::filters::FilterPolicy;

use super::{BLOCK_TRAILER_LEN, BlockHandle, FILTER_META_PREFIX, TableFooter, mask_checksum};

/// The default target size of a data block, before compression. Tables configured with a
/// larger `block_size` amortize the per-block restart-array and trailer overhead over more
/// data, at the cost of having to decompress more data per lookup.
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024;
/// One restart point is emitted every this many entries within a data or index block.
pub const DEFAULT_BLOCK_RESTART_INTERVAL: usize = 16;

#[derive(Clone)]
pub struct WriteTableOptions {
    pub comparator: Arc<dyn TableComparator + Send + Sync>,
    pub filter_policy: Option<Arc<dyn FilterPolicy + Send + Sync>>,
    pub compressor_id: u8,
    pub block_size: usize,
    pub block_restart_interval: usize,
}

/// Incrementally builds a [`Table`](super::Table).
///
/// Call [`add_entry`](Self::add_entry) with keys in increasing order (per the configured
/// comparator), then [`finish`](Self::finish) exactly once.
pub struct TableBuilder<File> {
    compressor_list: Arc<CompressorList>,
    compressor_id: u8,
    comparator: Arc<dyn TableComparator + Send + Sync>,

    table_file: File,
    offset_in_file: u64,
    num_entries: usize,

    block_restart_interval: usize,
    block_size_threshold: usize,

    data_block: BlockBuilder<ComparatorAdapter<Arc<dyn TableComparator + Send + Sync>>>,
    index_block: BlockBuilder<ComparatorAdapter<Arc<dyn TableComparator + Send + Sync>>>,
    filter_block: Option<FilterBlockBuilder<Arc<dyn FilterPolicy + Send + Sync>>>,

    last_key: Vec<u8>,
    pending_index_entry: bool,
    pending_handle: Option<BlockHandle>,

    scratch: Vec<u8>,
    compressed_scratch: Vec<u8>,
}

impl<File: Write + WritableFile> TableBuilder<File> {
    #[must_use]
    pub fn new(opts: &WriteTableOptions, compressor_list: Arc<CompressorList>, table_file: File) -> Self {
        let restart_interval = opts.block_restart_interval.max(1);

        Self {
            compressor_list,
            compressor_id: opts.compressor_id,
            comparator: Arc::clone(&opts.comparator),

            table_file,
            offset_in_file: 0,
            num_entries: 0,

            block_restart_interval: restart_interval,
            block_size_threshold: opts.block_size,

            data_block: BlockBuilder::new(restart_interval),
            index_block: BlockBuilder::new(restart_interval),
            filter_block: opts.filter_policy.clone().map(FilterBlockBuilder::new),

            last_key: Vec::new(),
            pending_index_entry: false,
            pending_handle: None,

            scratch: Vec::new(),
            compressed_scratch: Vec::new(),
        }
    }

    #[must_use]
    pub const fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// An estimate (an upper bound, modulo compression) of the length the file would have if
    /// [`finish`](Self::finish) were called now.
    #[must_use]
    pub fn estimated_finished_file_length(&self) -> u64 {
        self.offset_in_file
            + u64::try_from(self.data_block.finished_length()).unwrap_or(u64::MAX)
            + u64::try_from(BLOCK_TRAILER_LEN).unwrap_or(u64::MAX)
            + u64::try_from(TableFooter::ENCODED_LENGTH).unwrap_or(u64::MAX)
    }

    /// Add a key/value entry. `key` must compare strictly greater (per the configured
    /// comparator) than any previously-added key.
    pub fn add_entry(&mut self, key: &[u8], value: &[u8]) -> IoResult<()> {
        if self.pending_index_entry {
            debug_assert!(self.data_block.num_entries() == 0);

            self.scratch.clear();
            self.comparator.find_short_separator(&self.last_key, key, &mut self.scratch);

            #[expect(clippy::unwrap_used, reason = "self.pending_handle is set right before this flag")]
            let handle = self.pending_handle.take().unwrap();
            let mut handle_buf = [0_u8; BlockHandle::MAX_ENCODED_LENGTH];
            let handle_len = handle.encode_to(&mut handle_buf);

            let separator = std::mem::take(&mut self.scratch);
            self.index_block.add_entry(&separator, &handle_buf[..handle_len]);
            self.scratch = separator;

            self.pending_index_entry = false;
        }

        if let Some(filter_block) = &mut self.filter_block {
            filter_block.add_key(key);
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.num_entries += 1;
        self.data_block.add_entry(key, value);

        if self.data_block.finished_length() >= self.block_size_threshold {
            self.flush_data_block()?;
        }

        Ok(())
    }

    fn flush_data_block(&mut self) -> IoResult<()> {
        if self.data_block.num_entries() == 0 {
            return Ok(());
        }

        let handle = self.write_block_contents()?;
        self.pending_handle = Some(handle);
        self.pending_index_entry = true;

        self.data_block.reset();

        if let Some(filter_block) = &mut self.filter_block {
            #[expect(clippy::cast_possible_truncation, reason = "offsets fit comfortably in usize")]
            filter_block.start_block(handle.offset as usize);
        }

        Ok(())
    }

    fn write_block_contents(&mut self) -> IoResult<BlockHandle> {
        let cmp = ComparatorAdapter(Arc::clone(&self.comparator));
        let raw = self.data_block.finish_with_cmp(cmp);
        let raw_bytes = raw.contents;

        self.compressed_scratch.clear();

        let compressor = self.compressor_list.get(self.compressor_id);
        let (compressor_id, payload): (u8, &[u8]) = match compressor {
            Some(compressor) if self.compressor_id != 0 => {
                compressor
                    .encode_into(raw_bytes, &mut self.compressed_scratch)
                    .map_err(std::io::Error::other)?;
                (self.compressor_id, &self.compressed_scratch)
            }
            _ => (0, raw_bytes),
        };

        self.write_raw_block(payload, compressor_id)
    }

    fn write_raw_block(&mut self, payload: &[u8], compressor_id: u8) -> IoResult<BlockHandle> {
        let handle = BlockHandle {
            offset: self.offset_in_file,
            block_size: u64::try_from(payload.len()).unwrap_or(u64::MAX),
        };

        self.table_file.write_all(payload)?;

        let checksum = mask_checksum(crc32c_append(crc32c(payload), &[compressor_id]));

        let mut trailer = [0_u8; BLOCK_TRAILER_LEN];
        trailer[0] = compressor_id;
        trailer[1..].copy_from_slice(&checksum.to_le_bytes());
        self.table_file.write_all(&trailer)?;

        self.offset_in_file += u64::try_from(payload.len()).unwrap_or(0) + u64::try_from(BLOCK_TRAILER_LEN).unwrap_or(0);

        Ok(handle)
    }

    /// Finish writing the table: flush the final data block (if non-empty), write the filter
    /// block (if a filter policy is configured), the metaindex block, the index block, and the
    /// footer; then, if `sync_file_data`, call [`WritableFile::sync_data`].
    pub fn finish(mut self, sync_file_data: bool) -> IoResult<u64> {
        self.flush_data_block()?;

        if self.pending_index_entry {
            self.scratch.clear();
            self.comparator.find_short_successor(&self.last_key, &mut self.scratch);

            #[expect(clippy::unwrap_used, reason = "set by flush_data_block above")]
            let handle = self.pending_handle.take().unwrap();
            let mut handle_buf = [0_u8; BlockHandle::MAX_ENCODED_LENGTH];
            let handle_len = handle.encode_to(&mut handle_buf);

            let successor = std::mem::take(&mut self.scratch);
            self.index_block.add_entry(&successor, &handle_buf[..handle_len]);
            self.scratch = successor;
            self.pending_index_entry = false;
        }

        let filter_handle = if let Some(filter_block) = &mut self.filter_block {
            let finished = std::mem::take(filter_block.finish());
            Some(self.write_raw_block(&finished, 0)?)
        } else {
            None
        };

        let metaindex_cmp = ComparatorAdapter(crate::comparator::MetaindexComparator);
        let mut metaindex_block: BlockBuilder<ComparatorAdapter<crate::comparator::MetaindexComparator>> =
            BlockBuilder::new(self.block_restart_interval);
        if let (Some(handle), Some(filter_block)) = (filter_handle, &self.filter_block) {
            let mut key = Vec::with_capacity(FILTER_META_PREFIX.len() + filter_block.policy().name().len());
            key.extend_from_slice(FILTER_META_PREFIX);
            key.extend_from_slice(filter_block.policy().name());

            let mut handle_buf = [0_u8; BlockHandle::MAX_ENCODED_LENGTH];
            let handle_len = handle.encode_to(&mut handle_buf);
            metaindex_block.add_entry(&key, &handle_buf[..handle_len]);
        }
        let metaindex_contents = metaindex_block.finish_with_cmp(metaindex_cmp).contents.to_vec();
        let metaindex_handle = self.write_raw_block(&metaindex_contents, 0)?;

        let cmp = ComparatorAdapter(Arc::clone(&self.comparator));
        let index_contents = self.index_block.finish_with_cmp(cmp).contents.to_vec();
        let index_handle = self.write_raw_block(&index_contents, 0)?;

        let footer = TableFooter {
            metaindex: metaindex_handle,
            index: index_handle,
        };
        let mut footer_buf = [0_u8; TableFooter::ENCODED_LENGTH];
        footer.encode_to(&mut footer_buf);
        self.table_file.write_all(&footer_buf)?;
        self.offset_in_file += u64::try_from(footer_buf.len()).unwrap_or(0);

        if sync_file_data {
            self.table_file.sync_data()?;
        }

        Ok(self.offset_in_file)
    }
}
