use crc32c::{crc32c, crc32c_append};
use ember_vfs::traits::RandomAccess;

use crate::compressors::CompressorList;

use super::format::{BLOCK_TRAILER_LEN, BlockHandle, unmask_checksum};

/// A short-lived reader for any table block, wrapping the state that every block read off of a
/// given [`Table`](super::Table) needs.
///
/// The contents of the given `scratch_buffer` must be empty when first used.
pub struct TableBlockReader<'a, File> {
    pub file: &'a File,
    pub compressor_list: &'a CompressorList,
    pub verify_checksums: bool,
    pub scratch_buffer: &'a mut Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum BlockReadError {
    #[error("I/O error reading table block: {0}")]
    Io(#[from] std::io::Error),
    #[error("table block checksum mismatch")]
    ChecksumMismatch,
    #[error("table block uses an unknown compressor id {0}")]
    UnknownCompressor(u8),
    #[error("failed to decompress table block: {0}")]
    Decompress(#[from] crate::compressors::DecompressionError),
}

impl<File: RandomAccess> TableBlockReader<'_, File> {
    /// Read the block associated with `block_handle` from `self.file` into `block_buffer`
    /// (which must be empty), verifying its checksum if `self.verify_checksums` and
    /// decompressing it via `self.compressor_list`.
    pub fn read_table_block(
        &mut self,
        block_handle: BlockHandle,
        block_buffer: &mut Vec<u8>,
    ) -> Result<(), BlockReadError> {
        let block_size = usize::try_from(block_handle.block_size).unwrap_or(usize::MAX);

        self.scratch_buffer.resize(block_size + BLOCK_TRAILER_LEN, 0);
        self.file.read_exact_at(block_handle.offset, self.scratch_buffer)?;

        let (compressed_block, trailer) =
            self.scratch_buffer.split_at(self.scratch_buffer.len() - BLOCK_TRAILER_LEN);

        #[expect(clippy::unwrap_used, reason = "we split at len - BLOCK_TRAILER_LEN")]
        let trailer: &[u8; BLOCK_TRAILER_LEN] = trailer.try_into().unwrap();
        let compressor_id = trailer[0];
        #[expect(clippy::unwrap_used, reason = "BLOCK_TRAILER_LEN == 4 checksum bytes + 1")]
        let masked_checksum = u32::from_le_bytes(trailer[1..].try_into().unwrap());

        if self.verify_checksums {
            let unmasked = unmask_checksum(masked_checksum);
            let actual = crc32c_append(crc32c(compressed_block), &[compressor_id]);
            if unmasked != actual {
                return Err(BlockReadError::ChecksumMismatch);
            }
        }

        if compressor_id == 0 {
            block_buffer.extend_from_slice(compressed_block);
        } else if let Some(compressor) = self.compressor_list.get(compressor_id) {
            compressor.decode_into(compressed_block, block_buffer)?;
        } else {
            return Err(BlockReadError::UnknownCompressor(compressor_id));
        }

        self.scratch_buffer.clear();
        Ok(())
    }
}
