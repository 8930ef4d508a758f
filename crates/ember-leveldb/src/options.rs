use std::sync::Arc;

use ember_sstable::FilterPolicy;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::error::{Error, Result};
use crate::logger::{InfoLogger, TracingLogger};

/// Identifies which compressor ID (see [`ember_sstable::compressors::CompressorList`]) new data
/// blocks should be compressed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    None,
    #[default]
    Snappy,
}

impl CompressionType {
    #[must_use]
    pub(crate) const fn compressor_id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Snappy => 1,
        }
    }
}

/// Configuration consumed by [`Db::open`](crate::db::Db::open). Every tunable is a plain public
/// field; cross-field constraints are validated once, at `open` time, by [`Options::validate`],
/// rather than being enforced through a type-state builder.
#[derive(Clone)]
pub struct Options {
    pub comparator: Arc<dyn Comparator>,
    pub filter_policy: Option<Arc<dyn FilterPolicy + Send + Sync>>,
    pub compressor: CompressionType,
    pub logger: Arc<dyn InfoLogger>,

    pub create_if_missing: bool,
    pub error_if_exists: bool,
    pub paranoid_checks: bool,

    /// Target size, in bytes, of an uncompressed data block.
    pub block_size: usize,
    /// Number of keys between restart points within a block.
    pub block_restart_interval: usize,
    /// Size, in bytes, of the shared block cache.
    pub block_cache_capacity: usize,
    /// Number of open table files to keep cached.
    pub max_open_files: usize,

    /// Rotate the active memtable to an immutable one once it reaches this size, in bytes.
    pub write_buffer_size: usize,
    /// Target size, in bytes, of newly-written table files.
    pub target_file_size: u64,

    /// Mean number of bytes of iterator reads between read-sampling checks (see
    /// [`crate::read_sampling`]).
    pub iter_read_sample_period: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            comparator: Arc::new(BytewiseComparator),
            filter_policy: None,
            compressor: CompressionType::default(),
            logger: Arc::new(TracingLogger),

            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,

            block_size: 4 * 1024,
            block_restart_interval: 16,
            block_cache_capacity: 8 * 1024 * 1024,
            max_open_files: 1000,

            write_buffer_size: 4 * 1024 * 1024,
            target_file_size: 2 * 1024 * 1024,

            iter_read_sample_period: 1024 * 1024,
        }
    }
}

impl Options {
    /// Validates the cross-field constraints that a plain struct can't enforce at construction
    /// time. Called by [`Db::open`](crate::db::Db::open); returns [`Error::InvalidArgument`]
    /// rather than panicking so that a misconfigured `Options` fails the open call cleanly.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.block_restart_interval == 0 {
            return Err(Error::InvalidArgument(
                "block_restart_interval must be at least 1".to_owned(),
            ));
        }
        if self.block_size == 0 {
            return Err(Error::InvalidArgument("block_size must be at least 1".to_owned()));
        }
        if self.write_buffer_size == 0 {
            return Err(Error::InvalidArgument("write_buffer_size must be at least 1".to_owned()));
        }
        if self.target_file_size == 0 {
            return Err(Error::InvalidArgument("target_file_size must be at least 1".to_owned()));
        }
        if self.max_open_files < 4 {
            return Err(Error::InvalidArgument(
                "max_open_files must be at least 4 (table cache plus headroom)".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Small and cheap to clone, in the spirit of a `Copy` struct, though it cannot literally be
/// `Copy` since an active snapshot pins an `Arc`.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub verify_checksums: bool,
    pub fill_cache: bool,
    pub snapshot: Option<crate::snapshot::SnapshotHandle>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { verify_checksums: false, fill_cache: true, snapshot: None }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub sync: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_block_restart_interval() {
        let mut opts = Options::default();
        opts.block_restart_interval = 0;
        assert!(matches!(opts.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn default_options_validate() {
        assert!(Options::default().validate().is_ok());
    }
}
