// Import paths are not currently stable.
#![allow(
    warnings,
    reason = "this crate is very unstable. Allow checks to be done on full repo without noise.",
)]

mod comparator;
mod compaction;
mod config_constants;
mod db;
mod error;
mod filename;
mod format;
mod leveldb_iter;
mod logger;
mod memtable;
mod options;
mod public_format;
mod read_sampling;
mod snapshot;
mod table_cache;
mod version;
mod version_set;
mod write_batch;
mod write_log;

pub use self::comparator::{BytewiseComparator, Comparator};
pub use self::db::Db;
pub use self::error::{Error, Result};
pub use self::format::{FileNumber, SequenceNumber};
pub use self::logger::{InfoLogger, LogLevel, NoopLogger, TracingLogger};
pub use self::options::{CompressionType, Options, ReadOptions, WriteOptions};
pub use self::public_format::EntryType;
pub use self::snapshot::SnapshotHandle;
pub use self::write_batch::WriteBatch;
