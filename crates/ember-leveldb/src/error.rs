use thiserror::Error;

/// The error type returned by every fallible public operation on [`Db`](crate::db::Db).
///
/// Besides `Io`, every variant is something a well-formed database should never produce, so
/// callers can generally treat anything but `Io` as unrecoverable for the affected database.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The database's on-disk data is inconsistent with its own format: a bad checksum, a
    /// truncated record, or a MANIFEST/log entry that could not be decoded.
    #[error("corruption: {0}")]
    Corruption(String),

    /// An `Options`, `ReadOptions`, or `WriteOptions` value failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested operation is not supported by this build or configuration.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Reserved for internal plumbing; the public `Get` API surfaces a miss as `Ok(None)`
    /// rather than this variant.
    #[error("not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, Error>;
