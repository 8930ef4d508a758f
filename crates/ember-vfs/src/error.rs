use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::PoisonError;


/// A mutex guarding filesystem state was poisoned by a panicking holder.
#[derive(Debug, Clone, Copy)]
pub struct MutexPoisoned;

impl Display for MutexPoisoned {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "a mutex used by a filesystem implementation was poisoned")
    }
}

impl StdError for MutexPoisoned {}

impl<T> From<PoisonError<T>> for MutexPoisoned {
    #[inline]
    fn from(_err: PoisonError<T>) -> Self {
        Self
    }
}

/// An uninhabited error type, used where a fallible trait method can never actually fail
/// for a particular implementation.
#[derive(Debug, Clone, Copy)]
pub enum Never {}

impl Display for Never {
    fn fmt(&self, _f: &mut Formatter<'_>) -> FmtResult {
        match *self {}
    }
}

impl StdError for Never {}
