use std::cmp::Ordering;

use bijective_enum_map::injective_enum_map;
use thiserror::Error;

pub use crate::public_format::{EntryType, LengthPrefixedBytes, WriteEntry};


// ================================================================
//  Sequence numbers and internal keys
// ================================================================
//
// The teacher's version of this module represented keys as borrowed slices
// (`UserKey<'a>`, `EncodedInternalKey<'a>`, ...) and used an `unsafe` Polonius-style lifetime
// extension to hand them back out of short-lived borrows. That cannot be reproduced with
// confidence without compiler verification, which this project forbids itself from running, so
// internal keys here are always owned `Vec<u8>`s instead. See DESIGN.md for the writeup.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub const ZERO: Self = Self(0);
    pub const MAX_USABLE_SEQUENCE_NUMBER: Self = Self((1 << 56) - 2);
    pub const MAX_SEQUENCE_NUMBER: Self = Self((1 << 56) - 1);

    #[inline]
    #[must_use]
    pub const fn new_usable(sequence_number: u64) -> Option<Self> {
        if sequence_number <= Self::MAX_USABLE_SEQUENCE_NUMBER.0 {
            Some(Self(sequence_number))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn new_unchecked(sequence_number: u64) -> Self {
        Self(sequence_number)
    }

    #[inline]
    #[must_use]
    pub const fn inner(self) -> u64 {
        self.0
    }

    /// Attempts to return `SequenceNumber(self.0 + additional)`, checking that overflow does
    /// not occur and that the result is a valid and usable sequence number.
    #[inline]
    pub fn checked_add(self, additional: u64) -> Result<Self, OutOfSequenceNumbers> {
        let new_sequence_number = self.0.checked_add(additional).ok_or(OutOfSequenceNumbers)?;

        if new_sequence_number <= Self::MAX_USABLE_SEQUENCE_NUMBER.0 {
            Ok(Self(new_sequence_number))
        } else {
            Err(OutOfSequenceNumbers)
        }
    }
}

#[derive(Error, Debug, Clone, Copy)]
#[error("somehow, the maximum sequence number - which is over 72 quadrillion - was reached")]
pub struct OutOfSequenceNumbers;

#[inline]
#[must_use]
pub fn sequence_and_type_tag(sequence_number: SequenceNumber, entry_type: EntryType) -> u64 {
    (sequence_number.inner() << 8) | u64::from(u8::from(entry_type))
}

/// A fully-encoded internal key: `user_key ++ le_bytes(sequence_number << 8 | entry_type)`.
///
/// Internal keys sort by ascending user key, then descending sequence number, then descending
/// entry type, so that for a given user key the newest write (and, among equal sequence numbers,
/// a value over a deletion) sorts first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey(Vec<u8>);

impl InternalKey {
    /// The 8-byte tag is stored as the bitwise complement of `sequence_and_type_tag`, big-endian.
    /// This makes plain byte-lexicographic order on the tag bytes alone equivalent to descending
    /// order of the logical tag, so a raw `Vec<u8>` comparison of two encoded internal keys that
    /// share a user key (compared bytewise) already gives the right answer; see
    /// [`compare_internal_keys`] and [`crate::memtable::Memtable`], which both rely on this.
    #[must_use]
    pub fn new(user_key: &[u8], sequence_number: SequenceNumber, entry_type: EntryType) -> Self {
        let mut encoded = Vec::with_capacity(user_key.len() + 8);
        encoded.extend_from_slice(user_key);
        let tag = sequence_and_type_tag(sequence_number, entry_type);
        encoded.extend_from_slice(&(!tag).to_be_bytes());
        Self(encoded)
    }

    /// A key that compares just after every internal key sharing the same user key, used to
    /// seek to the first entry for `user_key` at or below `sequence_number`.
    #[must_use]
    pub fn new_lookup(user_key: &[u8], sequence_number: SequenceNumber) -> Self {
        Self::new(user_key, sequence_number, EntryType::MAX_TYPE)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    #[must_use]
    pub fn from_bytes(encoded: Vec<u8>) -> Self {
        Self(encoded)
    }

    pub fn decode(&self) -> Result<ParsedInternalKey<'_>, CorruptInternalKey> {
        let user_key_len = self.0.len().checked_sub(8).ok_or(CorruptInternalKey)?;
        #[expect(clippy::indexing_slicing, reason = "`user_key_len < self.0.len()`")]
        let (user_key, tag_bytes) = (&self.0[..user_key_len], &self.0[user_key_len..]);

        #[expect(clippy::unwrap_used, reason = "tag_bytes has length exactly 8")]
        let tag = !u64::from_be_bytes(tag_bytes.try_into().unwrap());
        let sequence_number = SequenceNumber::new_unchecked(tag >> 8);
        #[expect(clippy::cast_possible_truncation, reason = "truncation is intentional")]
        let entry_type = EntryType::try_from(tag as u8).map_err(|()| CorruptInternalKey)?;

        Ok(ParsedInternalKey { user_key, sequence_number, entry_type })
    }

    #[must_use]
    pub fn user_key(&self) -> &[u8] {
        #[expect(clippy::expect_used, reason = "a constructed InternalKey always has a tag")]
        let user_key_len = self.0.len().checked_sub(8).expect("InternalKey is at least 8 bytes");
        #[expect(clippy::indexing_slicing, reason = "see above")]
        &self.0[..user_key_len]
    }
}

#[derive(Debug, Error, Clone, Copy)]
#[error("internal key is shorter than the 8-byte sequence/type tag")]
pub struct CorruptInternalKey;

#[derive(Debug, Clone, Copy)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence_number: SequenceNumber,
    pub entry_type: EntryType,
}

/// Orders two encoded internal keys: ascending user key (per `user_cmp`), then descending
/// sequence number, then descending entry type.
///
/// Because the tag is stored complemented (see [`InternalKey::new`]), comparing the tag bytes
/// directly in ascending order already yields descending logical-tag order, so no decoding is
/// needed here.
#[must_use]
pub fn compare_internal_keys(user_cmp: &dyn Fn(&[u8], &[u8]) -> Ordering, lhs: &[u8], rhs: &[u8]) -> Ordering {
    let split = |key: &[u8]| key.len().checked_sub(8).map(|n| key.split_at(n));

    match (split(lhs), split(rhs)) {
        (Some((lhs_user, lhs_tag)), Some((rhs_user, rhs_tag))) => {
            user_cmp(lhs_user, rhs_user).then_with(|| lhs_tag.cmp(rhs_tag))
        }
        // Malformed keys (shorter than the tag) sort before well-formed ones; this only occurs
        // for corrupt data, never for keys this crate produces itself.
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

// ================================================================
//  Version edit tags
// ================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VersionEditTag {
    Comparator,
    LogNumber,
    NextFileNumber,
    LastSequence,
    CompactPointer,
    DeletedFile,
    NewFile,
    /// No longer used, but still tracked in case a MANIFEST from an older version is read.
    PrevLogNumber,
}

injective_enum_map! {
    VersionEditTag, u32,
    Comparator     <=> 1,
    LogNumber      <=> 2,
    NextFileNumber <=> 3,
    LastSequence   <=> 4,
    CompactPointer <=> 5,
    DeletedFile    <=> 6,
    NewFile        <=> 7,
    // Skipping 8 is intentional, matching historical LevelDB MANIFEST files.
    PrevLogNumber  <=> 9,
}

// ================================================================
//  File numbers
// ================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FileNumber(pub u64);

impl FileNumber {
    #[inline]
    pub fn next(self) -> Result<Self, OutOfFileNumbers> {
        self.0.checked_add(1).map(Self).ok_or(OutOfFileNumbers)
    }
}

#[derive(Error, Debug, Clone, Copy)]
#[error("somehow, the maximum file number - which is over 18 quintillion - was reached")]
pub struct OutOfFileNumbers;

// ================================================================
//  Write log format
// ================================================================

// Also see `crate::write_log::{WriteLogReader, WriteLogWriter}`, which handle a persistent format.

#[derive(Debug, Clone, Copy)]
pub(crate) enum WriteLogRecordType {
    Zero,
    Full,
    First,
    Middle,
    Last,
}

impl WriteLogRecordType {
    pub(crate) const ALL_TYPES: [Self; 5] = [
        Self::Zero, Self::Full, Self::First, Self::Middle, Self::Last,
    ];
}

injective_enum_map! {
    WriteLogRecordType, u8,
    Zero   <=> 0,
    Full   <=> 1,
    First  <=> 2,
    Middle <=> 3,
    Last   <=> 4,
}

pub(crate) trait IndexRecordTypes<T> {
    #[must_use]
    fn infallible_index(&self, record_type: WriteLogRecordType) -> &T;
}

impl<T> IndexRecordTypes<T> for [T; WriteLogRecordType::ALL_TYPES.len()] {
    fn infallible_index(&self, record_type: WriteLogRecordType) -> &T {
        #[expect(
            clippy::indexing_slicing,
            reason = "self.len() == ALL_TYPES.len() == 5, and the index is in 0..5",
        )]
        &self[usize::from(u8::from(record_type))]
    }
}

const CHECKSUM_MASK_DELTA: u32 = 0x_a282_ead8;

#[inline]
#[must_use]
pub(crate) const fn mask_checksum(unmasked: u32) -> u32 {
    unmasked.rotate_right(15).wrapping_add(CHECKSUM_MASK_DELTA)
}

#[inline]
#[must_use]
pub(crate) const fn unmask_checksum(masked: u32) -> u32 {
    masked.wrapping_sub(CHECKSUM_MASK_DELTA).rotate_left(15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_key_round_trips() {
        let key = InternalKey::new(b"hello", SequenceNumber::new_unchecked(42), EntryType::Value);
        let parsed = key.decode().unwrap();
        assert_eq!(parsed.user_key, b"hello");
        assert_eq!(parsed.sequence_number, SequenceNumber::new_unchecked(42));
        assert!(matches!(parsed.entry_type, EntryType::Value));
    }

    #[test]
    fn ordering_prefers_higher_sequence_number_for_equal_user_key() {
        let newer = InternalKey::new(b"k", SequenceNumber::new_unchecked(5), EntryType::Value);
        let older = InternalKey::new(b"k", SequenceNumber::new_unchecked(3), EntryType::Value);
        let cmp = |a: &[u8], b: &[u8]| a.cmp(b);
        assert_eq!(
            compare_internal_keys(&cmp, newer.as_bytes(), older.as_bytes()),
            Ordering::Less,
        );
    }

    #[test]
    fn checksum_mask_round_trips() {
        for value in [0_u32, 1, 0xdead_beef, u32::MAX] {
            assert_eq!(unmask_checksum(mask_checksum(value)), value);
        }
    }
}
