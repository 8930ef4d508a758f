use integer_encoding::{VarInt as _, VarIntWriter as _};

use crate::format::SequenceNumber;
use crate::public_format::EntryType;

/// A sequence of `put`/`delete` operations to be applied atomically. Serializes to the same
/// format used for write-ahead log records: a `u64` base sequence number, a `u32` entry count,
/// then each entry as a one-byte [`EntryType`] tag followed by varint-length-prefixed key (and,
/// for `Value` entries, value) bytes.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    entries: Vec<u8>,
    count: u32,
}

/// Size of the batch header: an 8-byte sequence number followed by a 4-byte entry count.
pub(crate) const HEADER_LEN: usize = 8 + 4;

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.entries.push(u8::from(EntryType::Value));
        self.entries.write_varint(key.len()).expect("writing to a Vec never fails");
        self.entries.extend_from_slice(key);
        self.entries.write_varint(value.len()).expect("writing to a Vec never fails");
        self.entries.extend_from_slice(value);
        self.count += 1;
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.entries.push(u8::from(EntryType::Deletion));
        self.entries.write_varint(key.len()).expect("writing to a Vec never fails");
        self.entries.extend_from_slice(key);
        self.count += 1;
    }

    /// The number of `put`/`delete` operations added to this batch.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.count = 0;
    }

    /// Serialize this batch as a write log record, stamping it with `first_sequence_number` as
    /// the sequence number of its first entry (subsequent entries get consecutive numbers).
    #[must_use]
    pub(crate) fn encode(&self, first_sequence_number: SequenceNumber) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.entries.len());
        out.extend_from_slice(&first_sequence_number.inner().to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.entries);
        out
    }

    /// Parse a write log record previously produced by [`Self::encode`].
    pub(crate) fn decode(record: &[u8]) -> Result<(SequenceNumber, WriteBatchIter<'_>), DecodeError> {
        if record.len() < HEADER_LEN {
            return Err(DecodeError);
        }
        #[expect(clippy::indexing_slicing, reason = "checked above")]
        let (header, body) = (&record[..HEADER_LEN], &record[HEADER_LEN..]);
        #[expect(clippy::unwrap_used, reason = "header[0..8] has length 8")]
        let sequence_number = SequenceNumber::new_unchecked(u64::from_le_bytes(header[0..8].try_into().unwrap()));
        #[expect(clippy::unwrap_used, reason = "header[8..12] has length 4")]
        let count = u32::from_le_bytes(header[8..12].try_into().unwrap());

        Ok((sequence_number, WriteBatchIter { remaining: body, left: count }))
    }

    /// Number of bytes [`Self::encode`] would produce for this batch.
    #[must_use]
    pub(crate) fn approximate_encoded_size(&self) -> usize {
        HEADER_LEN + self.entries.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DecodeError;

pub(crate) struct WriteBatchIter<'a> {
    remaining: &'a [u8],
    left: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BatchEntry<'a> {
    Put { key: &'a [u8], value: &'a [u8] },
    Delete { key: &'a [u8] },
}

impl<'a> Iterator for WriteBatchIter<'a> {
    type Item = Result<BatchEntry<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.left == 0 {
            return None;
        }

        let result = (|| {
            let (&tag, rest) = self.remaining.split_first().ok_or(DecodeError)?;
            let entry_type = EntryType::try_from(tag).map_err(|()| DecodeError)?;

            let (key_len, varint_len) = u64::decode_var(rest).ok_or(DecodeError)?;
            let key_len = usize::try_from(key_len).map_err(|_| DecodeError)?;
            let rest = rest.get(varint_len..).ok_or(DecodeError)?;
            let (key, rest) = split_checked(rest, key_len)?;

            match entry_type {
                EntryType::Deletion => {
                    self.remaining = rest;
                    Ok(BatchEntry::Delete { key })
                }
                EntryType::Value => {
                    let (value_len, varint_len) = u64::decode_var(rest).ok_or(DecodeError)?;
                    let value_len = usize::try_from(value_len).map_err(|_| DecodeError)?;
                    let rest = rest.get(varint_len..).ok_or(DecodeError)?;
                    let (value, rest) = split_checked(rest, value_len)?;
                    self.remaining = rest;
                    Ok(BatchEntry::Put { key, value })
                }
            }
        })();

        self.left -= 1;
        Some(result)
    }
}

fn split_checked(src: &[u8], len: usize) -> Result<(&[u8], &[u8]), DecodeError> {
    if src.len() < len {
        Err(DecodeError)
    } else {
        Ok(src.split_at(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_puts_and_deletes() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.delete(b"b");
        batch.put(b"c", b"3");

        let encoded = batch.encode(SequenceNumber::new_unchecked(7));
        let (seq, iter) = WriteBatch::decode(&encoded).unwrap();
        assert_eq!(seq, SequenceNumber::new_unchecked(7));

        let entries: Vec<_> = iter.map(Result::unwrap).collect();
        assert!(matches!(entries[0], BatchEntry::Put { key: b"a", value: b"1" }));
        assert!(matches!(entries[1], BatchEntry::Delete { key: b"b" }));
        assert!(matches!(entries[2], BatchEntry::Put { key: b"c", value: b"3" }));
    }

    #[test]
    fn empty_batch_decodes_to_no_entries() {
        let batch = WriteBatch::new();
        let encoded = batch.encode(SequenceNumber::ZERO);
        let (_, iter) = WriteBatch::decode(&encoded).unwrap();
        assert_eq!(iter.count(), 0);
    }
}
