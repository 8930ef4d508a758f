use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Arc;

use integer_encoding::{VarInt as _, VarIntWriter as _};

use crate::comparator::Comparator;
use crate::config_constants::{MAX_BYTES_FOR_L1, MAX_BYTES_MULTIPLIER, NUM_LEVELS_USIZE};
use crate::format::{FileNumber, SequenceNumber, VersionEditTag};

/// On-disk metadata for one sorted table file.
///
/// The teacher's version packed the smallest/largest user keys into a single shared buffer and
/// derived `InternalKey`s from it on demand, relying on its borrowed-key types. With internal
/// keys now owned `Vec<u8>`s (see `crate::format`), there is no benefit to that packing, so the
/// two encoded internal keys are stored directly; see DESIGN.md.
#[derive(Debug)]
pub(crate) struct FileMetadata {
    pub file_number: FileNumber,
    pub file_size: u64,
    /// Encoded internal key.
    pub smallest_key: Vec<u8>,
    /// Encoded internal key.
    pub largest_key: Vec<u8>,
    allowed_seeks: AtomicI64,
}

/// A file may be seeked into this many times, across every read that doesn't hit a lower level
/// first, before it becomes a compaction candidate on its own.
const SEEKS_PER_MEBIBYTE_ALLOWANCE: u64 = 16384;
const MIN_ALLOWED_SEEKS: i64 = 100;

impl FileMetadata {
    #[must_use]
    pub fn new(file_number: FileNumber, file_size: u64, smallest_key: Vec<u8>, largest_key: Vec<u8>) -> Self {
        #[expect(clippy::integer_division, reason = "exact value does not matter")]
        let allowed_seeks = (file_size / SEEKS_PER_MEBIBYTE_ALLOWANCE) as i64;
        let allowed_seeks = allowed_seeks.max(MIN_ALLOWED_SEEKS);

        Self { file_number, file_size, smallest_key, largest_key, allowed_seeks: AtomicI64::new(allowed_seeks) }
    }

    /// Record a seek that passed over this file without finding the key. Returns `true` once the
    /// file has been seeked into enough times that it should be scheduled for compaction on its
    /// own, independent of the usual size-triggered compactions.
    pub fn record_seek(&self) -> bool {
        self.allowed_seeks.fetch_sub(1, AtomicOrdering::Relaxed) <= 1
    }
}

/// An immutable, fully-described state of the database's on-disk files, organized by level.
/// Accessed through `Arc<Version>`; a new `Version` is built (never mutated) each time a
/// `VersionEdit` is applied, so readers can keep using an old `Version` for as long as they hold
/// an `Arc` to it, even after a later compaction installs a newer one.
#[derive(Debug, Default)]
pub(crate) struct Version {
    levels: [Vec<Arc<FileMetadata>>; NUM_LEVELS_USIZE],
}

impl Version {
    #[must_use]
    pub fn files(&self, level: u8) -> &[Arc<FileMetadata>] {
        #[expect(clippy::expect_used, reason = "callers only ever pass levels < NUM_LEVELS")]
        self.levels.get(usize::from(level)).expect("level out of range")
    }

    #[must_use]
    pub fn total_file_size(&self, level: u8) -> u64 {
        self.files(level).iter().map(|f| f.file_size).sum()
    }

    /// Every file whose key range can overlap `[smallest, largest]` at `level`. For level 0,
    /// files may overlap each other, so the search also expands to cover any file transitively
    /// reachable through an overlap; for level >= 1, files are disjoint and sorted, so a single
    /// contiguous run suffices.
    pub fn overlapping_inputs(
        &self,
        level: u8,
        comparator: &dyn Comparator,
        smallest: &[u8],
        largest: &[u8],
    ) -> Vec<Arc<FileMetadata>> {
        let user_cmp = |a: &[u8], b: &[u8]| comparator.compare(a, b);
        let mut smallest = smallest.to_vec();
        let mut largest = largest.to_vec();
        let mut result = Vec::new();

        loop {
            result.clear();
            let mut expanded = false;

            for file in self.files(level) {
                let file_smallest = user_key(&file.smallest_key);
                let file_largest = user_key(&file.largest_key);
                let before = user_cmp(file_largest, &smallest) == Ordering::Less;
                let after = user_cmp(file_smallest, &largest) == Ordering::Greater;

                if !before && !after {
                    if level == 0 {
                        if user_cmp(file_smallest, &smallest) == Ordering::Less {
                            smallest = file_smallest.to_vec();
                            expanded = true;
                        }
                        if user_cmp(file_largest, &largest) == Ordering::Greater {
                            largest = file_largest.to_vec();
                            expanded = true;
                        }
                    }
                    result.push(Arc::clone(file));
                }
            }

            if !expanded {
                break;
            }
        }

        result
    }

    /// Picks the highest level at which `[smallest, largest]` can be placed without immediately
    /// overlapping more than a handful of grandparent-level bytes, per the usual LevelDB
    /// heuristic for where freshly-flushed memtable output should land.
    #[must_use]
    pub fn pick_level_for_memtable_output(&self, comparator: &dyn Comparator, smallest: &[u8], largest: &[u8]) -> u8 {
        if !self.overlapping_inputs(0, comparator, smallest, largest).is_empty() {
            return 0;
        }

        let mut level = 0;
        while level < crate::config_constants::MAX_LEVEL_FOR_COMPACTION {
            if !self.overlapping_inputs(level + 1, comparator, smallest, largest).is_empty() {
                break;
            }
            let grandparent_overlap_bytes: u64 = self
                .overlapping_inputs(level + 2, comparator, smallest, largest)
                .iter()
                .map(|f| f.file_size)
                .sum();
            if grandparent_overlap_bytes > 20 * 1024 * 1024 {
                break;
            }
            level += 1;
        }
        level
    }

    /// The level most in need of compaction, and how far over its target size it is (a score
    /// `>= 1.0` means compaction should run); `None` if nothing needs compacting.
    #[must_use]
    pub fn compaction_score(&self) -> Option<(u8, f64)> {
        let l0_score = f64::from(u32::from(self.files(0).len())) / f64::from(crate::config_constants::L0_COMPACTION_TRIGGER);

        let mut best: Option<(u8, f64)> = if l0_score >= 1.0 { Some((0, l0_score)) } else { None };

        for level in 1..crate::config_constants::NUM_LEVELS - 1 {
            let level_max_bytes = MAX_BYTES_FOR_L1 * MAX_BYTES_MULTIPLIER.powi(i32::from(level) - 1);
            #[expect(clippy::cast_precision_loss, reason = "file sizes are nowhere near f64 precision limits")]
            let score = self.total_file_size(level) as f64 / level_max_bytes;
            if score >= 1.0 && best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((level, score));
            }
        }

        best
    }
}

#[must_use]
pub(crate) fn user_key(encoded_internal_key: &[u8]) -> &[u8] {
    encoded_internal_key.len().checked_sub(8).map_or(encoded_internal_key, |n| {
        #[expect(clippy::indexing_slicing, reason = "n < encoded_internal_key.len()")]
        &encoded_internal_key[..n]
    })
}

/// A builder applied on top of a base `Version` to produce the next one; also the unit of
/// persistence written to (and read back from) the MANIFEST file.
#[derive(Debug, Default)]
pub(crate) struct VersionEdit {
    pub comparator_name: Option<Vec<u8>>,
    pub log_number: Option<FileNumber>,
    pub prev_log_number: Option<FileNumber>,
    pub next_file_number: Option<FileNumber>,
    pub last_sequence: Option<SequenceNumber>,
    pub compact_pointers: Vec<(u8, Vec<u8>)>,
    pub deleted_files: Vec<(u8, FileNumber)>,
    pub new_files: Vec<(u8, FileMetadata)>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct InvalidVersionEdit;

impl VersionEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, level: u8, metadata: FileMetadata) {
        self.new_files.push((level, metadata));
    }

    pub fn delete_file(&mut self, level: u8, file_number: FileNumber) {
        self.deleted_files.push((level, file_number));
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        if let Some(name) = &self.comparator_name {
            write_tag(&mut out, VersionEditTag::Comparator);
            write_bytes(&mut out, name);
        }
        if let Some(n) = self.log_number {
            write_tag(&mut out, VersionEditTag::LogNumber);
            write_varint(&mut out, n.0);
        }
        if let Some(n) = self.prev_log_number {
            write_tag(&mut out, VersionEditTag::PrevLogNumber);
            write_varint(&mut out, n.0);
        }
        if let Some(n) = self.next_file_number {
            write_tag(&mut out, VersionEditTag::NextFileNumber);
            write_varint(&mut out, n.0);
        }
        if let Some(seq) = self.last_sequence {
            write_tag(&mut out, VersionEditTag::LastSequence);
            write_varint(&mut out, seq.inner());
        }
        for (level, key) in &self.compact_pointers {
            write_tag(&mut out, VersionEditTag::CompactPointer);
            write_varint(&mut out, u64::from(*level));
            write_bytes(&mut out, key);
        }
        for (level, file_number) in &self.deleted_files {
            write_tag(&mut out, VersionEditTag::DeletedFile);
            write_varint(&mut out, u64::from(*level));
            write_varint(&mut out, file_number.0);
        }
        for (level, meta) in &self.new_files {
            write_tag(&mut out, VersionEditTag::NewFile);
            write_varint(&mut out, u64::from(*level));
            write_varint(&mut out, meta.file_number.0);
            write_varint(&mut out, meta.file_size);
            write_bytes(&mut out, &meta.smallest_key);
            write_bytes(&mut out, &meta.largest_key);
        }

        out
    }

    pub fn decode(mut input: &[u8]) -> Result<Self, InvalidVersionEdit> {
        let mut edit = Self::new();

        while !input.is_empty() {
            let tag_num = read_varint_u32(&mut input)?;
            let tag = VersionEditTag::try_from(tag_num).map_err(|()| InvalidVersionEdit)?;

            match tag {
                VersionEditTag::Comparator => edit.comparator_name = Some(read_bytes(&mut input)?.to_vec()),
                VersionEditTag::LogNumber => edit.log_number = Some(FileNumber(read_varint_u64(&mut input)?)),
                VersionEditTag::PrevLogNumber => edit.prev_log_number = Some(FileNumber(read_varint_u64(&mut input)?)),
                VersionEditTag::NextFileNumber => {
                    edit.next_file_number = Some(FileNumber(read_varint_u64(&mut input)?));
                }
                VersionEditTag::LastSequence => {
                    let seq = read_varint_u64(&mut input)?;
                    edit.last_sequence = Some(SequenceNumber::new_usable(seq).ok_or(InvalidVersionEdit)?);
                }
                VersionEditTag::CompactPointer => {
                    let level = read_level(&mut input)?;
                    let key = read_bytes(&mut input)?.to_vec();
                    edit.compact_pointers.push((level, key));
                }
                VersionEditTag::DeletedFile => {
                    let level = read_level(&mut input)?;
                    let file_number = FileNumber(read_varint_u64(&mut input)?);
                    edit.deleted_files.push((level, file_number));
                }
                VersionEditTag::NewFile => {
                    let level = read_level(&mut input)?;
                    let file_number = FileNumber(read_varint_u64(&mut input)?);
                    let file_size = read_varint_u64(&mut input)?;
                    let smallest_key = read_bytes(&mut input)?.to_vec();
                    let largest_key = read_bytes(&mut input)?.to_vec();
                    edit.new_files.push((level, FileMetadata::new(file_number, file_size, smallest_key, largest_key)));
                }
            }
        }

        Ok(edit)
    }

    /// Applies this edit on top of `base`, producing the next `Version`.
    #[must_use]
    pub fn apply(self, base: &Version) -> Version {
        let mut levels: [Vec<Arc<FileMetadata>>; NUM_LEVELS_USIZE] = std::array::from_fn(|i| base.levels[i].clone());

        for (level, file_number) in &self.deleted_files {
            #[expect(clippy::expect_used, reason = "decode() only ever produces levels < NUM_LEVELS")]
            let bucket = levels.get_mut(usize::from(*level)).expect("level out of range");
            bucket.retain(|f| f.file_number != *file_number);
        }
        for (level, meta) in self.new_files {
            #[expect(clippy::expect_used, reason = "decode() only ever produces levels < NUM_LEVELS")]
            let bucket = levels.get_mut(usize::from(level)).expect("level out of range");
            bucket.push(Arc::new(meta));
        }
        for bucket in &mut levels {
            bucket.sort_by(|a, b| a.smallest_key.cmp(&b.smallest_key));
        }

        Version { levels }
    }
}

fn write_tag(out: &mut Vec<u8>, tag: VersionEditTag) {
    write_varint(out, u64::from(u32::from(tag)));
}

fn write_varint(out: &mut Vec<u8>, value: u64) {
    out.write_varint(value).expect("writing to a Vec never fails");
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    #[expect(clippy::expect_used, reason = "a comparator name or key is always well under 4 GiB")]
    let len = u32::try_from(bytes.len()).expect("byte string too long to encode");
    out.write_varint(len).expect("writing to a Vec never fails");
    out.extend_from_slice(bytes);
}

fn read_varint_u32(input: &mut &[u8]) -> Result<u32, InvalidVersionEdit> {
    let (value, len) = u32::decode_var(input).ok_or(InvalidVersionEdit)?;
    *input = input.get(len..).ok_or(InvalidVersionEdit)?;
    Ok(value)
}

fn read_varint_u64(input: &mut &[u8]) -> Result<u64, InvalidVersionEdit> {
    let (value, len) = u64::decode_var(input).ok_or(InvalidVersionEdit)?;
    *input = input.get(len..).ok_or(InvalidVersionEdit)?;
    Ok(value)
}

fn read_bytes<'a>(input: &mut &'a [u8]) -> Result<&'a [u8], InvalidVersionEdit> {
    let len = read_varint_u32(input)?;
    let len = usize::try_from(len).map_err(|_| InvalidVersionEdit)?;
    if input.len() < len {
        return Err(InvalidVersionEdit);
    }
    #[expect(clippy::indexing_slicing, reason = "checked above")]
    let (bytes, rest) = (&input[..len], &input[len..]);
    *input = rest;
    Ok(bytes)
}

fn read_level(input: &mut &[u8]) -> Result<u8, InvalidVersionEdit> {
    let level = read_varint_u32(input)?;
    u8::try_from(level).map_err(|_| InvalidVersionEdit).and_then(|level| {
        if usize::from(level) < NUM_LEVELS_USIZE {
            Ok(level)
        } else {
            Err(InvalidVersionEdit)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::EntryType;

    #[test]
    fn version_edit_round_trips() {
        let mut edit = VersionEdit::new();
        edit.comparator_name = Some(b"leveldb.BytewiseComparator".to_vec());
        edit.log_number = Some(FileNumber(4));
        edit.next_file_number = Some(FileNumber(5));
        edit.last_sequence = Some(SequenceNumber::new_unchecked(99));
        edit.add_file(
            0,
            FileMetadata::new(
                FileNumber(10),
                4096,
                crate::format::InternalKey::new(b"a", SequenceNumber::new_unchecked(1), EntryType::Value).into_bytes(),
                crate::format::InternalKey::new(b"z", SequenceNumber::new_unchecked(2), EntryType::Value).into_bytes(),
            ),
        );

        let encoded = edit.encode();
        let decoded = VersionEdit::decode(&encoded).unwrap();

        assert_eq!(decoded.comparator_name, Some(b"leveldb.BytewiseComparator".to_vec()));
        assert_eq!(decoded.log_number, Some(FileNumber(4)));
        assert_eq!(decoded.last_sequence, Some(SequenceNumber::new_unchecked(99)));
        assert_eq!(decoded.new_files.len(), 1);
        assert_eq!(decoded.new_files[0].1.file_number, FileNumber(10));
    }

    #[test]
    fn applying_edit_adds_and_removes_files() {
        let base = Version::default();
        let mut edit = VersionEdit::new();
        edit.add_file(
            1,
            FileMetadata::new(
                FileNumber(1),
                100,
                crate::format::InternalKey::new(b"a", SequenceNumber::new_unchecked(1), EntryType::Value).into_bytes(),
                crate::format::InternalKey::new(b"b", SequenceNumber::new_unchecked(1), EntryType::Value).into_bytes(),
            ),
        );
        let next = edit.apply(&base);
        assert_eq!(next.files(1).len(), 1);

        let mut removal = VersionEdit::new();
        removal.delete_file(1, FileNumber(1));
        let after_removal = removal.apply(&next);
        assert!(after_removal.files(1).is_empty());
    }
}
