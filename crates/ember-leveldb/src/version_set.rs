use std::io::Read as _;
use std::sync::Arc;

use ember_vfs::traits::{ReadableFilesystem, WritableFile, WritableFilesystem};

use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::filename::{manifest_file_name, LevelDBFileName};
use crate::format::{FileNumber, SequenceNumber};
use crate::version::{Version, VersionEdit};
use crate::write_log::{WriteLogReader, WriteLogWriter};

/// The mutable state describing which files make up the database, and the bookkeeping (file and
/// sequence number allocation, the MANIFEST log) needed to persist changes to it.
///
/// The teacher split committing a `VersionEdit` into three steps (`apply`, `log_to_manifest`,
/// `install`) so that the expensive disk write could happen without holding the database's main
/// mutex, concurrently with other readers and with the writer queue's foreground thread. This
/// crate's `Db` instead has no background compaction thread at all: flushes and compactions run
/// synchronously, inline in whichever `put`/`delete`/`write` call triggers them, under the same
/// `parking_lot::Mutex` that guards every other piece of mutable DB state (see DESIGN.md). With a
/// single caller ever touching this type, there is nothing concurrent to protect `log_and_apply`
/// against, so the three steps are collapsed into one call.
pub(crate) struct VersionSet {
    pub comparator: Arc<dyn Comparator>,

    log_number: FileNumber,
    prev_log_number: FileNumber,
    next_file_number: FileNumber,
    last_sequence: SequenceNumber,
    manifest_file_number: FileNumber,

    current: Arc<Version>,
    compact_pointers: [Option<Vec<u8>>; crate::config_constants::NUM_LEVELS_USIZE],
}

impl VersionSet {
    #[must_use]
    pub fn new(comparator: Arc<dyn Comparator>) -> Self {
        Self {
            comparator,
            log_number: FileNumber(0),
            prev_log_number: FileNumber(0),
            next_file_number: FileNumber(2),
            last_sequence: SequenceNumber::ZERO,
            manifest_file_number: FileNumber(1),
            current: Arc::new(Version::default()),
            compact_pointers: Default::default(),
        }
    }

    #[must_use]
    pub fn current(&self) -> Arc<Version> {
        Arc::clone(&self.current)
    }

    #[must_use]
    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence
    }

    pub fn set_last_sequence(&mut self, sequence_number: SequenceNumber) {
        debug_assert!(sequence_number >= self.last_sequence);
        self.last_sequence = sequence_number;
    }

    #[must_use]
    pub fn log_number(&self) -> FileNumber {
        self.log_number
    }

    pub fn new_file_number(&mut self) -> Result<FileNumber> {
        let allocated = self.next_file_number;
        self.next_file_number =
            self.next_file_number.next().map_err(|e| Error::Corruption(e.to_string()))?;
        Ok(allocated)
    }

    #[must_use]
    pub fn manifest_file_number(&self) -> FileNumber {
        self.manifest_file_number
    }

    /// Points this version set at a different already-allocated file number as its MANIFEST,
    /// without touching `next_file_number` or anything else. Used by `Db::open` when it
    /// consolidates recovery state into a brand new MANIFEST file; see DESIGN.md.
    pub fn set_manifest_file_number(&mut self, file_number: FileNumber) {
        self.manifest_file_number = file_number;
    }

    #[must_use]
    pub fn compact_pointer(&self, level: u8) -> Option<&[u8]> {
        self.compact_pointers.get(usize::from(level))?.as_deref()
    }

    /// Builds, persists, and installs a `VersionEdit` atop the current version. `manifest` is the
    /// already-open writer for `MANIFEST-{manifest_file_number}`.
    pub fn log_and_apply<File: WritableFile>(
        &mut self,
        manifest: &mut WriteLogWriter<File>,
        mut edit: VersionEdit,
    ) -> Result<()> {
        edit.log_number.get_or_insert(self.log_number);
        edit.prev_log_number.get_or_insert(self.prev_log_number);
        edit.next_file_number = Some(self.next_file_number);
        edit.last_sequence = Some(self.last_sequence);

        for (level, key) in &edit.compact_pointers {
            if let Some(slot) = self.compact_pointers.get_mut(usize::from(*level)) {
                *slot = Some(key.clone());
            }
        }

        let encoded = edit.encode();
        manifest.add_record(&encoded).map_err(|e| Error::Io(e.0))?;

        let next_version = edit.apply(&self.current);
        self.current = Arc::new(next_version);

        if let Some(log_number) = edit.log_number {
            self.log_number = log_number;
        }
        if let Some(prev_log_number) = edit.prev_log_number {
            self.prev_log_number = prev_log_number;
        }

        Ok(())
    }

    /// Reconstructs the version set by replaying every `VersionEdit` recorded in the current
    /// MANIFEST file (found via `CURRENT`).
    pub fn recover<FS: ReadableFilesystem + WritableFilesystem>(
        fs: &FS,
        db_directory: &std::path::Path,
        comparator: Arc<dyn Comparator>,
    ) -> Result<Self> {
        let current_path = LevelDBFileName::Current.path_in(db_directory);
        let mut current_file = fs
            .open_sequential(&current_path)
            .map_err(|e| Error::Corruption(format!("cannot open CURRENT: {e}")))?;
        let mut current_contents = Vec::new();
        current_file
            .read_to_end(&mut current_contents)
            .map_err(|e| Error::Corruption(format!("cannot read CURRENT: {e}")))?;
        let manifest_name = String::from_utf8(current_contents)
            .map_err(|_| Error::Corruption("CURRENT file is not valid UTF-8".to_owned()))?;
        let manifest_name = manifest_name.trim_end_matches('\n');

        let LevelDBFileName::Manifest { file_number: manifest_file_number } = LevelDBFileName::parse(manifest_name)
        else {
            return Err(Error::Corruption("CURRENT does not name a MANIFEST file".to_owned()));
        };

        let manifest_path = db_directory.join(manifest_name);
        let manifest_file = fs
            .open_sequential(&manifest_path)
            .map_err(|e| Error::Corruption(format!("cannot open {manifest_name}: {e}")))?;
        let mut reader = WriteLogReader::new(manifest_file);

        let mut set = Self::new(comparator);
        set.manifest_file_number = FileNumber(manifest_file_number);

        while let Some(record) = reader.next_record().map_err(|e| Error::Io(e.0))? {
            let edit = VersionEdit::decode(&record).map_err(|_| Error::Corruption("malformed MANIFEST record".to_owned()))?;

            for (level, key) in &edit.compact_pointers {
                if let Some(slot) = set.compact_pointers.get_mut(usize::from(*level)) {
                    *slot = Some(key.clone());
                }
            }
            if let Some(log_number) = edit.log_number {
                set.log_number = log_number;
            }
            if let Some(prev_log_number) = edit.prev_log_number {
                set.prev_log_number = prev_log_number;
            }
            if let Some(next_file_number) = edit.next_file_number {
                set.next_file_number = next_file_number;
            }
            if let Some(last_sequence) = edit.last_sequence {
                set.last_sequence = last_sequence;
            }

            set.current = Arc::new(edit.apply(&set.current));
        }

        Ok(set)
    }

    pub fn mark_file_number_used(&mut self, file_number: FileNumber) {
        if file_number.0 >= self.next_file_number.0 {
            self.next_file_number = FileNumber(file_number.0 + 1);
        }
    }

    #[must_use]
    pub fn manifest_file_name(&self) -> LevelDBFileName {
        manifest_file_name(self.manifest_file_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;

    #[test]
    fn new_file_numbers_are_monotonic() {
        let mut set = VersionSet::new(Arc::new(BytewiseComparator));
        let a = set.new_file_number().unwrap();
        let b = set.new_file_number().unwrap();
        assert!(b.0 > a.0);
    }
}
