use std::sync::Arc;

use crate::comparator::Comparator;
use crate::config_constants::{EXPANDED_COMPACTION_SIZE_FACTOR, GRANDPARENT_OVERLAP_SIZE_FACTOR};
use crate::format::FileNumber;
use crate::version::{FileMetadata, Version};

/// A single compaction job: merge `inputs` (drawn from `level` and, if `level` isn't the last
/// level, overlapping files from `level + 1`) into a run of new files one level down.
#[derive(Debug)]
pub(crate) struct CompactionPlan {
    pub level: u8,
    pub inputs: Vec<Arc<FileMetadata>>,
    pub next_level_inputs: Vec<Arc<FileMetadata>>,
    pub grandparents: Vec<Arc<FileMetadata>>,
    /// Updated compaction pointer for `level`, to be recorded in the edit once this compaction
    /// completes, so the next size-triggered compaction at this level starts from where this one
    /// left off instead of cycling the same key range forever.
    pub next_compact_pointer: Vec<u8>,
}

impl CompactionPlan {
    #[must_use]
    pub fn input_file_numbers(&self) -> Vec<FileNumber> {
        self.inputs.iter().chain(&self.next_level_inputs).map(|f| f.file_number).collect()
    }

    /// The maximum total size, in bytes, an output file from this compaction should reach before
    /// a new output file is started, so that one compaction doesn't produce an unboundedly large
    /// overlap with the level below it.
    #[must_use]
    pub fn grandparent_overlap_limit(&self, target_file_size: u64) -> u64 {
        GRANDPARENT_OVERLAP_SIZE_FACTOR * target_file_size
    }
}

/// Picks the next compaction to run, preferring whichever level has the highest compaction score
/// (see [`Version::compaction_score`]), and falling back to a level-0-triggered compaction if no
/// level is over its size target but level 0 has reached [`crate::config_constants::L0_COMPACTION_TRIGGER`].
pub(crate) fn pick_compaction(
    version: &Version,
    comparator: &dyn Comparator,
    compact_pointers: &[Option<Vec<u8>>],
    target_file_size: u64,
) -> Option<CompactionPlan> {
    let (level, _score) = version.compaction_score()?;

    let inputs = if level == 0 {
        // Level 0 files can overlap each other, so seed the range from every L0 file and let
        // `overlapping_inputs` expand it to cover every transitively-overlapping file.
        if version.files(0).is_empty() {
            return None;
        }
        let (lo, hi) = key_range(version.files(0), comparator);
        version.overlapping_inputs(0, comparator, &lo, &hi)
    } else {
        let start_after = compact_pointers.get(usize::from(level)).and_then(Option::as_ref);
        let candidate = start_after
            .and_then(|pointer| {
                version.files(level).iter().find(|f| comparator.compare(&f.largest_key, pointer) == std::cmp::Ordering::Greater)
            })
            .or_else(|| version.files(level).first())?;
        vec![Arc::clone(candidate)]
    };

    if inputs.is_empty() {
        return None;
    }

    let (smallest, largest) = key_range(&inputs, comparator);
    let mut next_level_inputs = version.overlapping_inputs(level + 1, comparator, &smallest, &largest);

    // Try to expand the level-`level` input set without growing the level-`(level+1)` input set,
    // so long as doing so stays under the size limit for one compaction.
    if level > 0 {
        let (expanded_smallest, expanded_largest) = key_range(
            &inputs.iter().chain(&next_level_inputs).cloned().collect::<Vec<_>>(),
            comparator,
        );
        let expanded_inputs = version.overlapping_inputs(level, comparator, &expanded_smallest, &expanded_largest);
        if expanded_inputs.len() > inputs.len() {
            let expanded_next = version.overlapping_inputs(level + 1, comparator, &expanded_smallest, &expanded_largest);
            let total_size: u64 = expanded_inputs.iter().chain(&expanded_next).map(|f| f.file_size).sum();
            if expanded_next.len() == next_level_inputs.len()
                && total_size < EXPANDED_COMPACTION_SIZE_FACTOR * target_file_size
            {
                next_level_inputs = expanded_next;
            }
        }
    }

    let (_, final_largest) = key_range(&inputs, comparator);
    let grandparents = if level + 2 < crate::config_constants::NUM_LEVELS {
        version.overlapping_inputs(level + 2, comparator, &smallest, &final_largest)
    } else {
        Vec::new()
    };

    let next_compact_pointer = {
        let (_, largest) = key_range(&inputs, comparator);
        largest
    };

    Some(CompactionPlan { level, inputs, next_level_inputs, grandparents, next_compact_pointer })
}

#[must_use]
fn key_range(files: &[Arc<FileMetadata>], comparator: &dyn Comparator) -> (Vec<u8>, Vec<u8>) {
    #[expect(clippy::expect_used, reason = "caller only ever passes non-empty file lists")]
    let first = files.first().expect("key_range called with no files");
    let mut smallest = first.smallest_key.clone();
    let mut largest = first.largest_key.clone();

    for file in files {
        if comparator.compare(&file.smallest_key, &smallest) == std::cmp::Ordering::Less {
            smallest = file.smallest_key.clone();
        }
        if comparator.compare(&file.largest_key, &largest) == std::cmp::Ordering::Greater {
            largest = file.largest_key.clone();
        }
    }

    (smallest, largest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;
    use crate::format::{EntryType, InternalKey, SequenceNumber};
    use crate::version::VersionEdit;

    fn file(number: u64, smallest: &str, largest: &str) -> FileMetadata {
        FileMetadata::new(
            FileNumber(number),
            1024,
            InternalKey::new(smallest.as_bytes(), SequenceNumber::new_unchecked(1), EntryType::Value).into_bytes(),
            InternalKey::new(largest.as_bytes(), SequenceNumber::new_unchecked(1), EntryType::Value).into_bytes(),
        )
    }

    #[test]
    fn picks_l0_compaction_once_triggered() {
        let mut edit = VersionEdit::new();
        for i in 0..5 {
            edit.add_file(0, file(i, "a", "z"));
        }
        let version = edit.apply(&Version::default());

        let plan = pick_compaction(&version, &BytewiseComparator, &[None; crate::config_constants::NUM_LEVELS_USIZE], 2 * 1024 * 1024);
        let plan = plan.unwrap();
        assert_eq!(plan.level, 0);
        assert_eq!(plan.inputs.len(), 5);
    }

    #[test]
    fn no_compaction_when_nothing_over_target() {
        let version = Version::default();
        assert!(pick_compaction(&version, &BytewiseComparator, &[None; crate::config_constants::NUM_LEVELS_USIZE], 2 * 1024 * 1024).is_none());
    }
}
