use seekable_iterator::{CursorLendingIterator, LendItem, LentItem, Seekable};

use ember_vfs::traits::RandomAccess;

use crate::block::{OwnedBlockIter, TableBlock};
use crate::comparator::{ComparatorAdapter, TableComparator};

use super::format::BlockHandle;
use super::table_struct::Table;

/// Iterates over every entry of a [`Table`], in key order, reading data blocks on demand.
pub struct TableIter<'a, File> {
    table: &'a Table<File>,
    index_iter: OwnedBlockIter<Vec<u8>, ComparatorAdapter<std::sync::Arc<dyn TableComparator + Send + Sync>>>,
    data_iter: Option<OwnedBlockIter<Vec<u8>, ComparatorAdapter<std::sync::Arc<dyn TableComparator + Send + Sync>>>>,
}

impl<'a, File: RandomAccess> TableIter<'a, File> {
    #[must_use]
    pub fn new(table: &'a Table<File>) -> Self {
        let index_block: TableBlock<Vec<u8>, std::sync::Arc<dyn TableComparator + Send + Sync>> =
            table.index_block_for_iter();
        Self {
            table,
            index_iter: index_block.into_iter(),
            data_iter: None,
        }
    }

    fn load_data_block(&mut self, encoded_handle: &[u8]) -> bool {
        let Ok((handle, _)) = BlockHandle::decode_from(encoded_handle) else {
            return false;
        };
        self.set_data_iter(handle)
    }

    fn set_data_iter(&mut self, handle: BlockHandle) -> bool {
        let Ok(contents) = self.table.read_block(handle) else {
            return false;
        };
        let block = crate::block::Block::new(contents, self.table.comparator_adapter());
        self.data_iter = Some(block.into_iter());
        true
    }

    fn advance_to_next_valid(&mut self) {
        loop {
            if self.data_iter.as_ref().is_some_and(CursorLendingIterator::valid) {
                return;
            }

            let Some((_, handle)) = self.index_iter.current() else {
                self.data_iter = None;
                return;
            };
            let handle = handle.to_vec();

            if !self.load_data_block(&handle) {
                self.data_iter = None;
                return;
            }
            if let Some(data_iter) = &mut self.data_iter {
                data_iter.seek_to_first();
            }
            if self.data_iter.as_ref().is_some_and(CursorLendingIterator::valid) {
                return;
            }
            if self.index_iter.next().is_none() {
                self.data_iter = None;
                return;
            }
        }
    }
}

impl<'lend, File> LendItem<'lend> for TableIter<'_, File> {
    type Item = (&'lend [u8], &'lend [u8]);
}

impl<File: RandomAccess> CursorLendingIterator for TableIter<'_, File> {
    fn valid(&self) -> bool {
        self.data_iter.as_ref().is_some_and(CursorLendingIterator::valid)
    }

    fn next(&mut self) -> Option<LentItem<'_, Self>> {
        if let Some(data_iter) = &mut self.data_iter {
            if let Some(entry) = data_iter.next() {
                return Some(entry);
            }
        }

        while let Some((_, handle)) = self.index_iter.next() {
            let handle = handle.to_vec();
            if self.load_data_block(&handle) {
                if let Some(data_iter) = &mut self.data_iter {
                    if let Some(entry) = data_iter.next() {
                        return Some(entry);
                    }
                }
            }
        }
        self.data_iter = None;
        None
    }

    fn current(&self) -> Option<LentItem<'_, Self>> {
        self.data_iter.as_ref().and_then(CursorLendingIterator::current)
    }

    fn prev(&mut self) -> Option<LentItem<'_, Self>> {
        if let Some(data_iter) = &mut self.data_iter {
            if let Some(entry) = data_iter.prev() {
                return Some(entry);
            }
        }

        while let Some((_, handle)) = self.index_iter.prev() {
            let handle = handle.to_vec();
            if self.load_data_block(&handle) {
                if let Some(data_iter) = &mut self.data_iter {
                    data_iter.seek_to_last();
                    if let Some(entry) = data_iter.current() {
                        return Some(entry);
                    }
                }
            }
        }
        self.data_iter = None;
        None
    }
}

impl<File: RandomAccess> Seekable<[u8], ComparatorAdapter<std::sync::Arc<dyn TableComparator + Send + Sync>>>
for TableIter<'_, File>
{
    fn reset(&mut self) {
        self.index_iter.reset();
        self.data_iter = None;
    }

    fn seek(&mut self, min_bound: &[u8]) {
        self.index_iter.seek(min_bound);
        if let Some((_, handle)) = self.index_iter.current() {
            let handle = handle.to_vec();
            if self.load_data_block(&handle) {
                if let Some(data_iter) = &mut self.data_iter {
                    data_iter.seek(min_bound);
                }
            } else {
                self.data_iter = None;
            }
        } else {
            self.data_iter = None;
            return;
        }

        // The target block may be entirely less than `min_bound` (keys are only an upper bound
        // via the index), in which case advance to the next block's first valid entry.
        if !self.data_iter.as_ref().is_some_and(CursorLendingIterator::valid)
            && self.index_iter.next().is_some()
        {
            self.advance_to_next_valid();
        }
    }

    fn seek_before(&mut self, strict_upper_bound: &[u8]) {
        self.index_iter.seek(strict_upper_bound);
        if let Some((_, handle)) = self.index_iter.current() {
            let handle = handle.to_vec();
            if self.load_data_block(&handle) {
                if let Some(data_iter) = &mut self.data_iter {
                    data_iter.seek_before(strict_upper_bound);
                }
            }
        }
    }

    fn seek_to_first(&mut self) {
        self.index_iter.seek_to_first();
        if let Some((_, handle)) = self.index_iter.current() {
            let handle = handle.to_vec();
            self.load_data_block(&handle);
        }
    }

    fn seek_to_last(&mut self) {
        self.index_iter.seek_to_last();
        if let Some((_, handle)) = self.index_iter.current() {
            let handle = handle.to_vec();
            if self.load_data_block(&handle) {
                if let Some(data_iter) = &mut self.data_iter {
                    data_iter.seek_to_last();
                }
            }
        }
    }
}
