#![cfg_attr(docsrs, feature(doc_cfg))]

mod comparator;
mod filters;
// Reason this is pub: there's a bunch of constants and traits that will not usually be needed.
// They need to be public, but need not be in the crate root.
pub mod compressors;
mod internal_utils;

mod block;
mod cache;
mod filter_block;

pub mod table;


pub use self::block::{Block, BlockBuilder, BlockIterImpl, BorrowedBlockIter, OwnedBlockIter};
pub use self::cache::{BlockCache, CacheHandle, CacheKey};
pub use self::comparator::{ComparatorAdapter, LexicographicComparator, MetaindexComparator, TableComparator};
pub use self::compressors::{Compressor, CompressorList};
pub use self::filters::{
    BloomPolicy, BloomPolicyName, FILTER_KEYS_LENGTH_LIMIT, FilterPolicy, NoFilterPolicy,
};
pub use self::filter_block::{FilterBlockBuilder, FilterBlockReader};


// TODO: provide functions that can rigorously validate the data of blocks, filter blocks,
// etc, so that I don't feel guilty about letting the normal implementations panic.
// Someone who's concerned about corruption can do the paranoid checks.
