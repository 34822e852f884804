//! Contiguous block ranges
//!
//! Every file occupies exactly one extent. The empty extent (length 0) belongs
//! to files with no content and is never reserved in the block map.

use serde::{Deserialize, Serialize};

/// An extent representing a contiguous range of blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    /// Starting block index
    pub start: usize,
    /// Number of contiguous blocks
    pub length: usize,
}

impl Extent {
    pub fn new(start: usize, length: usize) -> Self {
        Extent { start, length }
    }

    /// The zero-length extent
    pub fn empty() -> Self {
        Extent::default()
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// One past the last block
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Check if this extent contains a block index
    pub fn contains(&self, block: usize) -> bool {
        block >= self.start && block < self.end()
    }

    /// Check if two extents share at least one block
    pub fn overlaps(&self, other: &Extent) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end() && other.start < self.end()
    }

    /// Block indices covered by this extent
    pub fn blocks(&self) -> std::ops::Range<usize> {
        self.start..self.end()
    }

    /// Byte offset of the first block in a partition with the given block size
    pub fn byte_offset(&self, block_size: u64) -> u64 {
        self.start as u64 * block_size
    }
}
