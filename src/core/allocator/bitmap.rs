//! Bitmap block map for the partition
//!
//! One bit per block, packed into `u64` words:
//! - 0 = free block
//! - 1 = used block
//!
//! Runs are handed out first-fit: the lowest-index run of free blocks that is
//! long enough wins. There is no compaction.

use crate::core::allocator::extent::Extent;
use crate::core::allocator::BlockAllocator;
use crate::core::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

const WORD_BITS: usize = 64;

/// Blocks per row when a [`UsageMap`] is rendered
pub const USAGE_ROW_WIDTH: usize = 64;

/// State of a single block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockState {
    Free,
    Used,
}

/// Per-block usage of the partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMap {
    /// Bitmap words (each word = 64 blocks)
    bitmap: Vec<u64>,

    /// Total number of blocks tracked
    total_blocks: usize,

    /// Number of free blocks available
    free_blocks: usize,
}

impl BlockMap {
    /// Create a map with every block free
    pub fn new(total_blocks: usize) -> Self {
        let num_words = (total_blocks + WORD_BITS - 1) / WORD_BITS;
        BlockMap {
            bitmap: vec![0u64; num_words],
            total_blocks,
            free_blocks: total_blocks,
        }
    }

    /// Check if a specific block is used
    pub fn is_used(&self, block: usize) -> bool {
        if block >= self.total_blocks {
            return false;
        }
        let (word, bit) = (block / WORD_BITS, block % WORD_BITS);
        self.bitmap[word] & (1u64 << bit) != 0
    }

    pub fn used_blocks(&self) -> usize {
        self.total_blocks - self.free_blocks
    }

    /// Indices of every used block, ascending
    pub fn used_indices(&self) -> Vec<usize> {
        (0..self.total_blocks).filter(|&b| self.is_used(b)).collect()
    }

    /// Snapshot of every block's state in block order
    pub fn visualize(&self) -> UsageMap {
        let states = (0..self.total_blocks)
            .map(|b| {
                if self.is_used(b) {
                    BlockState::Used
                } else {
                    BlockState::Free
                }
            })
            .collect();
        UsageMap { states }
    }

    fn set(&mut self, block: usize, used: bool) {
        let (word, bit) = (block / WORD_BITS, block % WORD_BITS);
        if used {
            self.bitmap[word] |= 1u64 << bit;
        } else {
            self.bitmap[word] &= !(1u64 << bit);
        }
    }

    fn check_range(&self, extent: Extent) -> Result<()> {
        if extent.end() > self.total_blocks {
            return Err(inconsistency(
                extent,
                format!("range out of range (map has {} blocks)", self.total_blocks),
            ));
        }
        Ok(())
    }
}

/// Build an `AllocationInconsistency` error.
///
/// These are programming errors: fatal in debug builds, logged and rejected
/// otherwise.
fn inconsistency(extent: Extent, reason: String) -> StoreError {
    tracing::error!(
        start = extent.start,
        length = extent.length,
        "Allocation inconsistency: {}",
        reason
    );
    if cfg!(debug_assertions) {
        panic!(
            "allocation inconsistency at [{}, {}): {}",
            extent.start,
            extent.end(),
            reason
        );
    }
    StoreError::AllocationInconsistency {
        start: extent.start,
        length: extent.length,
        reason,
    }
}

impl BlockAllocator for BlockMap {
    fn find_free_run(&self, blocks_needed: usize) -> Result<usize> {
        if blocks_needed == 0 {
            return Err(StoreError::InvalidArgument(
                "cannot search for a run of zero blocks".to_string(),
            ));
        }

        let insufficient = || StoreError::InsufficientSpace {
            needed: blocks_needed,
            free: self.free_blocks,
        };

        if blocks_needed > self.free_blocks {
            return Err(insufficient());
        }

        let mut run = 0usize;
        let mut block = 0usize;
        while block < self.total_blocks {
            let word = self.bitmap[block / WORD_BITS];

            // Whole used word at a word boundary breaks any run
            if block % WORD_BITS == 0 && word == u64::MAX {
                run = 0;
                block += WORD_BITS;
                continue;
            }

            if word & (1u64 << (block % WORD_BITS)) == 0 {
                run += 1;
                if run == blocks_needed {
                    return Ok(block + 1 - blocks_needed);
                }
            } else {
                run = 0;
            }
            block += 1;
        }

        Err(insufficient())
    }

    fn reserve(&mut self, extent: Extent) -> Result<()> {
        if extent.is_empty() {
            return Ok(());
        }
        self.check_range(extent)?;

        if let Some(block) = extent.blocks().find(|&b| self.is_used(b)) {
            return Err(inconsistency(
                extent,
                format!("block {} already used", block),
            ));
        }

        for block in extent.blocks() {
            self.set(block, true);
        }
        self.free_blocks -= extent.length;
        tracing::trace!(start = extent.start, length = extent.length, "Reserved blocks");
        Ok(())
    }

    fn release(&mut self, extent: Extent) -> Result<()> {
        if extent.is_empty() {
            return Ok(());
        }
        self.check_range(extent)?;

        if let Some(block) = extent.blocks().find(|&b| !self.is_used(b)) {
            return Err(inconsistency(
                extent,
                format!("block {} already free", block),
            ));
        }

        for block in extent.blocks() {
            self.set(block, false);
        }
        self.free_blocks += extent.length;
        tracing::trace!(start = extent.start, length = extent.length, "Released blocks");
        Ok(())
    }

    fn fragmentation_score(&self) -> f64 {
        if self.total_blocks == 0 {
            return 0.0;
        }

        // Count free<->used transitions in block order
        let mut transitions = 0usize;
        let mut prev_used = false;
        for block in 0..self.total_blocks {
            let used = self.is_used(block);
            if used != prev_used {
                transitions += 1;
            }
            prev_used = used;
        }

        (transitions as f64) / (self.total_blocks as f64)
    }

    fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    fn free_blocks(&self) -> usize {
        self.free_blocks
    }
}

/// Read-only snapshot of block usage
///
/// Renders as rows of [`USAGE_ROW_WIDTH`] blocks, `.` for free and `*` for used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMap {
    states: Vec<BlockState>,
}

impl UsageMap {
    pub fn states(&self) -> &[BlockState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn used(&self) -> usize {
        self.states.iter().filter(|s| **s == BlockState::Used).count()
    }

    pub fn free(&self) -> usize {
        self.len() - self.used()
    }
}

impl fmt::Display for UsageMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.states.chunks(USAGE_ROW_WIDTH) {
            for state in row {
                let c = match state {
                    BlockState::Free => '.',
                    BlockState::Used => '*',
                };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
