//! Block allocation for the partition
//!
//! - [`bitmap::BlockMap`] tracks Free/Used per block and hands out contiguous
//!   runs first-fit
//! - [`extent::Extent`] is the contiguous range a file occupies

pub mod bitmap;
pub mod extent;

use crate::core::error::Result;
use extent::Extent;

/// Contiguous block allocator
///
/// Defines the interface the file store uses to reserve and release extents.
pub trait BlockAllocator {
    /// Start index of the first free run of `blocks_needed` blocks
    fn find_free_run(&self, blocks_needed: usize) -> Result<usize>;

    /// Mark every block of `extent` as used
    fn reserve(&mut self, extent: Extent) -> Result<()>;

    /// Mark every block of `extent` as free
    fn release(&mut self, extent: Extent) -> Result<()>;

    /// Find and reserve a run of `blocks_needed` blocks
    fn allocate(&mut self, blocks_needed: usize) -> Result<Extent> {
        let start = self.find_free_run(blocks_needed)?;
        let extent = Extent::new(start, blocks_needed);
        self.reserve(extent)?;
        Ok(extent)
    }

    /// Calculate fragmentation score (0.0 = no fragmentation, higher = more fragmented)
    fn fragmentation_score(&self) -> f64;

    /// Get total number of blocks managed
    fn total_blocks(&self) -> usize;

    /// Get number of free blocks available
    fn free_blocks(&self) -> usize;
}
