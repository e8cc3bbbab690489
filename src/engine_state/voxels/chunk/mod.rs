//! # Chunk Module
//!
//! This module provides [`ChunkSection`], the 16x16x16 unit of voxel storage, and
//! the [`ChunkColumn`](column::ChunkColumn) that stacks sections vertically.
//!
//! ## Memory Optimization
//!
//! A section is either *uniform* (one identifier for all 4096 voxels, no heap
//! allocation) or *dense* (a boxed slice with one identifier per voxel). Sections
//! start uniform. The first write that breaks uniformity expands the section to a
//! dense buffer seeded with the previous identifier, and
//! [`ChunkSection::optimize`] folds a homogeneous dense buffer back into the
//! uniform form.
//!
//! A running count of non-air voxels is kept alongside the dense buffer so that
//! [`ChunkSection::is_empty`] and [`ChunkSection::is_full`] never scan.
//!
//! ### Layout
//! Dense voxels are stored in row-major order: x, then z, then y.

use super::block::{is_solid, BlockId, AIR};

pub mod column;
pub mod halo;
pub mod section_state;

/// The dimension (width, height, depth) of a section in blocks.
pub const CHUNK_DIMENSION: i32 = 16;
/// The number of blocks in a single 2D plane of a section (CHUNK_DIMENSION²).
pub const CHUNK_PLANE_SIZE: i32 = CHUNK_DIMENSION * CHUNK_DIMENSION;
/// The total number of blocks in a section (CHUNK_DIMENSION³).
pub const CHUNK_SIZE: i32 = CHUNK_PLANE_SIZE * CHUNK_DIMENSION;

/// Storage of a section's voxels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBlocks {
    /// Every voxel holds the same identifier.
    Uniform(BlockId),
    /// One identifier per voxel, `CHUNK_SIZE` entries.
    Dense(Box<[BlockId]>),
}

/// A 16x16x16 cube of block identifiers.
///
/// # Examples
///
/// ```
/// use voxel_stream::engine_state::voxels::chunk::ChunkSection;
///
/// let mut section = ChunkSection::new();
/// assert!(section.is_empty());
///
/// section.set(1, 2, 3, 5);
/// assert_eq!(section.get(1, 2, 3), 5);
/// assert_eq!(section.get(-1, 0, 0), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSection {
    blocks: SectionBlocks,
    /// Number of non-air voxels. Kept exact for both representations.
    non_empty_count: u32,
}

impl Default for ChunkSection {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkSection {
    /// Creates an all-air section without allocating.
    pub fn new() -> Self {
        Self::uniform(AIR)
    }

    /// Creates a section where every voxel is `id`.
    pub fn uniform(id: BlockId) -> Self {
        Self {
            blocks: SectionBlocks::Uniform(id),
            non_empty_count: if is_solid(id) { CHUNK_SIZE as u32 } else { 0 },
        }
    }

    /// Builds a section from a full dense buffer, folding it to uniform when possible.
    ///
    /// Returns `None` if the buffer does not hold exactly `CHUNK_SIZE` entries.
    pub fn from_blocks(blocks: Box<[BlockId]>) -> Option<Self> {
        if blocks.len() != CHUNK_SIZE as usize {
            return None;
        }
        let non_empty_count = blocks.iter().filter(|id| is_solid(**id)).count() as u32;
        let mut section = Self {
            blocks: SectionBlocks::Dense(blocks),
            non_empty_count,
        };
        section.optimize();
        Some(section)
    }

    /// Flat index of a local coordinate, or `None` if it lies outside the section.
    #[inline]
    pub fn index(x: i32, y: i32, z: i32) -> Option<usize> {
        let range = 0..CHUNK_DIMENSION;
        if range.contains(&x) && range.contains(&y) && range.contains(&z) {
            Some((x + z * CHUNK_DIMENSION + y * CHUNK_PLANE_SIZE) as usize)
        } else {
            None
        }
    }

    /// Reads a voxel. Out-of-range coordinates read as air.
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockId {
        match Self::index(x, y, z) {
            Some(index) => self.get_index(index),
            None => AIR,
        }
    }

    #[inline]
    fn get_index(&self, index: usize) -> BlockId {
        match &self.blocks {
            SectionBlocks::Uniform(id) => *id,
            SectionBlocks::Dense(blocks) => blocks[index],
        }
    }

    /// Writes a voxel and returns the identifier it replaced.
    ///
    /// Out-of-range writes are ignored and return `None`.
    pub fn set(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> Option<BlockId> {
        let index = Self::index(x, y, z)?;

        let previous = match &mut self.blocks {
            SectionBlocks::Uniform(current) if *current == id => return Some(id),
            SectionBlocks::Uniform(current) => {
                let previous = *current;
                let mut blocks = vec![previous; CHUNK_SIZE as usize].into_boxed_slice();
                blocks[index] = id;
                self.blocks = SectionBlocks::Dense(blocks);
                previous
            }
            SectionBlocks::Dense(blocks) => std::mem::replace(&mut blocks[index], id),
        };

        match (is_solid(previous), is_solid(id)) {
            (true, false) => self.non_empty_count -= 1,
            (false, true) => self.non_empty_count += 1,
            _ => {}
        }

        Some(previous)
    }

    /// Overwrites every voxel with `id`, releasing any dense buffer.
    pub fn fill(&mut self, id: BlockId) {
        *self = Self::uniform(id);
    }

    /// Collapses a homogeneous dense section back to the uniform form.
    ///
    /// Returns `true` if the dense buffer was released.
    pub fn optimize(&mut self) -> bool {
        let SectionBlocks::Dense(blocks) = &self.blocks else {
            return false;
        };
        let first = blocks[0];
        if blocks.iter().all(|id| *id == first) {
            *self = Self::uniform(first);
            true
        } else {
            false
        }
    }

    /// `true` if no voxel is solid. O(1).
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self.blocks {
            SectionBlocks::Uniform(id) => !is_solid(id),
            SectionBlocks::Dense(_) => self.non_empty_count == 0,
        }
    }

    /// `true` if every voxel is solid. O(1).
    #[inline]
    pub fn is_full(&self) -> bool {
        match self.blocks {
            SectionBlocks::Uniform(id) => is_solid(id),
            SectionBlocks::Dense(_) => self.non_empty_count == CHUNK_SIZE as u32,
        }
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self.blocks, SectionBlocks::Uniform(_))
    }

    pub fn non_empty_count(&self) -> u32 {
        self.non_empty_count
    }

    /// Heap bytes retained by the dense buffer (0 when uniform).
    pub fn dense_memory_bytes(&self) -> usize {
        match &self.blocks {
            SectionBlocks::Uniform(_) => 0,
            SectionBlocks::Dense(blocks) => blocks.len() * std::mem::size_of::<BlockId>(),
        }
    }

    pub fn blocks(&self) -> &SectionBlocks {
        &self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_coordinates() -> impl Iterator<Item = (i32, i32, i32)> {
        (0..CHUNK_DIMENSION).flat_map(|y| {
            (0..CHUNK_DIMENSION)
                .flat_map(move |z| (0..CHUNK_DIMENSION).map(move |x| (x, y, z)))
        })
    }

    #[test]
    fn test_get_after_set_returns_written_block() {
        let mut section = ChunkSection::new();
        for (x, y, z) in all_coordinates() {
            let id = ((x + y * 3 + z * 7) % 5) as BlockId;
            section.set(x, y, z, id);
        }
        for (x, y, z) in all_coordinates() {
            assert_eq!(section.get(x, y, z), ((x + y * 3 + z * 7) % 5) as BlockId);
        }
    }

    #[test]
    fn test_out_of_bounds_reads_air_and_never_mutates() {
        let mut section = ChunkSection::uniform(3);
        for (x, y, z) in [(-1, 0, 0), (16, 0, 0), (0, -1, 0), (0, 16, 0), (0, 0, 16)] {
            assert_eq!(section.get(x, y, z), AIR);
            assert_eq!(section.set(x, y, z, 7), None);
        }
        assert!(section.is_uniform());
        assert_eq!(section.get(0, 0, 0), 3);
    }

    #[test]
    fn test_first_divergent_write_converts_to_dense_seeded_with_uniform_id() {
        let mut section = ChunkSection::uniform(2);
        assert_eq!(section.dense_memory_bytes(), 0);

        assert_eq!(section.set(4, 4, 4, AIR), Some(2));

        assert!(!section.is_uniform());
        assert_eq!(section.get(0, 0, 0), 2);
        assert_eq!(section.get(4, 4, 4), AIR);
        assert_eq!(section.non_empty_count(), CHUNK_SIZE as u32 - 1);
        assert!(!section.is_full());
        assert!(!section.is_empty());
    }

    #[test]
    fn test_writing_the_uniform_id_stays_uniform() {
        let mut section = ChunkSection::uniform(2);
        section.set(1, 1, 1, 2);
        assert!(section.is_uniform());
    }

    #[test]
    fn test_filling_by_set_then_optimize_reverts_to_uniform() {
        let mut section = ChunkSection::new();
        section.set(0, 0, 0, 9);
        for (x, y, z) in all_coordinates() {
            section.set(x, y, z, 4);
        }
        assert!(section.is_full());
        assert!(section.dense_memory_bytes() > 0);

        assert!(section.optimize());

        assert!(section.is_uniform());
        assert_eq!(section.dense_memory_bytes(), 0);
        for (x, y, z) in all_coordinates() {
            assert_eq!(section.get(x, y, z), 4);
        }
        assert!(section.is_full());
    }

    #[test]
    fn test_optimize_keeps_mixed_sections_dense() {
        let mut section = ChunkSection::new();
        section.set(3, 3, 3, 1);
        assert!(!section.optimize());
        assert_eq!(section.get(3, 3, 3), 1);
    }

    #[test]
    fn test_emptiness_tracks_the_counter() {
        let mut section = ChunkSection::new();
        section.set(5, 5, 5, 1);
        assert!(!section.is_empty());
        section.set(5, 5, 5, AIR);
        assert!(section.is_empty());
        assert!(!section.is_uniform());
    }

    #[test]
    fn test_from_blocks_rejects_wrong_length_and_folds_uniform() {
        assert!(ChunkSection::from_blocks(vec![1; 10].into_boxed_slice()).is_none());

        let section =
            ChunkSection::from_blocks(vec![1; CHUNK_SIZE as usize].into_boxed_slice()).unwrap();
        assert!(section.is_uniform());
        assert!(section.is_full());
    }
}
