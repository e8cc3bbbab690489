//! # Chunk Column
//!
//! A vertical stack of [`COLUMN_HEIGHT`] sections at one horizontal grid key.
//!
//! Sections sit behind individual `parking_lot` read-write locks: workers take
//! read locks while copying halos, the main thread takes a write lock per edit.
//! Each section also owns an [`AtomicSectionState`] that is read and updated
//! without any lock.
//!
//! Columns are shared as `Arc<ChunkColumn>`. Removing a column from the world
//! only drops the world's handle, so a worker still holding a clone keeps reading
//! valid memory until it finishes. The last handle frees every section buffer.

use std::sync::atomic::{AtomicBool, Ordering};

use cgmath::Point2;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    section_state::{AtomicSectionState, SectionState},
    ChunkSection, CHUNK_DIMENSION, CHUNK_PLANE_SIZE,
};
use crate::engine_state::voxels::block::{BlockId, AIR};

/// Number of sections stacked in a column.
pub const COLUMN_HEIGHT: usize = 16;
/// Height of a column in blocks.
pub const COLUMN_HEIGHT_BLOCKS: i32 = COLUMN_HEIGHT as i32 * CHUNK_DIMENSION;

/// Horizontal grid key of a column, `(x, z)` in column units.
pub type ColumnPosition = Point2<i32>;

/// The four face-adjacent column offsets.
pub const HORIZONTAL_NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// All eight column offsets whose blocks reach a column's section halos.
pub const SURROUNDING_COLUMNS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

pub struct ChunkColumn {
    position: ColumnPosition,
    sections: Box<[RwLock<ChunkSection>]>,
    states: Box<[AtomicSectionState]>,
    generated: AtomicBool,
}

impl std::fmt::Debug for ChunkColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkColumn")
            .field("position", &self.position)
            .field("generated", &self.is_generated())
            .finish()
    }
}

impl ChunkColumn {
    /// Creates an ungenerated column of all-air sections.
    pub fn new(position: ColumnPosition) -> Self {
        Self {
            position,
            sections: (0..COLUMN_HEIGHT)
                .map(|_| RwLock::new(ChunkSection::new()))
                .collect(),
            states: (0..COLUMN_HEIGHT)
                .map(|_| AtomicSectionState::new())
                .collect(),
            generated: AtomicBool::new(false),
        }
    }

    pub fn position(&self) -> ColumnPosition {
        self.position
    }

    /// World-space block coordinate of the column's minimum corner on x and z.
    pub fn block_origin(&self) -> (i32, i32) {
        (
            self.position.x * CHUNK_DIMENSION,
            self.position.y * CHUNK_DIMENSION,
        )
    }

    pub fn section(&self, y: usize) -> Option<RwLockReadGuard<'_, ChunkSection>> {
        self.sections.get(y).map(|section| section.read())
    }

    pub fn section_mut(&self, y: usize) -> Option<RwLockWriteGuard<'_, ChunkSection>> {
        self.sections.get(y).map(|section| section.write())
    }

    pub fn section_state(&self, y: usize) -> Option<&AtomicSectionState> {
        self.states.get(y)
    }

    /// Snapshot of every section's state, bottom to top.
    pub fn states(&self) -> Vec<SectionState> {
        self.states.iter().map(AtomicSectionState::state).collect()
    }

    pub fn is_generated(&self) -> bool {
        self.generated.load(Ordering::Acquire)
    }

    pub fn set_generated(&self) {
        self.generated.store(true, Ordering::Release);
    }

    pub fn is_section_full(&self, y: usize) -> bool {
        self.section(y).is_some_and(|section| section.is_full())
    }

    pub fn is_section_empty(&self, y: usize) -> bool {
        self.section(y).map_or(true, |section| section.is_empty())
    }

    /// Reads a block by column-local coordinate (`y` spans the whole column).
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        if !(0..COLUMN_HEIGHT_BLOCKS).contains(&y) {
            return AIR;
        }
        let section_y = (y / CHUNK_DIMENSION) as usize;
        self.section(section_y)
            .map_or(AIR, |section| section.get(x, y % CHUNK_DIMENSION, z))
    }

    /// Writes a block by column-local coordinate, returning the replaced id.
    pub fn set_block(&self, x: i32, y: i32, z: i32, id: BlockId) -> Option<BlockId> {
        if !(0..COLUMN_HEIGHT_BLOCKS).contains(&y) {
            return None;
        }
        let section_y = (y / CHUNK_DIMENSION) as usize;
        self.section_mut(section_y)?
            .set(x, y % CHUNK_DIMENSION, z, id)
    }

    /// Releases dense buffers of homogeneous sections. Returns how many collapsed.
    pub fn optimize_sections(&self) -> usize {
        self.sections
            .iter()
            .filter(|section| section.write().optimize())
            .count()
    }

    /// Heap bytes held by dense section buffers.
    pub fn dense_memory_bytes(&self) -> usize {
        self.sections
            .iter()
            .map(|section| section.read().dense_memory_bytes())
            .sum()
    }
}

/// Column-local flat index used by modification records: x, then z, then y.
pub fn local_index(x: i32, y: i32, z: i32) -> Option<u32> {
    let horizontal = 0..CHUNK_DIMENSION;
    if horizontal.contains(&x) && horizontal.contains(&z) && (0..COLUMN_HEIGHT_BLOCKS).contains(&y)
    {
        Some((x + z * CHUNK_DIMENSION + y * CHUNK_PLANE_SIZE) as u32)
    } else {
        None
    }
}

/// Inverse of [`local_index`].
pub fn local_position(index: u32) -> Option<(i32, i32, i32)> {
    if index >= (CHUNK_PLANE_SIZE * COLUMN_HEIGHT_BLOCKS) as u32 {
        return None;
    }
    let index = index as i32;
    let y = index / CHUNK_PLANE_SIZE;
    let rest = index % CHUNK_PLANE_SIZE;
    Some((rest % CHUNK_DIMENSION, y, rest / CHUNK_DIMENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_route_to_the_right_section() {
        let column = ChunkColumn::new(Point2::new(0, 0));
        assert_eq!(column.set_block(1, 37, 2, 4), Some(AIR));

        assert_eq!(column.get_block(1, 37, 2), 4);
        assert_eq!(column.section(2).unwrap().get(1, 5, 2), 4);
        assert!(column.is_section_empty(1));
        assert!(!column.is_section_empty(2));
    }

    #[test]
    fn test_out_of_column_coordinates_are_ignored() {
        let column = ChunkColumn::new(Point2::new(0, 0));
        assert_eq!(column.set_block(0, COLUMN_HEIGHT_BLOCKS, 0, 1), None);
        assert_eq!(column.set_block(0, -1, 0, 1), None);
        assert_eq!(column.get_block(0, -1, 0), AIR);
    }

    #[test]
    fn test_local_index_round_trip() {
        for (x, y, z) in [(0, 0, 0), (15, 255, 15), (3, 100, 9)] {
            let index = local_index(x, y, z).unwrap();
            assert_eq!(local_position(index), Some((x, y, z)));
        }
        assert_eq!(local_index(16, 0, 0), None);
        assert_eq!(local_position(u32::MAX), None);
    }

    #[test]
    fn test_optimize_sections_releases_dense_memory() {
        let column = ChunkColumn::new(Point2::new(0, 0));
        column.set_block(0, 0, 0, 1);
        assert!(column.dense_memory_bytes() > 0);
        column.set_block(0, 0, 0, AIR);

        assert_eq!(column.optimize_sections(), 1);
        assert_eq!(column.dense_memory_bytes(), 0);
    }
}
