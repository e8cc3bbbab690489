//! A section's voxels padded with one layer of neighbouring voxels.
//!
//! The greedy mesher never reaches across section or column boundaries itself: it
//! reads an 18x18x18 [`Halo`] filled up front by
//! [`World::fill_halo`](crate::engine_state::voxels::world::World::fill_halo).
//! Local coordinates run from `-1` to `CHUNK_DIMENSION` inclusive on every axis.

use super::{ChunkSection, SectionBlocks, CHUNK_DIMENSION};
use crate::engine_state::voxels::block::{is_solid, BlockId, AIR};

/// The dimension of a section including one padding layer on each side.
pub const CHUNK_DIMENSION_WRAPPED: usize = (CHUNK_DIMENSION + 2) as usize;
/// The number of blocks in a wrapped 2D plane.
pub const CHUNK_PLANE_SIZE_WRAPPED: usize = CHUNK_DIMENSION_WRAPPED * CHUNK_DIMENSION_WRAPPED;
/// The total number of blocks in a wrapped section.
pub const CHUNK_SIZE_WRAPPED: usize = CHUNK_PLANE_SIZE_WRAPPED * CHUNK_DIMENSION_WRAPPED;

#[derive(Debug, Clone)]
pub struct Halo {
    blocks: Box<[BlockId]>,
}

impl Default for Halo {
    fn default() -> Self {
        Self::new()
    }
}

impl Halo {
    /// An all-air halo.
    pub fn new() -> Self {
        Self {
            blocks: vec![AIR; CHUNK_SIZE_WRAPPED].into_boxed_slice(),
        }
    }

    /// A halo holding `section` in its interior and air all around.
    pub fn from_section(section: &ChunkSection) -> Self {
        let mut halo = Self::new();
        halo.copy_from_section(section, [0; 3]);
        halo
    }

    #[inline]
    fn index(x: i32, y: i32, z: i32) -> Option<usize> {
        let range = -1..=CHUNK_DIMENSION;
        if range.contains(&x) && range.contains(&y) && range.contains(&z) {
            Some(
                (x + 1) as usize
                    + (z + 1) as usize * CHUNK_DIMENSION_WRAPPED
                    + (y + 1) as usize * CHUNK_PLANE_SIZE_WRAPPED,
            )
        } else {
            None
        }
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockId {
        Self::index(x, y, z).map_or(AIR, |index| self.blocks[index])
    }

    #[inline]
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        is_solid(self.get(x, y, z))
    }

    pub fn set(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        if let Some(index) = Self::index(x, y, z) {
            self.blocks[index] = id;
        }
    }

    pub fn clear(&mut self) {
        self.blocks.fill(AIR);
    }

    /// Copies the part of a neighbouring section that overlaps this halo.
    ///
    /// `offset` is the neighbour's position relative to the centre section, each
    /// component in `-1..=1`. An offset of `[0, 0, 0]` copies the interior.
    pub fn copy_from_section(&mut self, section: &ChunkSection, offset: [i32; 3]) {
        let [x_range, y_range, z_range] = offset.map(overlap);

        if let SectionBlocks::Uniform(id) = section.blocks() {
            let id = *id;
            for (local_y, _) in y_range {
                for (local_z, _) in z_range.clone() {
                    for (local_x, _) in x_range.clone() {
                        self.set(local_x, local_y, local_z, id);
                    }
                }
            }
            return;
        }

        for (local_y, source_y) in y_range {
            for (local_z, source_z) in z_range.clone() {
                for (local_x, source_x) in x_range.clone() {
                    self.set(
                        local_x,
                        local_y,
                        local_z,
                        section.get(source_x, source_y, source_z),
                    );
                }
            }
        }
    }
}

/// For a neighbour offset along one axis, pairs of (halo coordinate, coordinate
/// inside the neighbour section) that overlap.
fn overlap(offset: i32) -> OverlapRange {
    match offset {
        -1 => OverlapRange {
            start: -1,
            end: 0,
            shift: CHUNK_DIMENSION,
        },
        1 => OverlapRange {
            start: CHUNK_DIMENSION,
            end: CHUNK_DIMENSION + 1,
            shift: -CHUNK_DIMENSION,
        },
        _ => OverlapRange {
            start: 0,
            end: CHUNK_DIMENSION,
            shift: 0,
        },
    }
}

#[derive(Debug, Clone)]
struct OverlapRange {
    start: i32,
    end: i32,
    shift: i32,
}

impl Iterator for OverlapRange {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.end {
            return None;
        }
        let local = self.start;
        self.start += 1;
        Some((local, local + self.shift))
    }
}
