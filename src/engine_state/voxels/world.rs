//! # World Module
//!
//! This module provides the `World` struct, the coordinate façade over every loaded
//! [`ChunkColumn`].
//!
//! ## Architecture
//!
//! Columns live in a sharded concurrent map keyed by their horizontal grid position,
//! so the main thread can insert and remove columns while workers look them up.
//! Lookups hand out `Arc` clones and never hold a shard lock while a section lock
//! is taken.
//!
//! World-space block coordinates are split into a column key, a section index and
//! section-local coordinates with Euclidean division, so negative coordinates map
//! onto the column "below" them rather than onto column zero.

use std::sync::Arc;

use cgmath::{Point2, Point3};
use dashmap::{mapref::entry::Entry, DashMap};

use crate::engine_state::voxels::{
    block::{BlockId, AIR},
    chunk::{
        column::{
            ChunkColumn, ColumnPosition, COLUMN_HEIGHT, COLUMN_HEIGHT_BLOCKS,
            HORIZONTAL_NEIGHBORS,
        },
        halo::Halo,
        CHUNK_DIMENSION,
    },
};

/// Identifies one section: a column key plus the vertical section index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionKey {
    pub column: ColumnPosition,
    pub y: usize,
}

impl SectionKey {
    pub fn new(column: ColumnPosition, y: usize) -> Self {
        Self { column, y }
    }

    /// World-space block coordinate of the section's minimum corner.
    pub fn block_origin(&self) -> Point3<i32> {
        Point3::new(
            self.column.x * CHUNK_DIMENSION,
            self.y as i32 * CHUNK_DIMENSION,
            self.column.y * CHUNK_DIMENSION,
        )
    }
}

/// A block position split into its column key and column-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPosition {
    pub column: ColumnPosition,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl LocalPosition {
    pub fn section_y(&self) -> usize {
        (self.y / CHUNK_DIMENSION) as usize
    }
}

/// The set of loaded columns.
///
/// # Examples
///
/// ```
/// use cgmath::{Point2, Point3};
/// use voxel_stream::engine_state::voxels::world::World;
///
/// let world = World::new();
/// let column = world.insert_column(Point2::new(-1, 0)).unwrap();
/// column.set_generated();
///
/// assert_eq!(World::world_to_column(Point3::new(-1, 5, 3)), Point2::new(-1, 0));
/// assert_eq!(world.set_block(Point3::new(-1, 5, 3), 2), Some(0));
/// assert_eq!(world.get_block(Point3::new(-1, 5, 3)), 2);
/// ```
#[derive(Debug, Default)]
pub struct World {
    columns: DashMap<ColumnPosition, Arc<ChunkColumn>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column key containing a world-space block position.
    pub fn world_to_column(position: Point3<i32>) -> ColumnPosition {
        Point2::new(
            position.x.div_euclid(CHUNK_DIMENSION),
            position.z.div_euclid(CHUNK_DIMENSION),
        )
    }

    /// Splits a world-space block position. `None` above or below the column range.
    pub fn world_to_local(position: Point3<i32>) -> Option<LocalPosition> {
        if !(0..COLUMN_HEIGHT_BLOCKS).contains(&position.y) {
            return None;
        }
        Some(LocalPosition {
            column: Self::world_to_column(position),
            x: position.x.rem_euclid(CHUNK_DIMENSION),
            y: position.y,
            z: position.z.rem_euclid(CHUNK_DIMENSION),
        })
    }

    /// Column key under a floating point world position (the observer).
    pub fn observer_column(position: Point3<f32>) -> ColumnPosition {
        Self::world_to_column(Point3::new(
            position.x.floor() as i32,
            0,
            position.z.floor() as i32,
        ))
    }

    pub fn get_column(&self, position: ColumnPosition) -> Option<Arc<ChunkColumn>> {
        self.columns.get(&position).map(|entry| entry.value().clone())
    }

    /// `true` if `column` is the instance currently stored under its key.
    pub fn is_current(&self, column: &Arc<ChunkColumn>) -> bool {
        self.columns
            .get(&column.position())
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), column))
    }

    /// Inserts an empty, ungenerated column. Returns `None` if one is already present.
    pub fn insert_column(&self, position: ColumnPosition) -> Option<Arc<ChunkColumn>> {
        match self.columns.entry(position) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let column = Arc::new(ChunkColumn::new(position));
                vacant.insert(column.clone());
                Some(column)
            }
        }
    }

    pub fn remove_column(&self, position: ColumnPosition) -> Option<Arc<ChunkColumn>> {
        self.columns.remove(&position).map(|(_, column)| column)
    }

    pub fn contains_column(&self, position: ColumnPosition) -> bool {
        self.columns.contains_key(&position)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_positions(&self) -> Vec<ColumnPosition> {
        self.columns.iter().map(|entry| *entry.key()).collect()
    }

    /// Snapshot of every loaded column.
    pub fn columns(&self) -> Vec<Arc<ChunkColumn>> {
        self.columns.iter().map(|entry| entry.value().clone()).collect()
    }

    fn generated_column(&self, position: ColumnPosition) -> Option<Arc<ChunkColumn>> {
        self.get_column(position).filter(|column| column.is_generated())
    }

    /// Reads a block. Unloaded columns and positions outside the column range read as air.
    pub fn get_block(&self, position: Point3<i32>) -> BlockId {
        let Some(local) = Self::world_to_local(position) else {
            return AIR;
        };
        self.get_column(local.column)
            .map_or(AIR, |column| column.get_block(local.x, local.y, local.z))
    }

    /// Writes a block into a generated column and returns the replaced identifier.
    ///
    /// Returns `None` (and changes nothing) if the column is missing, still
    /// generating, or the position is outside the column range.
    pub fn set_block(&self, position: Point3<i32>, id: BlockId) -> Option<BlockId> {
        let local = Self::world_to_local(position)?;
        let column = self.generated_column(local.column)?;
        column.set_block(local.x, local.y, local.z, id)
    }

    /// Every section whose halo contains `position`: the owning section and each
    /// face, edge or corner neighbour the voxel touches.
    pub fn affected_sections(position: Point3<i32>) -> Vec<SectionKey> {
        let mut keys: Vec<SectionKey> = Vec::with_capacity(8);
        for dy in -1..=1 {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    let neighbor = Point3::new(position.x + dx, position.y + dy, position.z + dz);
                    let Some(local) = Self::world_to_local(neighbor) else {
                        continue;
                    };
                    let key = SectionKey::new(local.column, local.section_y());
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }

    /// `true` when all four face-adjacent columns are loaded and generated.
    pub fn horizontal_neighbors_generated(&self, position: ColumnPosition) -> bool {
        HORIZONTAL_NEIGHBORS.iter().all(|(dx, dz)| {
            self.generated_column(Point2::new(position.x + dx, position.y + dz))
                .is_some()
        })
    }

    /// `true` if the section is full and so are its six face neighbours.
    ///
    /// Space above and below the column range counts as empty, as do unloaded
    /// columns. This check only reads O(1) section flags.
    pub fn is_section_occluded(&self, column: &ChunkColumn, y: usize) -> bool {
        if !column.is_section_full(y) {
            return false;
        }
        if y == 0 || y + 1 >= COLUMN_HEIGHT {
            return false;
        }
        if !column.is_section_full(y - 1) || !column.is_section_full(y + 1) {
            return false;
        }

        let position = column.position();
        HORIZONTAL_NEIGHBORS.iter().all(|(dx, dz)| {
            self.get_column(Point2::new(position.x + dx, position.y + dz))
                .is_some_and(|neighbor| neighbor.is_section_full(y))
        })
    }

    /// Copies section `y` of `column` and the overlapping layer of all 26
    /// neighbouring sections into `halo`. Missing neighbours leave air behind.
    pub fn fill_halo(&self, column: &Arc<ChunkColumn>, y: usize, halo: &mut Halo) {
        halo.clear();
        let position = column.position();

        for dz in -1..=1 {
            for dx in -1..=1 {
                let neighbor_column = if dx == 0 && dz == 0 {
                    Some(column.clone())
                } else {
                    self.get_column(Point2::new(position.x + dx, position.y + dz))
                };
                let Some(neighbor_column) = neighbor_column else {
                    continue;
                };

                for dy in -1..=1 {
                    let section_y = y as i32 + dy;
                    if !(0..COLUMN_HEIGHT as i32).contains(&section_y) {
                        continue;
                    }
                    if let Some(section) = neighbor_column.section(section_y as usize) {
                        halo.copy_from_section(&section, [dx, dy, dz]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::ChunkSection;

    fn generated_world(radius: i32) -> World {
        let world = World::new();
        for x in -radius..=radius {
            for z in -radius..=radius {
                world
                    .insert_column(Point2::new(x, z))
                    .unwrap()
                    .set_generated();
            }
        }
        world
    }

    #[test]
    fn test_negative_coordinates_use_euclidean_division() {
        let local = World::world_to_local(Point3::new(-1, 20, -17)).unwrap();
        assert_eq!(local.column, Point2::new(-1, -2));
        assert_eq!((local.x, local.y, local.z), (15, 20, 15));
        assert_eq!(local.section_y(), 1);
        assert!(World::world_to_local(Point3::new(0, -1, 0)).is_none());
        assert!(World::world_to_local(Point3::new(0, COLUMN_HEIGHT_BLOCKS, 0)).is_none());
    }

    #[test]
    fn test_edits_require_a_generated_column() {
        let world = World::new();
        let column = world.insert_column(Point2::new(0, 0)).unwrap();
        assert_eq!(world.set_block(Point3::new(1, 1, 1), 3), None);
        assert_eq!(world.get_block(Point3::new(1, 1, 1)), AIR);

        column.set_generated();
        assert_eq!(world.set_block(Point3::new(1, 1, 1), 3), Some(AIR));
        assert_eq!(world.get_block(Point3::new(1, 1, 1)), 3);
    }

    #[test]
    fn test_insert_is_idempotent_and_remove_drops_the_entry() {
        let world = World::new();
        let first = world.insert_column(Point2::new(2, 3)).unwrap();
        assert!(world.insert_column(Point2::new(2, 3)).is_none());
        assert!(world.is_current(&first));

        world.remove_column(Point2::new(2, 3));
        assert!(!world.is_current(&first));

        let second = world.insert_column(Point2::new(2, 3)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_affected_sections_cover_boundary_neighbors() {
        let interior = World::affected_sections(Point3::new(8, 40, 8));
        assert_eq!(interior, vec![SectionKey::new(Point2::new(0, 0), 2)]);

        // A corner voxel touches 2x2x2 sections.
        let corner = World::affected_sections(Point3::new(0, 16, 0));
        assert_eq!(corner.len(), 8);
        assert!(corner.contains(&SectionKey::new(Point2::new(-1, -1), 0)));
        assert!(corner.contains(&SectionKey::new(Point2::new(0, 0), 1)));

        // Nothing below the column range is reported.
        let floor = World::affected_sections(Point3::new(8, 0, 8));
        assert_eq!(floor, vec![SectionKey::new(Point2::new(0, 0), 0)]);
    }

    #[test]
    fn test_fill_halo_crosses_column_and_section_boundaries() {
        let world = generated_world(1);
        world.set_block(Point3::new(16, 5, 3), 4); // east column, x = 0
        world.set_block(Point3::new(2, 16, 2), 5); // section above
        world.set_block(Point3::new(-1, 15, -1), 6); // diagonal column

        let center = world.get_column(Point2::new(0, 0)).unwrap();
        let mut halo = Halo::new();
        world.fill_halo(&center, 0, &mut halo);

        assert_eq!(halo.get(16, 5, 3), 4);
        assert_eq!(halo.get(2, 16, 2), 5);
        assert_eq!(halo.get(-1, 15, -1), 6);
        assert_eq!(halo.get(-1, -1, -1), AIR);
    }

    #[test]
    fn test_occlusion_needs_six_full_neighbors() {
        let world = generated_world(1);
        for column in world.columns() {
            for y in 0..4 {
                *column.section_mut(y).unwrap() = ChunkSection::uniform(5);
            }
        }
        let center = world.get_column(Point2::new(0, 0)).unwrap();

        assert!(world.is_section_occluded(&center, 1));
        assert!(world.is_section_occluded(&center, 2));
        // Bottom of the world and the open section above are not occluders.
        assert!(!world.is_section_occluded(&center, 0));
        assert!(!world.is_section_occluded(&center, 3));

        world.set_block(Point3::new(16, 20, 0), AIR);
        assert!(!world.is_section_occluded(&center, 1));
    }

    #[test]
    fn test_horizontal_neighbors_must_be_generated() {
        let world = generated_world(1);
        assert!(world.horizontal_neighbors_generated(Point2::new(0, 0)));
        assert!(!world.horizontal_neighbors_generated(Point2::new(1, 0)));

        world.remove_column(Point2::new(0, 1));
        world.insert_column(Point2::new(0, 1));
        assert!(!world.horizontal_neighbors_generated(Point2::new(0, 0)));
    }
}
