//! # Chunk Lifecycle Management
//!
//! The `ChunkManager` decides which columns are resident around the observer and
//! drives every section through its mesh lifecycle:
//!
//! ```text
//! load_column ─▶ (generation task) ─▶ complete_generation ─▶ mark_section_for_remeshing
//!                                                                 │
//!            deferred until all four neighbours are generated ◀───┤
//!                                                                 ▼
//!                                                         MeshRequest (version)
//! ```
//!
//! The manager never talks to the worker pool directly. It accumulates
//! generation requests, mesh requests and unloaded column keys, and the engine
//! drains them once per update. All methods run on the main thread; workers only
//! touch columns through `Arc` handles and the atomic section states.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use cgmath::{Point2, Point3};
use log::{debug, trace};

use super::{
    block::BlockId,
    chunk::{
        column::{
            local_index, ChunkColumn, ColumnPosition, COLUMN_HEIGHT, SURROUNDING_COLUMNS,
        },
        section_state::SectionState,
    },
    persistence::ModificationStore,
    world::{SectionKey, World},
};

/// A section waiting to be meshed for dirty cycle `version`.
#[derive(Debug, Clone)]
pub struct MeshRequest {
    pub column: Arc<ChunkColumn>,
    pub y: usize,
    pub version: u32,
}

impl MeshRequest {
    pub fn key(&self) -> SectionKey {
        SectionKey::new(self.column.position(), self.y)
    }
}

#[derive(Debug)]
pub struct ChunkManager {
    world: Arc<World>,
    modifications: ModificationStore,
    render_distance: u32,
    center: Option<ColumnPosition>,
    pending_generation: Vec<Arc<ChunkColumn>>,
    pending_meshes: HashMap<SectionKey, MeshRequest>,
    /// Sections marked while a horizontal neighbour was missing or ungenerated
    deferred: HashSet<SectionKey>,
    unloaded: Vec<ColumnPosition>,
}

#[inline]
fn distance_squared(a: ColumnPosition, b: ColumnPosition) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dz = (a.y - b.y) as i64;
    dx * dx + dz * dz
}

impl ChunkManager {
    pub fn new(world: Arc<World>, modifications: ModificationStore, render_distance: u32) -> Self {
        Self {
            world,
            modifications,
            render_distance,
            center: None,
            pending_generation: Vec::new(),
            pending_meshes: HashMap::new(),
            deferred: HashSet::new(),
            unloaded: Vec::new(),
        }
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn render_distance(&self) -> u32 {
        self.render_distance
    }

    /// Column the observer was in at the last update.
    pub fn observer_column(&self) -> Option<ColumnPosition> {
        self.center
    }

    pub fn modifications(&self) -> &ModificationStore {
        &self.modifications
    }

    /// Loads and unloads columns for an observer at `position`.
    ///
    /// Columns further than `render_distance + 2` are unloaded, and missing
    /// columns within `render_distance` are requested nearest-first. The gap
    /// between the two radii keeps columns from flickering at the boundary.
    /// Nothing happens while the observer stays in the same column.
    pub fn update_observer(&mut self, position: Point3<f32>) {
        let center = World::observer_column(position);
        if self.center == Some(center) {
            return;
        }
        self.center = Some(center);

        let radius = self.render_distance as i64;
        let unload_radius = radius + 2;
        for column in self.world.column_positions() {
            if distance_squared(column, center) > unload_radius * unload_radius {
                self.unload_column(column);
            }
        }

        let r = self.render_distance as i32;
        let mut missing: Vec<ColumnPosition> = (-r..=r)
            .flat_map(|dx| (-r..=r).map(move |dz| Point2::new(center.x + dx, center.y + dz)))
            .filter(|column| distance_squared(*column, center) <= radius * radius)
            .filter(|column| !self.world.contains_column(*column))
            .collect();
        missing.sort_by_key(|column| distance_squared(*column, center));

        for column in missing {
            self.load_column(column);
        }
    }

    /// Inserts an empty column and queues it for generation.
    ///
    /// Returns `false` if the column is already loaded.
    pub fn load_column(&mut self, position: ColumnPosition) -> bool {
        let Some(column) = self.world.insert_column(position) else {
            return false;
        };
        debug!("Loading column {:?}", position);
        self.pending_generation.push(column);
        true
    }

    /// Removes a column from the world and re-marks its generated neighbours.
    ///
    /// In-flight work for the column is not cancelled; its results fail the
    /// identity check when they come back.
    pub fn unload_column(&mut self, position: ColumnPosition) -> bool {
        let Some(column) = self.world.remove_column(position) else {
            return false;
        };
        debug!("Unloading column {:?}", position);

        self.pending_generation
            .retain(|pending| !Arc::ptr_eq(pending, &column));
        self.pending_meshes.retain(|key, _| key.column != position);
        self.deferred.retain(|key| key.column != position);
        self.unloaded.push(position);

        for neighbor in self.generated_neighbors(position) {
            for y in 0..COLUMN_HEIGHT {
                self.mark_section_for_remeshing(&neighbor, y);
            }
        }
        true
    }

    /// Generated columns at all eight surrounding offsets. Diagonal columns feed
    /// corner ambient occlusion, so they invalidate meshes too.
    fn generated_neighbors(&self, position: ColumnPosition) -> Vec<Arc<ChunkColumn>> {
        SURROUNDING_COLUMNS
            .iter()
            .filter_map(|(dx, dz)| {
                self.world
                    .get_column(Point2::new(position.x + dx, position.y + dz))
            })
            .filter(|column| column.is_generated())
            .collect()
    }

    /// Publishes a generated column: applies stored edits, flags it generated and
    /// marks its sections and those of its generated neighbours for meshing.
    ///
    /// Returns `false` (and does nothing) if `column` is no longer the instance
    /// loaded under its key.
    pub fn complete_generation(&mut self, column: &Arc<ChunkColumn>) -> bool {
        if !self.world.is_current(column) || column.is_generated() {
            trace!("Discarding generation for {:?}", column.position());
            return false;
        }

        let applied = self.modifications.apply(column);
        if applied > 0 {
            debug!(
                "Applied {} modifications to column {:?}",
                applied,
                column.position()
            );
        }
        column.set_generated();

        for y in 0..COLUMN_HEIGHT {
            self.mark_section_for_remeshing(column, y);
        }
        for neighbor in self.generated_neighbors(column.position()) {
            for y in 0..COLUMN_HEIGHT {
                self.mark_section_for_remeshing(&neighbor, y);
            }
        }
        true
    }

    /// Starts a new dirty cycle for section `y` and requests a mesh once every
    /// horizontal neighbour is generated.
    pub fn mark_section_for_remeshing(&mut self, column: &Arc<ChunkColumn>, y: usize) {
        if !column.is_generated() || !self.world.is_current(column) {
            return;
        }
        let Some(state) = column.section_state(y) else {
            return;
        };
        let version = state.mark_awaiting();
        let key = SectionKey::new(column.position(), y);

        if !self.world.horizontal_neighbors_generated(column.position()) {
            trace!("Deferring mesh for {:?}", key);
            self.deferred.insert(key);
            return;
        }

        self.deferred.remove(&key);
        self.pending_meshes.insert(
            key,
            MeshRequest {
                column: column.clone(),
                y,
                version,
            },
        );
    }

    /// Edits one block and marks every section whose halo contains it.
    ///
    /// Returns `false` if the column is not generated, the position is outside
    /// the column range, or the block already had that id.
    pub fn set_block(&mut self, position: Point3<i32>, id: BlockId) -> bool {
        let Some(local) = World::world_to_local(position) else {
            return false;
        };
        let Some(previous) = self.world.set_block(position, id) else {
            return false;
        };
        if previous == id {
            return false;
        }
        if let Some(index) = local_index(local.x, local.y, local.z) {
            self.modifications.record(local.column, index, id, previous);
        }

        for key in World::affected_sections(position) {
            if let Some(column) = self.world.get_column(key.column) {
                self.mark_section_for_remeshing(&column, key.y);
            }
        }
        true
    }

    pub fn get_block(&self, position: Point3<i32>) -> BlockId {
        self.world.get_block(position)
    }

    /// Current state of one section, if its column is loaded.
    pub fn section_state(&self, key: SectionKey) -> Option<SectionState> {
        self.world
            .get_column(key.column)
            .and_then(|column| column.section_state(key.y).map(|state| state.state()))
    }

    /// Columns waiting for a generation task, nearest first.
    pub fn drain_generation_requests(&mut self) -> Vec<Arc<ChunkColumn>> {
        std::mem::take(&mut self.pending_generation)
    }

    pub fn drain_mesh_requests(&mut self) -> Vec<MeshRequest> {
        self.pending_meshes.drain().map(|(_, request)| request).collect()
    }

    /// Keys of columns unloaded since the last call, whose geometry must be freed.
    pub fn drain_unloaded(&mut self) -> Vec<ColumnPosition> {
        std::mem::take(&mut self.unloaded)
    }

    pub fn pending_generation_count(&self) -> usize {
        self.pending_generation.len()
    }

    pub fn pending_mesh_count(&self) -> usize {
        self.pending_meshes.len()
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }
}
