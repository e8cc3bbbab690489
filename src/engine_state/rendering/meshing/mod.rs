//! Mesh generation and management for voxel rendering.
//!
//! This module handles the conversion of section voxels into GPU-friendly meshes
//! and tracks where each section's geometry lives in the shared buffers.
//!
//! # Architecture
//! - `MeshManager`: owns the vertex and index sub-allocators and the per-section
//!   geometry records the culler draws from
//! - `allocator`: first-fit free-list bookkeeping over element ranges
//! - `mesh/`: greedy meshing with ambient occlusion
//!
//! # Upload Ordering
//! A section's new ranges are allocated and written before its previous ranges
//! are released, so a frame culled between the two always sees complete geometry.

use std::collections::HashMap;

use log::debug;

pub mod allocator;
pub mod mesh;

pub use allocator::FreeListAllocator;
pub use mesh::ChunkMesh;

use crate::{
    engine_state::{
        buffer_state::{GeometrySink, INDEX_BUFFER_NAME, VERTEX_BUFFER_NAME},
        voxels::{
            chunk::column::{ColumnPosition, COLUMN_HEIGHT},
            world::SectionKey,
        },
    },
    error::GeometryError,
};

/// Where one section's geometry lives in the shared buffers.
///
/// Indices are section-local, so drawing uses `vertex_offset` as base vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshGeometry {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub index_offset: u32,
    pub index_count: u32,
}

pub type ColumnGeometry = [Option<MeshGeometry>; COLUMN_HEIGHT];

/// Central manager for resident section geometry.
///
/// # Memory Management
///
/// Vertex and index storage are each one linear buffer carved up by a
/// [`FreeListAllocator`]. When an allocation does not fit, the buffer grows to
/// `max(2 * capacity, capacity + size)` and the allocation is retried once.
#[derive(Debug)]
pub struct MeshManager {
    vertex_allocator: FreeListAllocator,
    index_allocator: FreeListAllocator,
    geometry: HashMap<ColumnPosition, ColumnGeometry>,
    geometry_count: usize,
}

impl MeshManager {
    /// Creates a manager whose allocators span the sink's current buffers.
    pub fn new(sink: &dyn GeometrySink) -> Self {
        Self {
            vertex_allocator: FreeListAllocator::new(sink.vertex_capacity()),
            index_allocator: FreeListAllocator::new(sink.index_capacity()),
            geometry: HashMap::new(),
            geometry_count: 0,
        }
    }

    fn allocate(
        allocator: &mut FreeListAllocator,
        size: u32,
        buffer: &'static str,
        grow: impl FnOnce(u32) -> Result<(), GeometryError>,
    ) -> Result<u32, GeometryError> {
        if let Some(offset) = allocator.allocate(size) {
            return Ok(offset);
        }

        let capacity = allocator.capacity();
        let new_capacity = capacity.saturating_mul(2).max(capacity.saturating_add(size));
        debug!("Growing {} from {} to {} elements", buffer, capacity, new_capacity);
        grow(new_capacity)?;
        allocator.grow(new_capacity);

        allocator.allocate(size).ok_or(GeometryError::OutOfSpace {
            buffer,
            requested: size,
        })
    }

    /// Makes `mesh` the resident geometry of `key`.
    ///
    /// An empty mesh releases whatever `key` had. On error the previous geometry
    /// is left untouched.
    pub fn upload(
        &mut self,
        key: SectionKey,
        mesh: &ChunkMesh,
        sink: &mut dyn GeometrySink,
    ) -> Result<(), GeometryError> {
        if mesh.is_empty() {
            self.release(key);
            return Ok(());
        }

        let vertex_offset = Self::allocate(
            &mut self.vertex_allocator,
            mesh.vertex_count(),
            VERTEX_BUFFER_NAME,
            |capacity| sink.grow_vertex_buffer(capacity),
        )?;
        let index_offset = match Self::allocate(
            &mut self.index_allocator,
            mesh.index_count(),
            INDEX_BUFFER_NAME,
            |capacity| sink.grow_index_buffer(capacity),
        ) {
            Ok(offset) => offset,
            Err(error) => {
                self.vertex_allocator.free(vertex_offset);
                return Err(error);
            }
        };

        sink.write_vertices(vertex_offset, &mesh.vertices);
        sink.write_indices(index_offset, &mesh.indices);

        let geometry = MeshGeometry {
            vertex_offset,
            vertex_count: mesh.vertex_count(),
            index_offset,
            index_count: mesh.index_count(),
        };
        let slot = self
            .geometry
            .entry(key.column)
            .or_insert([None; COLUMN_HEIGHT]);
        match slot[key.y].replace(geometry) {
            Some(previous) => self.free_geometry(previous),
            None => self.geometry_count += 1,
        }
        Ok(())
    }

    fn free_geometry(&mut self, geometry: MeshGeometry) {
        self.vertex_allocator.free(geometry.vertex_offset);
        self.index_allocator.free(geometry.index_offset);
    }

    /// Frees the geometry of one section. Returns `false` if it had none.
    pub fn release(&mut self, key: SectionKey) -> bool {
        let Some(sections) = self.geometry.get_mut(&key.column) else {
            return false;
        };
        let Some(geometry) = sections.get_mut(key.y).and_then(Option::take) else {
            return false;
        };
        if sections.iter().all(Option::is_none) {
            self.geometry.remove(&key.column);
        }
        self.geometry_count -= 1;
        self.free_geometry(geometry);
        true
    }

    /// Frees every section of a column. Returns the number of sections released.
    pub fn release_column(&mut self, position: ColumnPosition) -> usize {
        let Some(sections) = self.geometry.remove(&position) else {
            return 0;
        };
        let mut released = 0;
        for geometry in sections.into_iter().flatten() {
            self.free_geometry(geometry);
            released += 1;
        }
        self.geometry_count -= released;
        released
    }

    pub fn geometry(&self, key: SectionKey) -> Option<MeshGeometry> {
        self.geometry
            .get(&key.column)
            .and_then(|sections| sections.get(key.y).copied().flatten())
    }

    /// Resident geometry grouped by column, in no particular order.
    pub fn columns(&self) -> impl Iterator<Item = (&ColumnPosition, &ColumnGeometry)> {
        self.geometry.iter()
    }

    /// Number of sections with resident geometry.
    pub fn geometry_count(&self) -> usize {
        self.geometry_count
    }

    pub fn vertex_capacity(&self) -> u32 {
        self.vertex_allocator.capacity()
    }

    pub fn index_capacity(&self) -> u32 {
        self.index_allocator.capacity()
    }

    pub fn vertices_used(&self) -> u32 {
        self.vertex_allocator.used()
    }

    pub fn indices_used(&self) -> u32 {
        self.index_allocator.used()
    }
}
