//! Greedy meshing implementation for voxel rendering.
//!
//! Each of the six face directions is swept one layer at a time. For every layer
//! a 16x16 visibility mask is built (one `u32` per row, one bit per voxel) marking
//! solid voxels whose neighbour in the face direction is empty. Runs of set bits
//! are then grown into rectangles, first along a row and then across whole rows,
//! as long as the block id and the four corner occlusion levels match.
//!
//! All neighbour lookups go through a [`Halo`], so the sweep never touches the
//! world and needs no locks.

use std::sync::Arc;

use log::trace;
use web_time::Instant;

use crate::{
    core::CancellationToken,
    engine_state::voxels::{
        block::{block_side::BlockSide, is_solid, BlockId, BlockRegistry, AIR},
        chunk::{column::ChunkColumn, halo::Halo, CHUNK_DIMENSION},
        world::World,
    },
};

use super::{ambient_occlusion, face::Face, mesh::ChunkMesh};

const DIM: usize = CHUNK_DIMENSION as usize;

/// Visible-face data for one layer of one direction.
struct LayerMask {
    rows: [u32; DIM],
    blocks: [[BlockId; DIM]; DIM],
    ao: [[u8; DIM]; DIM],
}

impl LayerMask {
    fn new() -> Self {
        Self {
            rows: [0; DIM],
            blocks: [[AIR; DIM]; DIM],
            ao: [[0; DIM]; DIM],
        }
    }

    #[inline]
    fn key(&self, u: usize, v: usize) -> (BlockId, u8) {
        (self.blocks[u][v], self.ao[u][v])
    }
}

/// Maps sweep coordinates back to `(x, y, z)` for the given face axis.
#[inline]
fn to_xyz(axis: usize, layer: i32, u: i32, v: i32) -> (i32, i32, i32) {
    let mut position = [0; 3];
    position[axis] = layer;
    position[(axis + 1) % 3] = u;
    position[(axis + 2) % 3] = v;
    (position[0], position[1], position[2])
}

#[inline]
fn solid_at(halo: &Halo, axis: usize, layer: i32, u: i32, v: i32) -> bool {
    let (x, y, z) = to_xyz(axis, layer, u, v);
    halo.is_solid(x, y, z)
}

/// Occlusion levels for the face of voxel `(layer, u, v)`, sampled in the
/// empty layer the face looks into.
fn face_ao(halo: &Halo, axis: usize, front: i32, u: i32, v: i32) -> u8 {
    const CORNERS: [(i32, i32); 4] = [(-1, -1), (1, -1), (1, 1), (-1, 1)];
    let levels = CORNERS.map(|(du, dv)| {
        ambient_occlusion::vertex_ao(
            solid_at(halo, axis, front, u + du, v),
            solid_at(halo, axis, front, u, v + dv),
            solid_at(halo, axis, front, u + du, v + dv),
        )
    });
    ambient_occlusion::pack(levels)
}

fn build_layer_mask(halo: &Halo, side: BlockSide, layer: i32, mask: &mut LayerMask) {
    let axis = side.axis();
    let front = layer + if side.is_positive() { 1 } else { -1 };
    mask.rows = [0; DIM];

    for u in 0..DIM {
        for v in 0..DIM {
            let (x, y, z) = to_xyz(axis, layer, u as i32, v as i32);
            let block = halo.get(x, y, z);
            if !is_solid(block) || solid_at(halo, axis, front, u as i32, v as i32) {
                continue;
            }
            mask.rows[u] |= 1 << v;
            mask.blocks[u][v] = block;
            mask.ao[u][v] = face_ao(halo, axis, front, u as i32, v as i32);
        }
    }
}

/// Consumes `mask` and emits one face per maximal rectangle.
fn merge_layer(side: BlockSide, layer: i32, mask: &mut LayerMask, faces: &mut Vec<Face>) {
    for u in 0..DIM {
        while mask.rows[u] != 0 {
            let v = mask.rows[u].trailing_zeros() as usize;
            let key = mask.key(u, v);

            let mut width = 1;
            while v + width < DIM
                && mask.rows[u] & (1 << (v + width)) != 0
                && mask.key(u, v + width) == key
            {
                width += 1;
            }
            let span = ((1u32 << width) - 1) << v;

            let mut height = 1;
            while u + height < DIM {
                let row = u + height;
                let fits = mask.rows[row] & span == span
                    && (v..v + width).all(|column| mask.key(row, column) == key);
                if !fits {
                    break;
                }
                mask.rows[row] &= !span;
                height += 1;
            }
            mask.rows[u] &= !span;

            faces.push(Face {
                block_side: side,
                block: key.0,
                layer,
                u: u as i32,
                v: v as i32,
                height: height as i32,
                width: width as i32,
                ao: key.1,
            });
        }
    }
}

/// Greedy-meshes the interior of `halo`.
///
/// Returns `None` if `cancel` is raised between direction sweeps.
pub fn greedy_mesh(
    halo: &Halo,
    registry: &BlockRegistry,
    cancel: &CancellationToken,
) -> Option<ChunkMesh> {
    let mut mesh = ChunkMesh::new();
    let mut mask = LayerMask::new();
    let mut faces = Vec::new();

    for side in BlockSide::all() {
        if cancel.is_cancelled() {
            return None;
        }
        for layer in 0..CHUNK_DIMENSION {
            build_layer_mask(halo, side, layer, &mut mask);
            merge_layer(side, layer, &mut mask, &mut faces);
        }
        for face in faces.drain(..) {
            mesh.push_face(&face, registry);
        }
    }

    Some(mesh)
}

/// Builds the mesh for section `y` of `column`.
///
/// Empty sections and sections hidden behind six full neighbours produce an
/// empty mesh without reading any voxels. Returns `None` when cancelled.
pub fn generate_section_mesh(
    world: &World,
    column: &Arc<ChunkColumn>,
    y: usize,
    registry: &BlockRegistry,
    cancel: &CancellationToken,
) -> Option<ChunkMesh> {
    if column.is_section_empty(y) || world.is_section_occluded(column, y) {
        return Some(ChunkMesh::new());
    }

    let start = Instant::now();
    let mut halo = Halo::new();
    world.fill_halo(column, y, &mut halo);
    if cancel.is_cancelled() {
        return None;
    }

    let mesh = greedy_mesh(&halo, registry, cancel)?;
    trace!(
        "Meshed section {:?}/{} into {} quads in {:?}",
        column.position(),
        y,
        mesh.quad_count(),
        start.elapsed()
    );
    Some(mesh)
}
