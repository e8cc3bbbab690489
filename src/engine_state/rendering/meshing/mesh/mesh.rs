//! CPU-side mesh output for one section.

use super::{ambient_occlusion, face::Face};
use crate::engine_state::{rendering::Vertex, voxels::block::BlockRegistry};

/// Interleaved vertices and triangle indices for one section.
///
/// Indices are relative to the first vertex of this mesh; the draw command's base
/// vertex places them inside the shared vertex buffer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Appends one face as 4 vertices and 6 indices.
    ///
    /// The quad is split through the corner pair with the higher combined
    /// brightness, so the interpolated occlusion does not show a crease.
    pub fn push_face(&mut self, face: &Face, registry: &BlockRegistry) {
        let base = self.vertices.len() as u32;
        let texture_index = registry.texture_index(face.block, face.block_side);
        let corners = face.corners();
        let tex_coords = face.tex_coords();

        for ((position, level), [u, v]) in corners.iter().zip(tex_coords) {
            self.vertices.push(Vertex::new(
                *position,
                texture_index,
                u,
                v,
                ambient_occlusion::weight(*level),
            ));
        }

        let levels = corners.map(|(_, level)| level);
        let pattern: [u32; 6] = if ambient_occlusion::split_along_0_2(levels) {
            [0, 1, 2, 2, 3, 0]
        } else {
            [1, 2, 3, 3, 0, 1]
        };
        self.indices.extend(pattern.iter().map(|index| base + index));
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;
    use crate::engine_state::voxels::block::{block_side::BlockSide, block_type::BlockType};

    fn unit_face(block_side: BlockSide, levels: [u8; 4]) -> Face {
        Face {
            block_side,
            block: BlockType::STONE.id(),
            layer: 0,
            u: 0,
            v: 0,
            height: 1,
            width: 1,
            ao: ambient_occlusion::pack(levels),
        }
    }

    fn meshed(face: &Face) -> ChunkMesh {
        let mut mesh = ChunkMesh::new();
        mesh.push_face(face, &BlockRegistry::default());
        mesh
    }

    /// The two vertices both triangles share, in ascending order.
    fn shared_edge(indices: &[u32]) -> Vec<u32> {
        let mut shared: Vec<u32> = indices[..3]
            .iter()
            .copied()
            .filter(|index| indices[3..].contains(index))
            .collect();
        shared.sort_unstable();
        shared
    }

    fn assert_vertices_follow_corners(face: &Face, mesh: &ChunkMesh) {
        for (vertex, (position, level)) in mesh.vertices.iter().zip(face.corners()) {
            assert_eq!(vertex.position(), position);
            assert_eq!(vertex.ao, ambient_occlusion::weight(level));
        }
    }

    #[test]
    fn test_bright_0_2_pair_splits_along_0_2() {
        let face = unit_face(BlockSide::TOP, [3, 0, 3, 0]);
        let mesh = meshed(&face);

        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);
        assert_eq!(shared_edge(&mesh.indices), vec![0, 2]);
        assert_vertices_follow_corners(&face, &mesh);
        assert_eq!(mesh.vertices[0].ao, 1.0);
        assert_eq!(mesh.vertices[1].ao, ambient_occlusion::weight(0));
    }

    #[test]
    fn test_bright_1_3_pair_splits_along_1_3() {
        let face = unit_face(BlockSide::RIGHT, [0, 3, 1, 3]);
        let mesh = meshed(&face);

        assert_eq!(mesh.indices, vec![1, 2, 3, 3, 0, 1]);
        assert_eq!(shared_edge(&mesh.indices), vec![1, 3]);
        assert_vertices_follow_corners(&face, &mesh);

        // Ties keep the 1-3 split.
        let even = meshed(&unit_face(BlockSide::RIGHT, [2, 2, 2, 2]));
        assert_eq!(shared_edge(&even.indices), vec![1, 3]);
    }

    #[test]
    fn test_negative_side_reorders_levels_with_the_corners() {
        // Packed levels are in (-u,-v), (+u,-v), (+u,+v), (-u,+v) order. A negative
        // side emits (-u,+v) second, so its level must travel with it.
        let face = unit_face(BlockSide::BOTTOM, [3, 2, 3, 0]);
        let mesh = meshed(&face);
        assert_vertices_follow_corners(&face, &mesh);

        // BOTTOM has u along z and v along x.
        assert_eq!(mesh.vertices[1].position(), Point3::new(1, 0, 0));
        assert_eq!(mesh.vertices[1].ao, ambient_occlusion::weight(0));
        assert_eq!(mesh.vertices[3].position(), Point3::new(0, 0, 1));
        assert_eq!(mesh.vertices[3].ao, ambient_occlusion::weight(2));

        assert_eq!(shared_edge(&mesh.indices), vec![0, 2]);
        assert_eq!(mesh.vertices[0].ao, 1.0);
        assert_eq!(mesh.vertices[2].ao, 1.0);
    }

    #[test]
    fn test_faces_append_with_a_base_offset() {
        let mut mesh = ChunkMesh::new();
        let registry = BlockRegistry::default();
        mesh.push_face(&unit_face(BlockSide::TOP, [3; 4]), &registry);
        mesh.push_face(&unit_face(BlockSide::TOP, [3, 0, 3, 0]), &registry);

        assert_eq!(mesh.quad_count(), 2);
        assert_eq!(mesh.index_count(), 12);
        assert_eq!(&mesh.indices[6..], &[4, 5, 6, 6, 7, 4]);
    }
}
