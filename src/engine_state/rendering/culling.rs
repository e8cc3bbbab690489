//! Frustum culling of meshed sections into an indirect draw list.
//!
//! Planes are stored structure-of-arrays in fixed 8-wide lanes so every
//! plane test is a straight loop over `[f32; 8]` the compiler can vectorise. The
//! two spare lanes hold a plane every point is far inside of.

use cgmath::{InnerSpace, Matrix, Matrix4, Point3, Vector4};
use wgpu::util::DrawIndexedIndirectArgs;

use super::meshing::MeshManager;
use crate::engine_state::voxels::{
    chunk::{
        column::{ColumnPosition, COLUMN_HEIGHT_BLOCKS},
        CHUNK_DIMENSION,
    },
    world::SectionKey,
};

const LANES: usize = 8;
const PADDING_DISTANCE: f32 = 1e30;
const MIN_NORMAL_LENGTH: f32 = 1e-6;

/// Radius of the sphere enclosing a 16³ section.
const SECTION_RADIUS: f32 = CHUNK_DIMENSION as f32 * 0.5 * 1.732_050_8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Outside,
    Intersecting,
    Inside,
}

/// Six normalised clip planes extracted from a view-projection matrix.
///
/// A point `p` is inside plane `i` when `n_i · p + d_i >= 0`.
#[derive(Debug, Clone)]
pub struct Frustum {
    nx: [f32; LANES],
    ny: [f32; LANES],
    nz: [f32; LANES],
    d: [f32; LANES],
    /// Set when the matrix produced no usable volume. Nothing is visible.
    empty: bool,
}

impl Frustum {
    /// Extracts planes from a matrix mapping world space to clip space with
    /// depth in `[0, 1]`.
    pub fn from_view_projection(view_projection: &Matrix4<f32>) -> Self {
        let rows: [Vector4<f32>; 4] = [0, 1, 2, 3].map(|i| view_projection.row(i));
        let planes = [
            rows[3] + rows[0],
            rows[3] - rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            rows[2],
            rows[3] - rows[2],
        ];

        let mut frustum = Frustum {
            nx: [0.0; LANES],
            ny: [0.0; LANES],
            nz: [0.0; LANES],
            d: [PADDING_DISTANCE; LANES],
            empty: false,
        };

        for (lane, plane) in planes.iter().enumerate() {
            let length = plane.truncate().magnitude();
            let finite = [plane.x, plane.y, plane.z, plane.w]
                .iter()
                .all(|value| value.is_finite());
            if !finite || length < MIN_NORMAL_LENGTH {
                frustum.empty = true;
                continue;
            }
            frustum.nx[lane] = plane.x / length;
            frustum.ny[lane] = plane.y / length;
            frustum.nz[lane] = plane.z / length;
            frustum.d[lane] = plane.w / length;
        }

        if !frustum.empty {
            frustum.empty = [(0, 1), (2, 3), (4, 5)]
                .iter()
                .any(|&(a, b)| frustum.is_inverted_pair(a, b));
        }
        frustum
    }

    /// Opposing planes facing away from each other leave no point inside both.
    fn is_inverted_pair(&self, a: usize, b: usize) -> bool {
        let dot = self.nx[a] * self.nx[b] + self.ny[a] * self.ny[b] + self.nz[a] * self.nz[b];
        dot < -0.9999 && self.d[a] + self.d[b] < 0.0
    }

    /// `true` if no volume is visible through this frustum.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    #[inline]
    fn distances(&self, point: Point3<f32>) -> [f32; LANES] {
        let mut distances = [0.0; LANES];
        for lane in 0..LANES {
            distances[lane] = self.nx[lane] * point.x
                + self.ny[lane] * point.y
                + self.nz[lane] * point.z
                + self.d[lane];
        }
        distances
    }

    pub fn classify_sphere(&self, center: Point3<f32>, radius: f32) -> Containment {
        if self.empty {
            return Containment::Outside;
        }
        let distances = self.distances(center);
        if distances.iter().any(|&distance| distance < -radius) {
            Containment::Outside
        } else if distances.iter().all(|&distance| distance >= radius) {
            Containment::Inside
        } else {
            Containment::Intersecting
        }
    }

    /// Conservative box test: the box is rejected only if its corner furthest
    /// along some plane normal is still behind that plane.
    pub fn intersects_aabb(&self, min: Point3<f32>, max: Point3<f32>) -> bool {
        if self.empty {
            return false;
        }
        let mut distances = [0.0; LANES];
        for lane in 0..LANES {
            let x = if self.nx[lane] >= 0.0 { max.x } else { min.x };
            let y = if self.ny[lane] >= 0.0 { max.y } else { min.y };
            let z = if self.nz[lane] >= 0.0 { max.z } else { min.z };
            distances[lane] =
                self.nx[lane] * x + self.ny[lane] * y + self.nz[lane] * z + self.d[lane];
        }
        distances.iter().all(|&distance| distance >= 0.0)
    }
}

/// The output of one culling pass, ready for `multi_draw_indexed_indirect`.
///
/// `commands[i]` draws the section at `sections[i]`; its `first_instance` is `i`
/// and selects `instance_offsets[i]`, the section's world-space origin.
#[derive(Debug, Default, Clone)]
pub struct DrawList {
    pub commands: Vec<DrawIndexedIndirectArgs>,
    pub instance_offsets: Vec<[f32; 4]>,
    pub sections: Vec<SectionKey>,
}

impl DrawList {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.instance_offsets.clear();
        self.sections.clear();
    }
}

/// Rebuilds a [`DrawList`] every frame from the resident section geometry.
#[derive(Debug)]
pub struct FrustumCuller {
    draw_list: DrawList,
    max_draw_count: usize,
}

impl FrustumCuller {
    pub fn new(max_draw_count: usize) -> Self {
        Self {
            draw_list: DrawList::default(),
            max_draw_count,
        }
    }

    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    /// Collects every resident section that may be visible through
    /// `view_projection`, up to the draw cap.
    pub fn cull(&mut self, view_projection: &Matrix4<f32>, meshes: &MeshManager) -> &DrawList {
        self.draw_list.clear();
        let frustum = Frustum::from_view_projection(view_projection);
        if frustum.is_empty() {
            return &self.draw_list;
        }

        'columns: for (position, sections) in meshes.columns() {
            let (min, max) = column_bounds(*position);
            if !frustum.intersects_aabb(min, max) {
                continue;
            }

            for (y, geometry) in sections.iter().enumerate() {
                let Some(geometry) = geometry else {
                    continue;
                };
                if geometry.index_count == 0 {
                    continue;
                }

                let key = SectionKey::new(*position, y);
                let origin = key.block_origin();
                let origin = Point3::new(origin.x as f32, origin.y as f32, origin.z as f32);
                if !section_visible(&frustum, origin) {
                    continue;
                }

                if self.draw_list.len() >= self.max_draw_count {
                    break 'columns;
                }
                let slot = self.draw_list.len() as u32;
                self.draw_list.commands.push(DrawIndexedIndirectArgs {
                    index_count: geometry.index_count,
                    instance_count: 1,
                    first_index: geometry.index_offset,
                    base_vertex: geometry.vertex_offset as i32,
                    first_instance: slot,
                });
                self.draw_list
                    .instance_offsets
                    .push([origin.x, origin.y, origin.z, 0.0]);
                self.draw_list.sections.push(key);
            }
        }

        &self.draw_list
    }
}

fn column_bounds(position: ColumnPosition) -> (Point3<f32>, Point3<f32>) {
    let size = CHUNK_DIMENSION as f32;
    let min = Point3::new(position.x as f32 * size, 0.0, position.y as f32 * size);
    let max = Point3::new(min.x + size, COLUMN_HEIGHT_BLOCKS as f32, min.z + size);
    (min, max)
}

fn section_visible(frustum: &Frustum, origin: Point3<f32>) -> bool {
    let half = CHUNK_DIMENSION as f32 * 0.5;
    let center = Point3::new(origin.x + half, origin.y + half, origin.z + half);
    match frustum.classify_sphere(center, SECTION_RADIUS) {
        Containment::Outside => false,
        Containment::Inside => true,
        Containment::Intersecting => {
            let size = CHUNK_DIMENSION as f32;
            let max = Point3::new(origin.x + size, origin.y + size, origin.z + size);
            frustum.intersects_aabb(origin, max)
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Matrix4, SquareMatrix};

    use super::*;
    use crate::engine_state::{
        buffer_state::CpuGeometrySink,
        camera_state::camera::OPENGL_TO_WGPU_MATRIX,
        rendering::meshing::mesh::ChunkMesh,
        rendering::Vertex,
    };

    fn covering_ortho() -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::ortho(-200.0, 200.0, -10.0, 300.0, -200.0, 200.0)
    }

    fn quad_mesh() -> ChunkMesh {
        let vertex = Vertex::new(Point3::new(0, 0, 0), 0, 0.0, 0.0, 1.0);
        ChunkMesh {
            vertices: vec![vertex; 4],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }

    fn resident_sections(count_x: i32, sections: usize) -> (MeshManager, CpuGeometrySink) {
        let mut sink = CpuGeometrySink::new(64, 64);
        let mut meshes = MeshManager::new(&sink);
        for x in 0..count_x {
            for y in 0..sections {
                let key = SectionKey::new(ColumnPosition::new(x, 0), y);
                meshes.upload(key, &quad_mesh(), &mut sink).unwrap();
            }
        }
        (meshes, sink)
    }

    #[test]
    fn test_covering_frustum_draws_everything() {
        let (meshes, _sink) = resident_sections(3, 4);
        let mut culler = FrustumCuller::new(1024);
        let draw_list = culler.cull(&covering_ortho(), &meshes);

        assert_eq!(draw_list.len(), 12);
        for (slot, command) in draw_list.commands.iter().enumerate() {
            assert_eq!(command.first_instance, slot as u32);
            assert_eq!(command.instance_count, 1);
            assert_eq!(command.index_count, 6);
        }
    }

    #[test]
    fn test_instance_offsets_match_section_origins() {
        let (meshes, _sink) = resident_sections(2, 2);
        let mut culler = FrustumCuller::new(1024);
        let draw_list = culler.cull(&covering_ortho(), &meshes);

        for (key, offset) in draw_list.sections.iter().zip(&draw_list.instance_offsets) {
            let origin = key.block_origin();
            assert_eq!(*offset, [origin.x as f32, origin.y as f32, origin.z as f32, 0.0]);
        }
    }

    #[test]
    fn test_sections_outside_the_side_planes_are_skipped() {
        let (meshes, _sink) = resident_sections(3, 1);
        // Only x in [-10, 10] is inside, which column 0 (x 0..16) straddles.
        let narrow =
            OPENGL_TO_WGPU_MATRIX * cgmath::ortho(-10.0, 10.0, -10.0, 300.0, -200.0, 200.0);
        let mut culler = FrustumCuller::new(1024);
        let draw_list = culler.cull(&narrow, &meshes);

        assert_eq!(draw_list.len(), 1);
        assert_eq!(draw_list.sections[0].column, ColumnPosition::new(0, 0));
    }

    #[test]
    fn test_degenerate_matrices_draw_nothing() {
        let (meshes, _sink) = resident_sections(2, 2);
        let mut culler = FrustumCuller::new(1024);

        assert!(culler.cull(&Matrix4::from_value(0.0), &meshes).is_empty());
        assert!(culler.cull(&Matrix4::from_value(f32::NAN), &meshes).is_empty());

        let inverted = Matrix4::from_diagonal(Vector4::new(1.0, 1.0, 1.0, -1.0));
        assert!(Frustum::from_view_projection(&inverted).is_empty());
        assert!(culler.cull(&inverted, &meshes).is_empty());
    }

    #[test]
    fn test_draw_count_is_capped() {
        let (meshes, _sink) = resident_sections(4, 4);
        let mut culler = FrustumCuller::new(5);
        assert_eq!(culler.cull(&covering_ortho(), &meshes).len(), 5);
    }

    #[test]
    fn test_identity_frustum_contains_origin() {
        let frustum = Frustum::from_view_projection(&Matrix4::identity());
        assert!(!frustum.is_empty());
        assert_eq!(
            frustum.classify_sphere(Point3::new(0.0, 0.0, 0.5), 0.1),
            Containment::Inside
        );
        assert_eq!(
            frustum.classify_sphere(Point3::new(5.0, 0.0, 0.5), 0.1),
            Containment::Outside
        );
    }
}
