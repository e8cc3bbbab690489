//! Vertex data structures and layouts for voxel rendering.
//!
//! This module defines the vertex format emitted by the greedy mesher and the
//! buffer layout the rendering collaborator binds it with.

use cgmath::Point3;

/// A vertex in the voxel rendering pipeline.
///
/// Positions are section-local; the per-draw instance offset recorded by the
/// culler moves them into world space.
///
/// # Memory Layout
/// - Position: 3x i32 (12 bytes)
/// - Texture Index: u32 (4 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Ambient Occlusion: f32 (4 bytes)
///
/// Total size: 28 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// X coordinate in section space
    pub x: i32,
    /// Y coordinate in section space
    pub y: i32,
    /// Z coordinate in section space
    pub z: i32,
    /// Index of the texture in the texture array
    pub texture_index: u32,
    /// UV texture coordinates, in blocks, so textures tile across merged quads
    pub tex_coords: [f32; 2],
    /// Ambient occlusion brightness weight in `(0, 1]`
    pub ao: f32,
}

impl Vertex {
    /// Creates a new vertex with the given parameters.
    ///
    /// # Arguments
    /// * `pos` - The 3D position of the vertex in section space
    /// * `texture_index` - Index of the texture in the texture array
    /// * `u` - U texture coordinate
    /// * `v` - V texture coordinate
    /// * `ao` - Ambient occlusion weight
    pub fn new(pos: Point3<i32>, texture_index: u32, u: f32, v: f32, ao: f32) -> Self {
        Vertex {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            texture_index,
            tex_coords: [u, v],
            ao,
        }
    }

    pub fn position(&self) -> Point3<i32> {
        Point3::new(self.x, self.y, self.z)
    }

    /// Returns the vertex buffer layout description for the shader pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0..=2`: position (i32, i32, i32)
    /// - `location = 3`: texture_index (u32)
    /// - `location = 4`: tex_coords (vec2<f32>)
    /// - `location = 5`: ao (f32)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
            0 => Sint32,
            1 => Sint32,
            2 => Sint32,
            3 => Uint32,
            4 => Float32x2,
            5 => Float32,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_struct() {
        let layout = Vertex::desc();
        assert_eq!(layout.array_stride, 28);
        assert_eq!(std::mem::size_of::<Vertex>(), 28);

        let offsets: Vec<u64> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8, 12, 16, 24]);
    }
}
