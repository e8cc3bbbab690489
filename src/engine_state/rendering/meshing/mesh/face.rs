use cgmath::Point3;

use super::ambient_occlusion;
use crate::engine_state::voxels::block::{block_side::BlockSide, BlockId};

/// A merged rectangle of visible voxel faces produced by the greedy pass.
///
/// The rectangle lies on one block side's plane. `u` and `v` are its coordinates
/// along the two axes tangent to that plane, following the cyclic order
/// `u = (axis + 1) % 3`, `v = (axis + 2) % 3`. With that order the corners
/// `(0,0) → (1,0) → (1,1) → (0,1)` wind counter-clockwise seen from the positive
/// side of `axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Which side of the block this face represents
    pub block_side: BlockSide,
    pub block: BlockId,
    /// Voxel layer along the face axis (the solid voxel's coordinate)
    pub layer: i32,
    pub u: i32,
    pub v: i32,
    /// Extent along `u`
    pub height: i32,
    /// Extent along `v`
    pub width: i32,
    /// Packed per-corner occlusion levels, corners ordered
    /// `(-u,-v), (+u,-v), (+u,+v), (-u,+v)`.
    pub ao: u8,
}

impl Face {
    /// Corner positions and occlusion levels in counter-clockwise order as seen
    /// from outside the block.
    pub fn corners(&self) -> [(Point3<i32>, u8); 4] {
        let axis = self.block_side.axis();
        let u_axis = (axis + 1) % 3;
        let v_axis = (axis + 2) % 3;
        let plane = self.layer + self.block_side.is_positive() as i32;
        let levels = ambient_occlusion::unpack(self.ao);

        let corner = |du: i32, dv: i32| {
            let mut position = [0; 3];
            position[axis] = plane;
            position[u_axis] = self.u + du * self.height;
            position[v_axis] = self.v + dv * self.width;
            Point3::from(position)
        };

        let ccw = [
            (corner(0, 0), levels[0]),
            (corner(1, 0), levels[1]),
            (corner(1, 1), levels[2]),
            (corner(0, 1), levels[3]),
        ];

        if self.block_side.is_positive() {
            ccw
        } else {
            [ccw[0], ccw[3], ccw[2], ccw[1]]
        }
    }

    /// Texture coordinates for each corner returned by [`Face::corners`].
    pub fn tex_coords(&self) -> [[f32; 2]; 4] {
        let (h, w) = (self.height as f32, self.width as f32);
        let ccw = [[0.0, 0.0], [h, 0.0], [h, w], [0.0, w]];
        if self.block_side.is_positive() {
            ccw
        } else {
            [ccw[0], ccw[3], ccw[2], ccw[1]]
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{EuclideanSpace, InnerSpace, Vector3};

    use super::*;

    fn face(block_side: BlockSide) -> Face {
        Face {
            block_side,
            block: 1,
            layer: 4,
            u: 2,
            v: 3,
            height: 2,
            width: 5,
            ao: ambient_occlusion::pack([3, 3, 3, 3]),
        }
    }

    #[test]
    fn test_winding_faces_outward_for_every_side() {
        for side in BlockSide::all() {
            let corners = face(side).corners();
            let [a, b, c] = [corners[0].0, corners[1].0, corners[2].0]
                .map(|p| p.to_vec().cast::<f32>().unwrap());
            let normal = (b - a).cross(c - a);
            let expected: Vector3<f32> = side.normal().cast().unwrap();
            assert!(normal.dot(expected) > 0.0, "{side:?} winds inward");
        }
    }

    #[test]
    fn test_positive_faces_sit_on_the_far_plane() {
        let top = face(BlockSide::TOP).corners();
        assert!(top.iter().all(|(p, _)| p.y == 5));
        let bottom = face(BlockSide::BOTTOM).corners();
        assert!(bottom.iter().all(|(p, _)| p.y == 4));
    }
}
