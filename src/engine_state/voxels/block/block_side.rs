//! # Block Side Module
//!
//! This module defines the six faces of a voxel block and how they map onto the
//! axis/direction pairs the greedy mesher sweeps over.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel block.
///
/// The discriminants index per-face tables such as the texture indices held by a
/// [`BlockRegistry`](super::BlockRegistry).
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The front face (facing positive Z)
    FRONT = 0,

    /// The back face (facing negative Z)
    BACK = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The left face (facing negative X)
    LEFT = 4,

    /// The right face (facing positive X)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in discriminant order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// The face pointing along `axis` (0 = X, 1 = Y, 2 = Z) in the given direction.
    pub fn from_axis(axis: usize, positive: bool) -> Self {
        match (axis, positive) {
            (0, true) => BlockSide::RIGHT,
            (0, false) => BlockSide::LEFT,
            (1, true) => BlockSide::TOP,
            (1, false) => BlockSide::BOTTOM,
            (_, true) => BlockSide::FRONT,
            (_, false) => BlockSide::BACK,
        }
    }

    /// The axis this face is perpendicular to.
    pub fn axis(self) -> usize {
        match self {
            BlockSide::LEFT | BlockSide::RIGHT => 0,
            BlockSide::BOTTOM | BlockSide::TOP => 1,
            BlockSide::FRONT | BlockSide::BACK => 2,
        }
    }

    /// Whether the outward normal points along the positive axis.
    pub fn is_positive(self) -> bool {
        matches!(self, BlockSide::RIGHT | BlockSide::TOP | BlockSide::FRONT)
    }

    /// Unit outward normal of the face.
    pub fn normal(self) -> Vector3<i32> {
        let mut normal = [0; 3];
        normal[self.axis()] = if self.is_positive() { 1 } else { -1 };
        Vector3::from(normal)
    }
}
