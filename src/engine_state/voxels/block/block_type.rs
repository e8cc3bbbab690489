//! # Block Type Module
//!
//! The built-in block palette. Each variant's discriminant is its [`BlockId`], so
//! the default [`BlockRegistry`](super::BlockRegistry) registers them in order.

use super::BlockId;

/// Enumerates the block types the stock terrain generator places.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// An air block, which is non-solid and transparent.
    AIR = 0,

    /// A basic dirt block, used as a common building material.
    DIRT = 1,

    /// A grass block with different textures on top and sides.
    /// The top is green, sides have grass on dirt, and bottom is plain dirt.
    GRASS = 2,

    /// A wooden block with a bark texture on all sides.
    WOOD = 3,

    /// A plain white block, often used for testing.
    WHITE = 4,

    /// Bedrock-like filler below the dirt layer.
    STONE = 5,
}

impl BlockType {
    /// Every built-in block type, in id order.
    pub const ALL: [BlockType; 6] = [
        BlockType::AIR,
        BlockType::DIRT,
        BlockType::GRASS,
        BlockType::WOOD,
        BlockType::WHITE,
        BlockType::STONE,
    ];

    /// The compact identifier stored in sections.
    pub const fn id(self) -> BlockId {
        self as BlockId
    }

    /// Texture atlas indices per face, in [`BlockSide`](super::block_side::BlockSide) order:
    /// [Front, Back, Bottom, Top, Left, Right]
    pub fn texture_indices(self) -> [u32; 6] {
        match self {
            BlockType::AIR => [0; 6],
            BlockType::WOOD => [0, 0, 0, 0, 0, 0],
            BlockType::DIRT => [1, 1, 1, 1, 1, 1],
            BlockType::GRASS => [2, 2, 1, 3, 2, 2],
            BlockType::WHITE => [4, 4, 4, 4, 4, 4],
            BlockType::STONE => [5, 5, 5, 5, 5, 5],
        }
    }

    /// Human readable name used when registering the type.
    pub fn name(self) -> &'static str {
        match self {
            BlockType::AIR => "air",
            BlockType::DIRT => "dirt",
            BlockType::GRASS => "grass",
            BlockType::WOOD => "wood",
            BlockType::WHITE => "white",
            BlockType::STONE => "stone",
        }
    }
}
