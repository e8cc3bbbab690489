//! # Block Module
//!
//! Block identifiers, the built-in block palette and the registry that maps an
//! identifier to per-face texture indices.
//!
//! The registry is constructed once at startup and shared by reference (behind an
//! `Arc`) with every meshing worker; there is no global block table.

use block_side::BlockSide;
use block_type::BlockType;

pub mod block_side;
pub mod block_type;

/// The compact integer stored per voxel. `0` is always air.
pub type BlockId = u16;

/// The empty block identifier.
pub const AIR: BlockId = BlockType::AIR.id();

/// Returns `true` for every identifier except air.
#[inline]
pub fn is_solid(id: BlockId) -> bool {
    id != AIR
}

/// Static description of a registered block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
    /// Name used in logs.
    pub name: String,
    /// Texture atlas index per face, indexed by [`BlockSide`] discriminant.
    pub texture_indices: [u32; 6],
}

/// Maps block identifiers to their descriptors.
///
/// # Examples
///
/// ```
/// use voxel_stream::engine_state::voxels::block::{BlockRegistry, block_side::BlockSide};
///
/// let mut registry = BlockRegistry::default();
/// let glass = registry.register("glass", [7; 6]);
/// assert_eq!(registry.texture_index(glass, BlockSide::TOP), 7);
/// ```
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    blocks: Vec<BlockDescriptor>,
}

impl BlockRegistry {
    /// Creates a registry containing only air.
    pub fn new() -> Self {
        Self {
            blocks: vec![BlockDescriptor {
                name: BlockType::AIR.name().to_string(),
                texture_indices: BlockType::AIR.texture_indices(),
            }],
        }
    }

    /// Registers a block and returns its identifier.
    pub fn register(&mut self, name: &str, texture_indices: [u32; 6]) -> BlockId {
        let id = self.blocks.len() as BlockId;
        self.blocks.push(BlockDescriptor {
            name: name.to_string(),
            texture_indices,
        });
        id
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockDescriptor> {
        self.blocks.get(id as usize)
    }

    /// Texture index for one face of a block. Unknown identifiers map to texture 0.
    pub fn texture_index(&self, id: BlockId, side: BlockSide) -> u32 {
        self.get(id)
            .map(|descriptor| descriptor.texture_indices[side as usize])
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Default for BlockRegistry {
    /// A registry pre-populated with every [`BlockType`], so that `BlockType::id`
    /// and registry identifiers agree.
    fn default() -> Self {
        let mut registry = Self::new();
        for block_type in BlockType::ALL.into_iter().skip(1) {
            registry.register(block_type.name(), block_type.texture_indices());
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_matches_block_types() {
        let registry = BlockRegistry::default();
        assert_eq!(registry.len(), BlockType::ALL.len());
        for block_type in BlockType::ALL {
            assert_eq!(
                registry.get(block_type.id()).map(|d| d.name.as_str()),
                Some(block_type.name())
            );
        }
        assert_eq!(
            registry.texture_index(BlockType::GRASS.id(), BlockSide::TOP),
            3
        );
        assert_eq!(registry.texture_index(999, BlockSide::TOP), 0);
    }
}
