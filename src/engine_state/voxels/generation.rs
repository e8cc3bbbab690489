//! # Terrain Generation
//!
//! Terrain generators fill a freshly loaded [`ChunkColumn`] in place, given only
//! its grid position. Generators must be deterministic per position so that a
//! column unloaded and loaded again regenerates the same blocks, which is what
//! lets the modification store persist only the player's diff.
//!
//! Generators are shared with every worker behind an `Arc<dyn TerrainGenerator>`.

use noise::{NoiseFn, Perlin};

use super::{
    block::{block_type::BlockType, BlockId, AIR},
    chunk::{
        column::{ChunkColumn, COLUMN_HEIGHT},
        ChunkSection, CHUNK_DIMENSION, CHUNK_SIZE,
    },
};

pub trait TerrainGenerator: Send + Sync {
    /// Overwrites every section of `column`.
    fn generate(&self, column: &ChunkColumn);
}

/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;
/// Threshold above which 3D noise carves a cave.
pub const CAVE_THRESHOLD: f64 = 0.55;
/// Scaling factor for the cave noise.
pub const CAVE_SCALE_FACTOR: f64 = 0.06;

/// Rolling Perlin heightmap with dirt and grass on stone, noise caves and
/// scattered trees.
pub struct NoiseTerrainGenerator {
    seed: u32,
    height_noise: Perlin,
    detail_noise: Perlin,
    cave_noise: Perlin,
    base_height: f64,
    amplitude: f64,
}

impl NoiseTerrainGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            height_noise: Perlin::new(seed),
            detail_noise: Perlin::new(seed.wrapping_add(1)),
            cave_noise: Perlin::new(seed.wrapping_add(2)),
            base_height: 64.0,
            amplitude: 24.0,
        }
    }

    /// Terrain surface height at a world-space column of blocks.
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let coarse = self.height_noise.get([
            x as f64 * PERLIN_SCALE_FACTOR,
            z as f64 * PERLIN_SCALE_FACTOR,
        ]);
        let detail = self.detail_noise.get([
            x as f64 * PERLIN_SCALE_FACTOR * 4.0,
            z as f64 * PERLIN_SCALE_FACTOR * 4.0,
        ]);
        (self.base_height + self.amplitude * coarse + self.amplitude * 0.2 * detail) as i32
    }

    fn is_cave(&self, x: i32, y: i32, z: i32) -> bool {
        y > 2
            && self.cave_noise.get([
                x as f64 * CAVE_SCALE_FACTOR,
                y as f64 * CAVE_SCALE_FACTOR,
                z as f64 * CAVE_SCALE_FACTOR,
            ]) > CAVE_THRESHOLD
    }

    fn column_rng(&self, column: &ChunkColumn) -> fastrand::Rng {
        let position = column.position();
        let key = ((position.x as u32 as u64) << 32) | position.y as u32 as u64;
        fastrand::Rng::with_seed(key ^ ((self.seed as u64) << 17) ^ 0x9E37_79B9_7F4A_7C15)
    }
}

impl TerrainGenerator for NoiseTerrainGenerator {
    fn generate(&self, column: &ChunkColumn) {
        let (origin_x, origin_z) = column.block_origin();
        let dimension = CHUNK_DIMENSION as usize;

        let mut heights = [0i32; (CHUNK_DIMENSION * CHUNK_DIMENSION) as usize];
        for z in 0..CHUNK_DIMENSION {
            for x in 0..CHUNK_DIMENSION {
                heights[(x + z * CHUNK_DIMENSION) as usize] =
                    self.surface_height(origin_x + x, origin_z + z);
            }
        }

        let mut sections: Vec<Vec<BlockId>> =
            vec![vec![AIR; CHUNK_SIZE as usize]; COLUMN_HEIGHT];
        for (section_y, blocks) in sections.iter_mut().enumerate() {
            for local_y in 0..CHUNK_DIMENSION {
                let y = section_y as i32 * CHUNK_DIMENSION + local_y;
                for z in 0..CHUNK_DIMENSION {
                    for x in 0..CHUNK_DIMENSION {
                        let height = heights[(x + z * CHUNK_DIMENSION) as usize];
                        let block = if y > height {
                            AIR
                        } else if self.is_cave(origin_x + x, y, origin_z + z) {
                            AIR
                        } else if y == height {
                            BlockType::GRASS.id()
                        } else if y + 4 > height {
                            BlockType::DIRT.id()
                        } else {
                            BlockType::STONE.id()
                        };
                        let index = x as usize
                            + z as usize * dimension
                            + local_y as usize * dimension * dimension;
                        blocks[index] = block;
                    }
                }
            }
        }

        // Trees are kept two blocks inside the column so they never straddle a
        // neighbour, which would make generation depend on load order.
        let mut rng = self.column_rng(column);
        for _ in 0..rng.usize(0..3) {
            let x = rng.i32(2..CHUNK_DIMENSION - 2);
            let z = rng.i32(2..CHUNK_DIMENSION - 2);
            let height = heights[(x + z * CHUNK_DIMENSION) as usize];
            let trunk = rng.i32(3..6);
            for y in height + 1..=height + trunk {
                let section_y = (y / CHUNK_DIMENSION) as usize;
                if y < 0 || section_y >= COLUMN_HEIGHT {
                    break;
                }
                let local_y = (y % CHUNK_DIMENSION) as usize;
                let index = x as usize + z as usize * dimension + local_y * dimension * dimension;
                sections[section_y][index] = BlockType::WOOD.id();
            }
        }

        for (section_y, blocks) in sections.into_iter().enumerate() {
            if let (Some(section), Some(mut slot)) = (
                ChunkSection::from_blocks(blocks.into_boxed_slice()),
                column.section_mut(section_y),
            ) {
                *slot = section;
            }
        }
    }
}

/// Solid ground up to a fixed height. Handy for tests and benchmarks.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrainGenerator {
    /// Number of solid block layers, starting at y = 0.
    pub height: i32,
    pub block: BlockId,
}

impl FlatTerrainGenerator {
    pub fn new(height: i32, block: BlockId) -> Self {
        Self { height, block }
    }
}

impl TerrainGenerator for FlatTerrainGenerator {
    fn generate(&self, column: &ChunkColumn) {
        for section_y in 0..COLUMN_HEIGHT {
            let Some(mut section) = column.section_mut(section_y) else {
                continue;
            };
            let bottom = section_y as i32 * CHUNK_DIMENSION;
            let filled = (self.height - bottom).clamp(0, CHUNK_DIMENSION);

            if filled == CHUNK_DIMENSION {
                section.fill(self.block);
            } else {
                section.fill(AIR);
                for y in 0..filled {
                    for z in 0..CHUNK_DIMENSION {
                        for x in 0..CHUNK_DIMENSION {
                            section.set(x, y, z, self.block);
                        }
                    }
                }
            }
        }
    }
}
