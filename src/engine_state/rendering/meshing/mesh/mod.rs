//! Mesh generation for voxel sections.
//!
//! This module converts a section's voxels into GPU-friendly geometry. A binary
//! greedy mesher merges coplanar faces that share a block and the same corner
//! occlusion into larger quads, reducing vertex and index counts by an order of
//! magnitude on typical terrain.
//!
//! # Architecture
//! - [`ChunkMesh`]: vertices and section-local indices for one section
//! - [`Face`]: a merged rectangle on one block side, before vertex emission
//! - [`ambient_occlusion`]: per-corner occlusion levels and weights
//!
//! # Usage
//! ```
//! use voxel_stream::core::CancellationToken;
//! use voxel_stream::engine_state::rendering::meshing::mesh::greedy_mesh;
//! use voxel_stream::engine_state::voxels::{
//!     block::{block_type::BlockType, BlockRegistry},
//!     chunk::halo::Halo,
//! };
//!
//! let mut halo = Halo::new();
//! halo.set(0, 0, 0, BlockType::STONE.id());
//!
//! let mesh = greedy_mesh(&halo, &BlockRegistry::default(), &CancellationToken::new()).unwrap();
//! assert_eq!(mesh.quad_count(), 6);
//! ```

pub mod ambient_occlusion;
mod face;
mod greedy;
#[allow(clippy::module_inception)]
mod mesh;

pub use face::Face;
pub use greedy::{generate_section_mesh, greedy_mesh};
pub use mesh::ChunkMesh;
