//! Background tasks for the rendering system.
//!
//! # Available Tasks
//! - `ChunkMeshGenerationTask`: meshes one section and uploads the result

pub mod chunk_mesh_generation_task;

pub use chunk_mesh_generation_task::ChunkMeshGenerationTask;
