//! # Voxel Task System
//!
//! Tasks related to voxel world generation. They run on the shared worker pool
//! alongside meshing so that streaming in new terrain never stalls a frame.

pub mod chunk_generation_task;

pub use chunk_generation_task::ChunkGenerationTask;
