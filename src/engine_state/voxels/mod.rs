//! # Voxel Engine Core
//!
//! This module contains the core voxel engine functionality, providing the foundation
//! for representing, manipulating, and rendering a voxel-based world.
//!
//! ## Architecture
//!
//! The voxel system is organized into several key components:
//!
//! * **Block**: Block identifiers and the registry that maps them to textures
//! * **Chunk**: Sections, the columns that stack them and per-section mesh state
//! * **World**: Concurrent map of loaded columns and world-space block access
//! * **ChunkManager**: Loads, unloads and re-marks columns around the observer
//! * **Generation**: Terrain generators run on worker threads
//! * **Persistence**: Player edits kept across unloads and restarts
//! * **Tasks**: Background generation work
//!
//! ## Data Flow
//!
//! 1. The observer moves and the chunk manager loads the missing columns
//! 2. Generation tasks fill them on the worker pool
//! 3. Completed columns receive stored edits and mark their sections for meshing
//! 4. Block edits mark every section whose halo contains the edited voxel
//!
//! ## Thread Safety
//!
//! Columns are shared as `Arc<ChunkColumn>`. Block data sits behind per-section
//! locks and each section's mesh state is a single atomic word, so workers never
//! need the world-wide map locked while they read blocks.

pub mod block;
pub mod chunk;
pub mod chunk_manager;
pub mod generation;
pub mod persistence;
pub mod tasks;
pub mod world;
