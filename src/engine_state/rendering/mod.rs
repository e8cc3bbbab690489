//! Rendering side of the voxel engine.
//!
//! This module turns section voxels into resident GPU geometry and decides each
//! frame which of it to draw. It does not own a surface or a pipeline: the
//! geometry is handed to a [`GeometrySink`](super::buffer_state::GeometrySink)
//! and the draw list is published through the same sink.

pub mod culling;
pub mod meshing;
pub mod tasks;
mod vertex;

// Re-export commonly used types
pub use culling::{DrawList, FrustumCuller};
pub use meshing::{MeshGeometry, MeshManager};
pub use vertex::Vertex;
