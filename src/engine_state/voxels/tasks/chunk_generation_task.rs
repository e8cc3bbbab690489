//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask` which fills a freshly loaded
//! column with terrain on a worker thread. The column is already in the world
//! but not yet marked generated, so nothing reads or meshes it until the result
//! is applied on the main thread.

use std::sync::Arc;

use log::trace;
use web_time::Instant;

use crate::{
    core::CancellationToken,
    engine_state::{
        task_management::task::{Task, TaskContext, TaskResult},
        voxels::{chunk::column::ChunkColumn, generation::TerrainGenerator},
    },
};

/// Runs the terrain generator over one column.
pub struct ChunkGenerationTask {
    generator: Arc<dyn TerrainGenerator>,
    column: Arc<ChunkColumn>,
}

impl ChunkGenerationTask {
    pub fn new(generator: Arc<dyn TerrainGenerator>, column: Arc<ChunkColumn>) -> Self {
        ChunkGenerationTask { generator, column }
    }
}

impl Task for ChunkGenerationTask {
    fn process(self: Box<Self>, cancel: &CancellationToken) -> Option<Box<dyn TaskResult>> {
        if cancel.is_cancelled() {
            return None;
        }

        let start = Instant::now();
        self.generator.generate(&self.column);
        self.column.optimize_sections();
        trace!(
            "Generated column {:?} in {:?}",
            self.column.position(),
            start.elapsed()
        );

        Some(Box::new(ChunkGenerationTaskResult {
            column: self.column,
        }))
    }
}

/// A generated column waiting to be published to the world.
pub struct ChunkGenerationTaskResult {
    column: Arc<ChunkColumn>,
}

impl TaskResult for ChunkGenerationTaskResult {
    fn handle_result(self: Box<Self>, ctx: &mut TaskContext<'_>) {
        ctx.chunk_manager.complete_generation(&self.column);
    }
}
