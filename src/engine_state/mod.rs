//! # Engine State Module
//!
//! The core engine module that owns every streaming subsystem and drives them
//! once per update.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container for the engine
//! * `buffer_state` - Geometry sinks: wgpu buffers or an in-memory mirror
//! * `camera_state` - Observer position and view-projection
//! * `rendering` - Meshing, geometry residency and frustum culling
//! * `task_management` - The worker pool for generation and meshing
//! * `voxels` - Voxel data, columns, the chunk lifecycle and persistence
//!
//! ## Architecture
//!
//! The `EngineState` struct is the central coordinator. Workers only ever see
//! `Arc` handles to columns plus the immutable registry and generator; every
//! mutation of the chunk manager, the mesh manager and the geometry sink happens
//! on the thread that calls [`EngineState::update`] and [`EngineState::cull`].
//!
//! ## Update Order
//!
//! 1. Load and unload columns around the observer
//! 2. Apply finished generation and meshing results
//! 3. Release geometry of unloaded columns
//! 4. Publish generation tasks and mesh tasks for the new requests

use std::{fmt, sync::Arc};

use cgmath::{Matrix4, Point3};
use log::{debug, info};

use crate::{config::EngineConfig, error::PersistenceError};

use buffer_state::GeometrySink;
use rendering::{tasks::ChunkMeshGenerationTask, DrawList, FrustumCuller, MeshManager};
use task_management::{task::TaskContext, TaskManager};
use voxels::{
    block::{BlockId, BlockRegistry},
    chunk::section_state::SectionState,
    chunk_manager::ChunkManager,
    generation::TerrainGenerator,
    persistence::ModificationStore,
    tasks::ChunkGenerationTask,
    world::{SectionKey, World},
};

pub mod buffer_state;
pub mod camera_state;
pub mod rendering;
pub mod task_management;
pub mod voxels;

/// A snapshot of engine counters, logged periodically by the demo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub loaded_columns: usize,
    pub generated_columns: usize,
    pub resident_sections: usize,
    pub deferred_sections: usize,
    pub pending_tasks: usize,
    pub vertices_used: u32,
    pub vertex_capacity: u32,
    pub indices_used: u32,
    pub index_capacity: u32,
    pub modifications: usize,
    pub draw_count: usize,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "columns {}/{} generated, {} sections resident ({} deferred), {} tasks pending, \
             vertices {}/{}, indices {}/{}, {} modifications, {} draws",
            self.generated_columns,
            self.loaded_columns,
            self.resident_sections,
            self.deferred_sections,
            self.pending_tasks,
            self.vertices_used,
            self.vertex_capacity,
            self.indices_used,
            self.index_capacity,
            self.modifications,
            self.draw_count
        )
    }
}

/// The main state container for the streaming engine.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use cgmath::Point3;
/// use voxel_stream::config::EngineConfig;
/// use voxel_stream::engine_state::{
///     buffer_state::CpuGeometrySink,
///     voxels::{
///         block::{block_type::BlockType, BlockRegistry},
///         generation::FlatTerrainGenerator,
///     },
///     EngineState,
/// };
///
/// let config = EngineConfig {
///     render_distance: 1,
///     worker_count: 2,
///     modifications_path: std::env::temp_dir().join("voxel_stream_doc_missing.json"),
///     ..EngineConfig::default()
/// };
/// let sink = CpuGeometrySink::from_config(&config);
/// let mut engine = EngineState::new(
///     config,
///     Arc::new(BlockRegistry::default()),
///     Arc::new(FlatTerrainGenerator::new(4, BlockType::STONE.id())),
///     sink,
/// );
///
/// let observer = Point3::new(8.0, 10.0, 8.0);
/// engine.update(observer);
/// while !engine.is_idle() {
///     std::thread::yield_now();
///     engine.update(observer);
/// }
/// assert_eq!(engine.stats().loaded_columns, 5);
/// ```
pub struct EngineState<S: GeometrySink> {
    config: EngineConfig,
    world: Arc<World>,
    registry: Arc<BlockRegistry>,
    generator: Arc<dyn TerrainGenerator>,
    chunk_manager: ChunkManager,
    mesh_manager: MeshManager,
    task_manager: TaskManager,
    culler: FrustumCuller,
    sink: S,
}

impl<S: GeometrySink> EngineState<S> {
    /// Creates an engine with no columns loaded. Modifications are read from
    /// `config.modifications_path`; a missing or corrupt file starts empty.
    pub fn new(
        config: EngineConfig,
        registry: Arc<BlockRegistry>,
        generator: Arc<dyn TerrainGenerator>,
        sink: S,
    ) -> Self {
        let world = Arc::new(World::new());
        let modifications = ModificationStore::load_or_default(&config.modifications_path);
        let chunk_manager =
            ChunkManager::new(world.clone(), modifications, config.render_distance);
        let mesh_manager = MeshManager::new(&sink);
        let task_manager = TaskManager::new(config.worker_count);
        let culler = FrustumCuller::new(config.max_draw_count as usize);

        info!(
            "Engine started: render distance {}, {} workers, {} stored modifications",
            config.render_distance,
            task_manager.worker_count(),
            chunk_manager.modifications().len()
        );

        Self {
            config,
            world,
            registry,
            generator,
            chunk_manager,
            mesh_manager,
            task_manager,
            culler,
            sink,
        }
    }

    /// Streams columns around `observer` and advances all background work.
    pub fn update(&mut self, observer: Point3<f32>) {
        self.chunk_manager.update_observer(observer);
        self.process_tasks();
    }

    /// Applies finished results and publishes work for every new request.
    pub fn process_tasks(&mut self) {
        let results = self.task_manager.drain_results();
        if !results.is_empty() {
            let mut ctx = TaskContext {
                chunk_manager: &mut self.chunk_manager,
                mesh_manager: &mut self.mesh_manager,
                sink: &mut self.sink,
            };
            for result in results {
                result.handle_result(&mut ctx);
            }
        }

        for position in self.chunk_manager.drain_unloaded() {
            let released = self.mesh_manager.release_column(position);
            if released > 0 {
                debug!("Released {} sections of column {:?}", released, position);
            }
        }

        for column in self.chunk_manager.drain_generation_requests() {
            let task = ChunkGenerationTask::new(self.generator.clone(), column);
            if !self.task_manager.publish_task(Box::new(task)) {
                debug!("Task queue closed, dropping generation request");
            }
        }

        for request in self.chunk_manager.drain_mesh_requests() {
            let task = ChunkMeshGenerationTask::new(
                self.world.clone(),
                self.registry.clone(),
                request.column,
                request.y,
                request.version,
            );
            if !self.task_manager.publish_task(Box::new(task)) {
                debug!("Task queue closed, dropping mesh request");
            }
        }
    }

    /// `true` when no work is queued, running or waiting to be applied.
    ///
    /// Sections deferred on a missing neighbour do not count: at the edge of the
    /// loaded area they wait until the observer moves.
    pub fn is_idle(&self) -> bool {
        self.task_manager.is_idle()
            && self.chunk_manager.pending_generation_count() == 0
            && self.chunk_manager.pending_mesh_count() == 0
    }

    /// Edits one block of a generated column. See [`ChunkManager::set_block`].
    pub fn set_block(&mut self, position: Point3<i32>, id: BlockId) -> bool {
        self.chunk_manager.set_block(position, id)
    }

    pub fn get_block(&self, position: Point3<i32>) -> BlockId {
        self.chunk_manager.get_block(position)
    }

    pub fn section_state(&self, key: SectionKey) -> Option<SectionState> {
        self.chunk_manager.section_state(key)
    }

    /// Builds the draw list for `view_projection` and submits it to the sink.
    pub fn cull(&mut self, view_projection: &Matrix4<f32>) -> &DrawList {
        let draw_list = self.culler.cull(view_projection, &self.mesh_manager);
        self.sink.submit_draw_list(draw_list);
        draw_list
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            loaded_columns: self.world.column_count(),
            generated_columns: self
                .world
                .columns()
                .iter()
                .filter(|column| column.is_generated())
                .count(),
            resident_sections: self.mesh_manager.geometry_count(),
            deferred_sections: self.chunk_manager.deferred_count(),
            pending_tasks: self.task_manager.pending_tasks(),
            vertices_used: self.mesh_manager.vertices_used(),
            vertex_capacity: self.mesh_manager.vertex_capacity(),
            indices_used: self.mesh_manager.indices_used(),
            index_capacity: self.mesh_manager.index_capacity(),
            modifications: self.chunk_manager.modifications().len(),
            draw_count: self.culler.draw_list().len(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn chunk_manager(&self) -> &ChunkManager {
        &self.chunk_manager
    }

    pub fn mesh_manager(&self) -> &MeshManager {
        &self.mesh_manager
    }

    pub fn draw_list(&self) -> &DrawList {
        self.culler.draw_list()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Stops the workers and saves modifications to `config.modifications_path`.
    pub fn shutdown(mut self) -> Result<(), PersistenceError> {
        self.task_manager.shutdown();
        info!("Engine stopped: {}", self.stats());
        self.chunk_manager
            .modifications()
            .save(&self.config.modifications_path)
    }
}
