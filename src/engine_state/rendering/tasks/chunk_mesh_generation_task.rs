//! Task for generating mesh data for sections in a background thread.
//!
//! A job carries the dirty-cycle version the section had when it was queued.
//! The worker claims the section with a compare-and-swap on that version before
//! meshing, and the main thread checks it again before uploading, so a section
//! edited while its mesh was being built never shows the outdated geometry.

use std::sync::Arc;

use log::{debug, error};

use crate::{
    core::CancellationToken,
    engine_state::{
        rendering::meshing::mesh::{generate_section_mesh, ChunkMesh},
        task_management::task::{Task, TaskContext, TaskResult},
        voxels::{
            block::BlockRegistry,
            chunk::{column::ChunkColumn, section_state::SectionState},
            world::{SectionKey, World},
        },
    },
};

/// Meshes one section on a worker thread.
pub struct ChunkMeshGenerationTask {
    world: Arc<World>,
    registry: Arc<BlockRegistry>,
    column: Arc<ChunkColumn>,
    y: usize,
    version: u32,
}

impl ChunkMeshGenerationTask {
    pub fn new(
        world: Arc<World>,
        registry: Arc<BlockRegistry>,
        column: Arc<ChunkColumn>,
        y: usize,
        version: u32,
    ) -> Self {
        ChunkMeshGenerationTask {
            world,
            registry,
            column,
            y,
            version,
        }
    }
}

impl Task for ChunkMeshGenerationTask {
    fn process(self: Box<Self>, cancel: &CancellationToken) -> Option<Box<dyn TaskResult>> {
        if cancel.is_cancelled() || !self.world.is_current(&self.column) {
            return None;
        }
        // A neighbour unloaded since queueing; its reload will mark this section again.
        if !self
            .world
            .horizontal_neighbors_generated(self.column.position())
        {
            return None;
        }

        let state = self.column.section_state(self.y)?;
        if !state.begin_meshing(self.version) {
            return None;
        }

        let mesh = generate_section_mesh(
            &self.world,
            &self.column,
            self.y,
            &self.registry,
            cancel,
        )?;

        Some(Box::new(ChunkMeshGenerationTaskResult {
            column: self.column,
            y: self.y,
            version: self.version,
            mesh,
        }))
    }
}

/// A finished section mesh waiting to be uploaded.
pub struct ChunkMeshGenerationTaskResult {
    column: Arc<ChunkColumn>,
    y: usize,
    version: u32,
    mesh: ChunkMesh,
}

impl TaskResult for ChunkMeshGenerationTaskResult {
    fn handle_result(self: Box<Self>, ctx: &mut TaskContext<'_>) {
        let world = ctx.chunk_manager.world();
        let Some(state) = self.column.section_state(self.y) else {
            return;
        };
        if !world.is_current(&self.column) || !state.is_meshing(self.version) {
            debug!(
                "Dropping stale mesh for {:?}/{} (version {})",
                self.column.position(),
                self.y,
                self.version
            );
            return;
        }

        let key = SectionKey::new(self.column.position(), self.y);
        if self.mesh.is_empty() {
            ctx.mesh_manager.release(key);
            state.finish(self.version, SectionState::Empty);
            return;
        }

        match ctx.mesh_manager.upload(key, &self.mesh, ctx.sink) {
            Ok(()) => {
                state.finish(self.version, SectionState::Rendered);
            }
            Err(upload_error) => {
                error!("Failed to upload mesh for {:?}: {}", key, upload_error);
                ctx.mesh_manager.release(key);
                state.finish(self.version, SectionState::Empty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point2;

    use super::*;
    use crate::engine_state::{
        buffer_state::CpuGeometrySink,
        rendering::MeshManager,
        voxels::{
            block::block_type::BlockType, chunk_manager::ChunkManager,
            persistence::ModificationStore,
        },
    };

    struct Fixture {
        world: Arc<World>,
        chunk_manager: ChunkManager,
        mesh_manager: MeshManager,
        sink: CpuGeometrySink,
    }

    impl Fixture {
        fn new() -> Self {
            let world = Arc::new(World::new());
            for x in -1..=1 {
                for z in -1..=1 {
                    world
                        .insert_column(Point2::new(x, z))
                        .unwrap()
                        .set_generated();
                }
            }
            let sink = CpuGeometrySink::new(1024, 1536);
            Fixture {
                chunk_manager: ChunkManager::new(world.clone(), ModificationStore::new(), 1),
                mesh_manager: MeshManager::new(&sink),
                world,
                sink,
            }
        }

        fn center(&self) -> Arc<ChunkColumn> {
            self.world.get_column(Point2::new(0, 0)).unwrap()
        }

        fn task(&self, y: usize, version: u32) -> Box<ChunkMeshGenerationTask> {
            Box::new(ChunkMeshGenerationTask::new(
                self.world.clone(),
                Arc::new(BlockRegistry::default()),
                self.center(),
                y,
                version,
            ))
        }

        fn apply(&mut self, result: Box<dyn TaskResult>) {
            let mut ctx = TaskContext {
                chunk_manager: &mut self.chunk_manager,
                mesh_manager: &mut self.mesh_manager,
                sink: &mut self.sink,
            };
            result.handle_result(&mut ctx);
        }
    }

    #[test]
    fn test_mesh_is_uploaded_and_section_rendered() {
        let mut fixture = Fixture::new();
        let column = fixture.center();
        column.set_block(4, 4, 4, BlockType::STONE.id());
        let version = column.section_state(0).unwrap().mark_awaiting();

        let result = fixture.task(0, version).process(&CancellationToken::new()).unwrap();
        assert_eq!(column.section_state(0).unwrap().state(), SectionState::Meshing);
        fixture.apply(result);

        assert_eq!(column.section_state(0).unwrap().state(), SectionState::Rendered);
        let geometry = fixture
            .mesh_manager
            .geometry(SectionKey::new(Point2::new(0, 0), 0))
            .unwrap();
        assert_eq!(geometry.index_count, 36);
    }

    #[test]
    fn test_result_is_dropped_after_remark() {
        let mut fixture = Fixture::new();
        let column = fixture.center();
        column.set_block(4, 4, 4, BlockType::STONE.id());
        let state = column.section_state(0).unwrap();
        let version = state.mark_awaiting();

        let result = fixture.task(0, version).process(&CancellationToken::new()).unwrap();
        let newer = state.mark_awaiting();
        assert_ne!(newer, version);
        fixture.apply(result);

        assert_eq!(state.load(), (SectionState::AwaitingMesh, newer));
        assert_eq!(fixture.mesh_manager.geometry_count(), 0);
    }

    #[test]
    fn test_outdated_job_is_not_claimed() {
        let fixture = Fixture::new();
        let state_version = fixture.center().section_state(2).unwrap().mark_awaiting();

        let outcome = fixture
            .task(2, state_version.wrapping_sub(1))
            .process(&CancellationToken::new());
        assert!(outcome.is_none());
        assert_eq!(
            fixture.center().section_state(2).unwrap().state(),
            SectionState::AwaitingMesh
        );
    }

    #[test]
    fn test_empty_section_finishes_empty() {
        let mut fixture = Fixture::new();
        let column = fixture.center();
        let version = column.section_state(5).unwrap().mark_awaiting();

        let result = fixture.task(5, version).process(&CancellationToken::new()).unwrap();
        fixture.apply(result);

        assert_eq!(column.section_state(5).unwrap().state(), SectionState::Empty);
        assert_eq!(fixture.mesh_manager.geometry_count(), 0);
    }

    #[test]
    fn test_missing_neighbour_skips_meshing() {
        let fixture = Fixture::new();
        fixture.world.remove_column(Point2::new(1, 0));
        let version = fixture.center().section_state(0).unwrap().mark_awaiting();

        assert!(fixture
            .task(0, version)
            .process(&CancellationToken::new())
            .is_none());
        assert_eq!(
            fixture.center().section_state(0).unwrap().state(),
            SectionState::AwaitingMesh
        );
    }
}
