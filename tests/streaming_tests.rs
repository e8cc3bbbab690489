use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use cgmath::{ortho, Matrix4, Point2, Point3, SquareMatrix};
use voxel_stream::{
    config::EngineConfig,
    engine_state::{
        buffer_state::CpuGeometrySink,
        camera_state::camera::OPENGL_TO_WGPU_MATRIX,
        voxels::{
            block::{block_type::BlockType, BlockRegistry},
            chunk::section_state::SectionState,
            generation::FlatTerrainGenerator,
            world::SectionKey,
        },
        EngineState,
    },
};

const GROUND_HEIGHT: i32 = 20;

fn engine(modifications_path: &Path) -> EngineState<CpuGeometrySink> {
    let config = EngineConfig {
        render_distance: 2,
        worker_count: 2,
        initial_vertex_capacity: 16,
        initial_index_capacity: 24,
        modifications_path: modifications_path.to_path_buf(),
        ..EngineConfig::default()
    };
    let sink = CpuGeometrySink::from_config(&config);
    EngineState::new(
        config,
        Arc::new(BlockRegistry::default()),
        Arc::new(FlatTerrainGenerator::new(GROUND_HEIGHT, BlockType::STONE.id())),
        sink,
    )
}

/// Updates until every queued generation and meshing job has been applied.
fn settle(engine: &mut EngineState<CpuGeometrySink>, observer: Point3<f32>) {
    let deadline = Instant::now() + Duration::from_secs(30);
    engine.update(observer);
    while !engine.is_idle() {
        assert!(Instant::now() < deadline, "engine did not settle");
        std::thread::sleep(Duration::from_millis(1));
        engine.update(observer);
    }
}

fn covering_view_projection() -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * ortho(-1000.0, 1000.0, -1000.0, 1000.0, -1000.0, 1000.0)
}

fn key(x: i32, z: i32, y: usize) -> SectionKey {
    SectionKey::new(Point2::new(x, z), y)
}

fn origin() -> Point3<f32> {
    Point3::new(8.0, 40.0, 8.0)
}

#[test]
fn test_columns_stream_in_and_inner_columns_are_meshed() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine(&dir.path().join("modifications.json"));
    settle(&mut engine, origin());

    let stats = engine.stats();
    assert_eq!(stats.loaded_columns, 13);
    assert_eq!(stats.generated_columns, 13);
    // Only the center and its four neighbours have all neighbours generated.
    // Each meshes a floor quad in section 0 and a ground quad in section 1.
    assert_eq!(stats.resident_sections, 10);

    for (x, z) in [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)] {
        assert_eq!(engine.section_state(key(x, z, 0)), Some(SectionState::Rendered));
        assert_eq!(engine.section_state(key(x, z, 1)), Some(SectionState::Rendered));
        assert_eq!(engine.section_state(key(x, z, 5)), Some(SectionState::Empty));
        let ground = engine.mesh_manager().geometry(key(x, z, 1)).unwrap();
        assert_eq!(ground.index_count, 6);
    }
    assert_eq!(
        engine.section_state(key(2, 0, 0)),
        Some(SectionState::AwaitingMesh)
    );
    assert!(engine.sink().times_grown > 0);
}

#[test]
fn test_covering_frustum_draws_every_resident_section() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine(&dir.path().join("modifications.json"));
    settle(&mut engine, origin());

    let draw_count = engine.cull(&covering_view_projection()).len();
    assert_eq!(draw_count, engine.stats().resident_sections);
    assert_eq!(engine.sink().draw_list.len(), draw_count);

    let total_indices: u32 = engine
        .draw_list()
        .commands
        .iter()
        .map(|command| command.index_count)
        .sum();
    assert_eq!(total_indices, engine.stats().indices_used);
}

#[test]
fn test_degenerate_view_projection_draws_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine(&dir.path().join("modifications.json"));
    settle(&mut engine, origin());

    assert!(engine.cull(&Matrix4::from_value(0.0)).is_empty());
    assert!(engine.sink().draw_list.is_empty());
    assert!(!engine.cull(&Matrix4::identity()).is_empty());
}

#[test]
fn test_edits_remesh_and_reverting_restores_the_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine(&dir.path().join("modifications.json"));
    settle(&mut engine, origin());

    let pillar = Point3::new(8, GROUND_HEIGHT, 8);
    assert!(engine.set_block(pillar, BlockType::WOOD.id()));
    assert!(!engine.set_block(pillar, BlockType::WOOD.id()));
    settle(&mut engine, origin());

    assert_eq!(engine.get_block(pillar), BlockType::WOOD.id());
    assert_eq!(engine.section_state(key(0, 0, 1)), Some(SectionState::Rendered));
    let edited = engine.mesh_manager().geometry(key(0, 0, 1)).unwrap();
    assert!(edited.index_count > 6);
    assert_eq!(engine.stats().modifications, 1);

    assert!(engine.set_block(pillar, BlockType::AIR.id()));
    settle(&mut engine, origin());

    let restored = engine.mesh_manager().geometry(key(0, 0, 1)).unwrap();
    assert_eq!(restored.index_count, 6);
    assert_eq!(engine.stats().modifications, 0);
}

#[test]
fn test_moving_away_unloads_and_releases_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine(&dir.path().join("modifications.json"));
    settle(&mut engine, origin());
    let used_before = engine.stats().indices_used;

    let far_away = Point3::new(16.0 * 40.0 + 8.0, 40.0, 8.0);
    settle(&mut engine, far_away);

    assert!(!engine.world().contains_column(Point2::new(0, 0)));
    assert!(engine.mesh_manager().geometry(key(0, 0, 0)).is_none());
    assert_eq!(engine.section_state(key(0, 0, 0)), None);

    let stats = engine.stats();
    assert_eq!(stats.loaded_columns, 13);
    assert_eq!(stats.resident_sections, 10);
    assert_eq!(stats.indices_used, used_before);
    assert!(engine.mesh_manager().geometry(key(40, 0, 1)).is_some());
}

#[test]
fn test_modifications_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modifications.json");
    let hole = Point3::new(3, GROUND_HEIGHT - 1, 3);

    let mut first = engine(&path);
    settle(&mut first, origin());
    assert!(first.set_block(hole, BlockType::AIR.id()));
    settle(&mut first, origin());
    first.shutdown().unwrap();
    assert!(path.exists());

    let mut second = engine(&path);
    assert_eq!(second.chunk_manager().modifications().len(), 1);
    settle(&mut second, origin());

    assert_eq!(second.get_block(hole), BlockType::AIR.id());
    let ground = second.mesh_manager().geometry(key(0, 0, 1)).unwrap();
    assert!(ground.index_count > 6);
}

#[test]
fn test_unloaded_modifications_are_reapplied_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine(&dir.path().join("modifications.json"));
    settle(&mut engine, origin());

    let marker = Point3::new(5, GROUND_HEIGHT, 5);
    assert!(engine.set_block(marker, BlockType::GRASS.id()));
    settle(&mut engine, Point3::new(16.0 * 40.0, 40.0, 8.0));
    assert_eq!(engine.get_block(marker), BlockType::AIR.id());

    settle(&mut engine, origin());
    assert_eq!(engine.get_block(marker), BlockType::GRASS.id());
    assert_eq!(engine.stats().modifications, 1);
}
