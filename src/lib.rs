#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Stream
//!
//! The streaming core of a voxel engine: block storage, the chunk lifecycle
//! around a moving observer, greedy meshing with ambient occlusion, GPU buffer
//! sub-allocation and frustum culling into indirect draw lists.
//!
//! ## Key Modules
//!
//! * `core` - Concurrency primitives shared by the subsystems
//! * `config` - JSON engine configuration
//! * `error` - Error types of the fallible edges
//! * `engine_state` - The engine components: voxels, meshing, culling and tasks
//!
//! ## Architecture
//!
//! The engine follows a modular architecture with clear separation between:
//! * Voxel data and the column lifecycle
//! * Background generation and meshing on a worker pool
//! * Geometry residency behind the `GeometrySink` trait (wgpu or in-memory)
//! * Per-frame visibility into indirect draw commands
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     voxel_stream::run();
//! }
//! ```

use std::{path::PathBuf, sync::Arc};

use cgmath::Point3;
use log::{error, info, warn};
use web_time::{Duration, Instant};

use config::{EngineConfig, DEFAULT_CONFIG_PATH};
use engine_state::{
    buffer_state::{BufferState, CpuGeometrySink, GeometrySink},
    camera_state::CameraState,
    voxels::{
        block::{block_type::BlockType, BlockRegistry},
        chunk::{column::COLUMN_HEIGHT_BLOCKS, CHUNK_DIMENSION},
        generation::NoiseTerrainGenerator,
    },
    EngineState,
};

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

/// Simulated time between two demo frames.
const FRAME_TIME: Duration = Duration::from_millis(16);
/// The demo edits a block every this many frames.
const EDIT_INTERVAL: u32 = 30;
/// The demo logs engine stats every this many frames.
const STATS_INTERVAL: u32 = 60;

/// Runs the headless streaming demo.
///
/// The configuration is read from the first command line argument, or from
/// [`DEFAULT_CONFIG_PATH`]. A headless wgpu device receives the geometry when
/// one is available; otherwise geometry is kept in memory.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = EngineConfig::load_or_default(&config_path);

    let generator = Arc::new(NoiseTerrainGenerator::new(config.world_seed));
    let start_height = generator.surface_height(8, 8) as f32 + 24.0;
    let registry = Arc::new(BlockRegistry::default());

    match pollster::block_on(BufferState::request_headless(&config)) {
        Ok(buffer_state) => {
            let engine = EngineState::new(config, registry, generator, buffer_state);
            run_demo(engine, start_height);
        }
        Err(device_error) => {
            warn!("{device_error}; keeping geometry in memory");
            let sink = CpuGeometrySink::from_config(&config);
            let engine = EngineState::new(config, registry, generator, sink);
            run_demo(engine, start_height);
        }
    }
}

fn run_demo<S: GeometrySink>(mut engine: EngineState<S>, start_height: f32) {
    let frames = engine.config().demo_frames;
    let view_distance = (engine.config().render_distance + 1) as f32 * CHUNK_DIMENSION as f32;
    let mut rng = fastrand::Rng::with_seed(engine.config().world_seed as u64);
    let mut camera_state = CameraState::new(
        Point3::new(8.0, start_height, 8.0),
        1280,
        720,
        view_distance * 1.5,
    );

    let start = Instant::now();
    for frame in 0..frames {
        camera_state.update(FRAME_TIME);
        engine.update(camera_state.position());

        if frame % EDIT_INTERVAL == 0 {
            let observer = camera_state.position();
            let position = Point3::new(
                observer.x as i32 + rng.i32(-CHUNK_DIMENSION..CHUNK_DIMENSION),
                rng.i32(0..COLUMN_HEIGHT_BLOCKS),
                observer.z as i32 + rng.i32(-CHUNK_DIMENSION..CHUNK_DIMENSION),
            );
            let block = if rng.bool() {
                BlockType::WOOD.id()
            } else {
                BlockType::AIR.id()
            };
            engine.set_block(position, block);
        }

        engine.cull(&camera_state.view_projection());

        if frame % STATS_INTERVAL == 0 {
            info!("Frame {}: {}", frame, engine.stats());
        }
        std::thread::sleep(FRAME_TIME);
    }

    info!("Simulated {} frames in {:?}", frames, start.elapsed());
    if let Err(save_error) = engine.shutdown() {
        error!("Failed to save modifications: {save_error}");
    }
}
