//! # Engine Configuration
//!
//! Runtime tunables for streaming, meshing and drawing, loaded from a JSON file.
//! Every field has a default, so a partial file (or no file at all) is valid.
//!
//! ```json
//! {
//!     "render_distance": 8,
//!     "world_seed": 1337,
//!     "modifications_path": "saves/modifications.json"
//! }
//! ```

use std::{fs, path::Path, path::PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "voxel_stream.json";

/// Tunables for an [`EngineState`](crate::engine_state::EngineState).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Load radius around the observer, in columns.
    pub render_distance: u32,
    /// Number of background worker threads for generation and meshing.
    pub worker_count: usize,
    /// Seed handed to the terrain generator.
    pub world_seed: u32,
    /// Upper bound on indirect draw commands produced per frame.
    pub max_draw_count: u32,
    /// Initial vertex buffer capacity, in vertices.
    pub initial_vertex_capacity: u32,
    /// Initial index buffer capacity, in indices.
    pub initial_index_capacity: u32,
    /// Where player modifications are loaded from at startup and saved at shutdown.
    pub modifications_path: PathBuf,
    /// Frames simulated by the headless demo in [`run`](crate::run).
    pub demo_frames: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let worker_count = std::thread::available_parallelism()
            .map(|parallelism| parallelism.get().saturating_sub(1).max(1))
            .unwrap_or(2);

        Self {
            render_distance: 6,
            worker_count,
            world_seed: 0,
            max_draw_count: 16_384,
            initial_vertex_capacity: 1 << 18,
            initial_index_capacity: 3 << 17,
            modifications_path: PathBuf::from("modifications.json"),
            demo_frames: 600,
        }
    }
}

impl EngineConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`EngineConfig::load`], but falls back to defaults when the file is
    /// missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded engine config from {}", path.display());
                config
            }
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                info!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(error) => {
                warn!("{error}; using default engine config");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid("worker_count must be at least 1".into()));
        }
        if self.max_draw_count == 0 {
            return Err(ConfigError::Invalid("max_draw_count must be at least 1".into()));
        }
        if self.initial_vertex_capacity == 0 || self.initial_index_capacity == 0 {
            return Err(ConfigError::Invalid(
                "initial buffer capacities must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "render_distance": 3, "world_seed": 42 }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();

        assert_eq!(config.render_distance, 3);
        assert_eq!(config.world_seed, 42);
        assert_eq!(config.max_draw_count, EngineConfig::default().max_draw_count);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "worker_count": 0 }"#).unwrap();

        assert!(matches!(
            EngineConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
        assert_eq!(EngineConfig::load_or_default(&path), EngineConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_default(&dir.path().join("absent.json"));
        assert_eq!(config, EngineConfig::default());
    }
}
