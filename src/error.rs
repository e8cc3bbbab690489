//! Error types for the fallible edges of the engine.
//!
//! Steady-state streaming has no fatal paths: stale work is dropped and deferred
//! work is retried. The enums below cover file I/O and GPU setup, which are the
//! only places a caller can observe a failure.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading or writing the block modification file.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access modification file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("modification file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode modifications: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures while loading the engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Failures of the geometry sink: buffer growth and device acquisition.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("{buffer} cannot grow to {requested} bytes (device limit is {limit} bytes)")]
    BufferTooLarge {
        buffer: &'static str,
        requested: u64,
        limit: u64,
    },

    #[error("no space for {requested} elements in {buffer} even after growing")]
    OutOfSpace {
        buffer: &'static str,
        requested: u32,
    },

    #[error("no suitable GPU adapter: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),

    #[error("failed to acquire GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}
