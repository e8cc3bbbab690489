//! # Voxel Stream Entry Point
//!
//! Runs the headless streaming demo. The optional first argument is the path of
//! a JSON engine config.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- voxel_stream.json
//! ```

fn main() {
    voxel_stream::run();
}
