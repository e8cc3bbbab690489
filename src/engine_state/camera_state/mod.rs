//! # Camera State Management
//!
//! This module tracks the observer that drives streaming and culling:
//! - Camera position and orientation tracking
//! - View and projection matrix calculations
//! - A scripted flight path for headless runs
//!
//! ## Core Components
//! - `Camera`: Represents the camera's position and orientation in 3D space
//! - `Projection`: Manages the camera's projection matrix

use cgmath::{Deg, Matrix4, Point3};

pub mod camera;

use camera::{Camera, Projection};

/// Horizontal speed of the scripted flight, in blocks per second.
const FLIGHT_SPEED: f32 = 24.0;
/// Turn rate of the scripted flight, in radians per second.
const FLIGHT_TURN_RATE: f32 = 0.15;

/// Camera plus projection, the pair every culling pass needs.
#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    /// The current camera position and orientation
    pub camera: Camera,
    pub projection: Projection,
}

impl CameraState {
    /// Creates a camera at `position` looking slightly downwards along +X.
    pub fn new(position: Point3<f32>, width: u32, height: u32, view_distance: f32) -> Self {
        CameraState {
            camera: Camera::new(position, Deg(0.0), Deg(-15.0)),
            projection: Projection::new(width, height, Deg(70.0), 0.1, view_distance),
        }
    }

    pub fn position(&self) -> Point3<f32> {
        self.camera.position
    }

    /// Clip-space transform used to build the culling frustum.
    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.camera.calc_matrix()
    }

    /// Advances the scripted flight by one frame.
    pub fn update(&mut self, dt: web_time::Duration) {
        self.camera.fly(FLIGHT_SPEED, FLIGHT_TURN_RATE, dt);
    }
}
