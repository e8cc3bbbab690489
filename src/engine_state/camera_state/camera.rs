//! # Camera Implementation
//!
//! This module contains the core camera implementation including:
//! - Camera representation and transformations
//! - Projection matrix handling
//!
//! ## Key Components
//! - `Camera`: Represents the observer's position and orientation in 3D space
//! - `Projection`: Manages perspective projection settings

use cgmath::*;
use std::f32::consts::FRAC_PI_2;
use web_time::Duration;

/// Transformation matrix to convert from OpenGL's coordinate system to WGPU's.
///
/// WGPU uses a coordinate system where:
/// - X is right
/// - Y is up
/// - NDC (Normalized Device Coordinates) range from -1 to 1 in X and Y, and 0 to 1 in Z
///
/// This matrix performs two main transformations:
/// 1. Scales the Z coordinate from [-1, 1] to [-0.5, 0.5]
/// 2. Translates the Z coordinate from [-0.5, 0.5] to [0, 1]
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,  // Scale Z from [-1,1] to [-0.5,0.5]
    0.0, 0.0, 0.5, 1.0,  // Translate Z from [-0.5,0.5] to [0,1]
);

/// Safe limit for pitch to prevent gimbal lock
const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;

/// A first-person camera: a position plus yaw and pitch.
///
/// Yaw zero looks along +X, positive yaw turns towards +Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// The camera's position in world space
    pub position: Point3<f32>,
    /// Horizontal rotation (around Y axis) in radians
    pub yaw: Rad<f32>,
    /// Vertical rotation (around X axis) in radians
    pub pitch: Rad<f32>,
}

impl Camera {
    /// Creates a new camera with the specified position and orientation.
    ///
    /// # Example
    /// ```rust
    /// use cgmath::{Deg, Point3};
    /// use voxel_stream::engine_state::camera_state::camera::Camera;
    ///
    /// let camera = Camera::new(Point3::new(0.0, 80.0, 0.0), Deg(0.0), Deg(-10.0));
    /// assert!(camera.forward().x > 0.9);
    /// ```
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: V,
        yaw: Y,
        pitch: P,
    ) -> Self {
        let mut camera = Self {
            position: position.into(),
            yaw: yaw.into(),
            pitch: pitch.into(),
        };
        camera.clamp_pitch();
        camera
    }

    /// Normalized direction the camera is looking in.
    pub fn forward(&self) -> Vector3<f32> {
        let (yaw_sin, yaw_cos) = self.yaw.0.sin_cos();
        let (pitch_sin, pitch_cos) = self.pitch.0.sin_cos();
        Vector3::new(pitch_cos * yaw_cos, pitch_sin, pitch_cos * yaw_sin).normalize()
    }

    /// Calculates the view matrix for this camera.
    ///
    /// The view matrix transforms world coordinates to view (camera) space.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y())
    }

    /// Moves along the horizontal heading and turns by `turn_rate` radians per second.
    pub fn fly(&mut self, speed: f32, turn_rate: f32, dt: Duration) {
        let dt = dt.as_secs_f32();
        let (yaw_sin, yaw_cos) = self.yaw.0.sin_cos();
        let heading = Vector3::new(yaw_cos, 0.0, yaw_sin);

        self.position += heading * speed * dt;
        self.yaw += Rad(turn_rate * dt);
        self.yaw = self.yaw.normalize();
    }

    fn clamp_pitch(&mut self) {
        if self.pitch < -Rad(SAFE_FRAC_PI_2) {
            self.pitch = -Rad(SAFE_FRAC_PI_2);
        } else if self.pitch > Rad(SAFE_FRAC_PI_2) {
            self.pitch = Rad(SAFE_FRAC_PI_2);
        }
    }
}

/// Represents a camera's projection matrix and related parameters.
///
/// It manages the aspect ratio, field of view, and near/far clipping planes.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    /// Aspect ratio (width / height)
    aspect: f32,
    /// Vertical field of view in radians
    fovy: Rad<f32>,
    /// Near clipping plane distance
    znear: f32,
    /// Far clipping plane distance
    zfar: f32,
}

impl Projection {
    /// Creates a new projection for a `width` x `height` viewport.
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// Updates the projection's aspect ratio for viewport resizing.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    /// Calculates the projection matrix.
    ///
    /// Combines the perspective projection with the OpenGL to WGPU coordinate system transform.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_is_clamped() {
        let camera = Camera::new(Point3::new(0.0, 0.0, 0.0), Deg(0.0), Deg(120.0));
        assert!(camera.pitch.0 < FRAC_PI_2);
        assert!(camera.forward().y > 0.99);
    }

    #[test]
    fn test_fly_moves_along_heading() {
        let mut camera = Camera::new(Point3::new(0.0, 50.0, 0.0), Deg(90.0), Deg(-30.0));
        camera.fly(10.0, 0.0, Duration::from_secs(2));

        assert!(camera.position.x.abs() < 1e-3);
        assert!((camera.position.z - 20.0).abs() < 1e-3);
        assert_eq!(camera.position.y, 50.0);
    }

    #[test]
    fn test_point_ahead_projects_inside_clip_space() {
        let camera = Camera::new(Point3::new(0.0, 0.0, 0.0), Deg(0.0), Deg(0.0));
        let projection = Projection::new(800, 600, Deg(70.0), 0.1, 500.0);
        let ahead = Vector4::new(10.0, 0.0, 0.0, 1.0);
        let clip = projection.calc_matrix() * camera.calc_matrix() * ahead;

        let ndc = clip.truncate() / clip.w;
        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
