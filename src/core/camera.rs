//! Camera state handed to the driver each frame.

use glam::{Mat4, Vec3};

/// Camera pose and projection for one frame.
///
/// `camera_to_world` is the inverse of the view matrix. `projection` maps view
/// space to wgpu clip space (depth 0..1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub camera_to_world: Mat4,
    pub projection: Mat4,
}

impl CameraState {
    pub fn new(camera_to_world: Mat4, projection: Mat4) -> Self {
        Self {
            camera_to_world,
            projection,
        }
    }

    /// Right-handed look-at camera with a perspective projection.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        let view = Mat4::look_at_rh(eye, target, up);
        Self {
            camera_to_world: view.inverse(),
            projection: perspective(fov_y_degrees.to_radians(), aspect, 0.1, 1000.0),
        }
    }

    /// Camera orbiting `target` at `distance`, `yaw`/`pitch` in degrees.
    pub fn orbit(target: Vec3, distance: f32, yaw: f32, pitch: f32, fov_y_degrees: f32, aspect: f32) -> Self {
        let (sy, cy) = yaw.to_radians().sin_cos();
        let (sp, cp) = pitch.to_radians().sin_cos();
        let offset = Vec3::new(sy * cp, sp, cy * cp) * distance;
        Self::look_at(target + offset, target, Vec3::Y, fov_y_degrees, aspect)
    }

    pub fn view(&self) -> Mat4 {
        self.camera_to_world.inverse()
    }

    pub fn inverse_projection(&self) -> Mat4 {
        self.projection.inverse()
    }

    pub fn position(&self) -> Vec3 {
        self.camera_to_world.w_axis.truncate()
    }
}

/// Perspective projection with wgpu's 0..1 depth range.
pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_y, aspect, near, far)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_position() {
        let cam = CameraState::look_at(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO, Vec3::Y, 60.0, 1.5);
        assert!((cam.position() - Vec3::new(0.0, 1.0, 5.0)).length() < 1e-5);
        let round_trip = cam.view() * cam.camera_to_world;
        assert!(round_trip.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_inverse_projection_unprojects_center() {
        let cam = CameraState::look_at(Vec3::Z, Vec3::ZERO, Vec3::Y, 45.0, 1.0);
        let p = cam.inverse_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let v = p.truncate() / p.w;
        // Center of the near plane looks straight down -Z
        assert!(v.x.abs() < 1e-5 && v.y.abs() < 1e-5);
        assert!(v.z < 0.0);
    }

    #[test]
    fn test_orbit_distance() {
        let cam = CameraState::orbit(Vec3::ZERO, 4.0, 30.0, 20.0, 50.0, 1.0);
        assert!((cam.position().length() - 4.0).abs() < 1e-4);
    }
}
