//! Camera controls using dolly

use dolly::prelude::*;
use glam::{Mat4, Vec3};

use crate::core::{perspective, CameraState};

/// Orbit camera rig for the interactive viewer
pub struct OrbitCamera {
    rig: CameraRig,
    /// Vertical FOV in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    home: (Vec3, f32, f32, f32),
}

impl OrbitCamera {
    /// Camera looking at `target` from `distance`, yaw/pitch in degrees
    pub fn new(target: Vec3, distance: f32, yaw: f32, pitch: f32) -> Self {
        let rig = CameraRig::builder()
            .with(YawPitch::new().yaw_degrees(yaw).pitch_degrees(pitch))
            .with(Smooth::new_rotation(0.0))
            .with(Arm::new(mint::Vector3 { x: 0.0, y: 0.0, z: distance }))
            .with(Smooth::new_position(0.0))
            .with(LookAt::new(mint::Point3 { x: target.x, y: target.y, z: target.z }).tracking_smoothness(0.0))
            .build();

        Self {
            rig,
            fov: 45.0,
            near: 0.1,
            far: 1000.0,
            home: (target, distance, yaw, pitch),
        }
    }

    /// Orbit around target (drag)
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let sensitivity = 0.3;
        self.rig
            .driver_mut::<YawPitch>()
            .rotate_yaw_pitch(-delta_x * sensitivity, -delta_y * sensitivity);
    }

    /// Screen-space pan (right drag)
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let right: Vec3 = self.rig.final_transform.right();
        let up: Vec3 = self.rig.final_transform.up();
        let dist = self.rig.driver::<Arm>().offset.z;

        let sensitivity = 0.002 * dist;
        let offset = right * (-delta_x * sensitivity) + up * (delta_y * sensitivity);

        let look_at = self.rig.driver_mut::<LookAt>();
        look_at.target.x += offset.x;
        look_at.target.y += offset.y;
        look_at.target.z += offset.z;
    }

    /// Zoom (scroll), `delta` in lines
    pub fn zoom(&mut self, delta: f32) {
        let arm = self.rig.driver_mut::<Arm>();
        let factor = 1.0 - delta * 0.1;
        arm.offset.z = (arm.offset.z * factor).clamp(0.1, 5000.0);
    }

    /// Back to the initial view
    pub fn reset(&mut self) {
        let (target, distance, yaw, pitch) = self.home;
        *self = Self::new(target, distance, yaw, pitch);
    }

    /// Update camera (call each frame)
    pub fn update(&mut self, dt: f32) {
        self.rig.update(dt);
    }

    pub fn position(&self) -> Vec3 {
        let p = self.rig.final_transform.position;
        Vec3::new(p.x, p.y, p.z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        let t = &self.rig.final_transform;
        let pos = self.position();
        let fwd: Vec3 = t.forward();
        let up: Vec3 = t.up();
        Mat4::look_at_rh(pos, pos + fwd, up)
    }

    /// Pose and projection for the frame driver
    pub fn camera_state(&self, aspect: f32) -> CameraState {
        CameraState::new(
            self.view_matrix().inverse(),
            perspective(self.fov.to_radians(), aspect, self.near, self.far),
        )
    }
}
