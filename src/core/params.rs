//! Per-frame kernel parameters and their GPU layout.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Upper bound of the bounce-count setting.
pub const MAX_BOUNCES: u32 = 15;

/// Identifies the environment texture bound to the kernel.
///
/// Backends hand out a new handle every time the environment is replaced, so
/// the driver can tell a swap from a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EnvironmentHandle(pub u64);

/// Directional light passed through to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    /// Direction the light travels (from the light toward the scene).
    pub direction: [f32; 3],
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: [0.4, -1.0, 0.6],
            intensity: 1.0,
        }
    }
}

/// Everything the kernel needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParameters {
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
    /// Sub-pixel offset in [0,1)^2.
    pub pixel_offset: Vec2,
    pub max_bounces: u32,
    /// Counter value this frame is blended with; seeds per-pixel randomness.
    pub sample_index: u32,
    pub environment: EnvironmentHandle,
    pub light: Option<DirectionalLight>,
}

impl FrameParameters {
    /// Uniform block matching `FrameUniform` in the kernel.
    pub fn to_uniform(&self) -> KernelUniform {
        let (light_direction, light_intensity) = match self.light {
            Some(light) => (Vec3::from(light.direction).normalize_or_zero(), light.intensity),
            None => (Vec3::ZERO, 0.0),
        };
        KernelUniform {
            camera_to_world: self.camera_to_world.to_cols_array_2d(),
            inverse_projection: self.inverse_projection.to_cols_array_2d(),
            pixel_offset: self.pixel_offset.to_array(),
            bounces: self.max_bounces.min(MAX_BOUNCES),
            sample_index: self.sample_index,
            light_direction: light_direction.to_array(),
            light_intensity,
        }
    }
}

/// Kernel uniform (binding 0). WGSL:
///
/// ```wgsl
/// struct FrameUniform {
///     camera_to_world: mat4x4<f32>,
///     inverse_projection: mat4x4<f32>,
///     pixel_offset: vec2<f32>,
///     bounces: u32,
///     sample_index: u32,
///     light_direction: vec3<f32>,
///     light_intensity: f32,
/// }
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct KernelUniform {
    pub camera_to_world: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
    pub pixel_offset: [f32; 2],
    pub bounces: u32,
    pub sample_index: u32,
    pub light_direction: [f32; 3],
    pub light_intensity: f32,
}

/// Composite pass uniform: `weight` is `1/(sample_index+1)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BlendUniform {
    pub weight: f32,
    pub _pad: [f32; 3],
}

impl BlendUniform {
    pub fn new(weight: f32) -> Self {
        Self {
            weight,
            _pad: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FrameParameters {
        FrameParameters {
            camera_to_world: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            inverse_projection: Mat4::IDENTITY,
            pixel_offset: Vec2::new(0.25, 0.75),
            max_bounces: 8,
            sample_index: 5,
            environment: EnvironmentHandle(1),
            light: None,
        }
    }

    #[test]
    fn test_uniform_layout() {
        // Must match the std140 layout of FrameUniform
        assert_eq!(std::mem::size_of::<KernelUniform>(), 160);
        assert_eq!(std::mem::size_of::<BlendUniform>(), 16);
    }

    #[test]
    fn test_to_uniform() {
        let u = params().to_uniform();
        assert_eq!(u.camera_to_world[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(u.pixel_offset, [0.25, 0.75]);
        assert_eq!(u.bounces, 8);
        assert_eq!(u.sample_index, 5);
        assert_eq!(u.light_intensity, 0.0);
    }

    #[test]
    fn test_light_direction_normalized() {
        let mut p = params();
        p.light = Some(DirectionalLight {
            direction: [0.0, -2.0, 0.0],
            intensity: 3.0,
        });
        let u = p.to_uniform();
        assert_eq!(u.light_direction, [0.0, -1.0, 0.0]);
        assert_eq!(u.light_intensity, 3.0);
    }

    #[test]
    fn test_bounces_clamped_in_uniform() {
        let mut p = params();
        p.max_bounces = 99;
        assert_eq!(p.to_uniform().bounces, MAX_BOUNCES);
    }
}
