//! Math type re-exports and small helpers shared by the driver and the GPU backend.

pub use glam::{Mat4, Quat, UVec2, Vec2, Vec3, Vec4};

/// Ceiling division for unsigned grid sizing.
#[inline]
pub const fn ceil_div(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor)
}

/// Largest absolute per-element difference between two matrices.
///
/// Non-finite elements that compare as NaN count as an infinite difference.
#[inline]
pub fn max_abs_diff(a: &Mat4, b: &Mat4) -> f32 {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .map(|(x, y)| {
            let d = (x - y).abs();
            if d.is_nan() {
                f32::INFINITY
            } else {
                d
            }
        })
        .fold(0.0f32, f32::max)
}

/// Round `value` up to the next multiple of `align` (power of two).
#[inline]
pub const fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}
