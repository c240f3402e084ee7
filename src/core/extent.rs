//! Output resolution.

use std::fmt;

/// Output image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either side is zero; such an extent cannot back a texture.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width over height, 1.0 for an empty extent.
    #[inline]
    pub fn aspect(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl From<(u32, u32)> for Extent {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert!(Extent::new(0, 10).is_empty());
        assert!(Extent::new(10, 0).is_empty());
        assert!(!Extent::new(1, 1).is_empty());
    }

    #[test]
    fn test_aspect_and_area() {
        let e = Extent::new(1920, 1080);
        assert!((e.aspect() - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(e.area(), 2_073_600);
        assert_eq!(Extent::new(0, 0).aspect(), 1.0);
        assert_eq!(e.to_string(), "1920x1080");
    }
}
