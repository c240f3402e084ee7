//! Compute dispatch sizing.
//!
//! The kernel runs 8x8 threads per workgroup; the grid is the output extent
//! divided by the tile size, rounded up so partial tiles at the right and
//! bottom edges are still covered. The kernel discards out-of-range threads.

use super::Extent;
use crate::util::ceil_div;

/// Workgroup tile size (must match @workgroup_size in the kernel).
pub const TILE_SIZE: u32 = 8;

/// Number of workgroups per axis for one kernel invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchGrid {
    /// Grid covering every pixel of `extent`, depth 1.
    pub const fn for_extent(extent: Extent) -> Self {
        Self {
            x: ceil_div(extent.width, TILE_SIZE),
            y: ceil_div(extent.height, TILE_SIZE),
            z: 1,
        }
    }

    /// Total workgroups issued.
    pub const fn workgroups(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    /// Total threads launched, including the ones past the image edge.
    pub const fn invocations(&self) -> u64 {
        self.workgroups() * (TILE_SIZE as u64) * (TILE_SIZE as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_hd() {
        let g = DispatchGrid::for_extent(Extent::new(1920, 1080));
        assert_eq!((g.x, g.y, g.z), (240, 135, 1));
    }

    #[test]
    fn test_single_pixel() {
        let g = DispatchGrid::for_extent(Extent::new(1, 1));
        assert_eq!((g.x, g.y, g.z), (1, 1, 1));
    }

    #[test]
    fn test_partial_tile() {
        let g = DispatchGrid::for_extent(Extent::new(17, 8));
        assert_eq!((g.x, g.y, g.z), (3, 1, 1));
    }

    #[test]
    fn test_covers_every_pixel() {
        for w in 1..40u32 {
            for h in [1u32, 7, 8, 9, 63, 64, 65] {
                let g = DispatchGrid::for_extent(Extent::new(w, h));
                assert!(g.x * TILE_SIZE >= w && (g.x - 1) * TILE_SIZE < w);
                assert!(g.y * TILE_SIZE >= h && (g.y - 1) * TILE_SIZE < h);
            }
        }
    }

    #[test]
    fn test_invocations() {
        let g = DispatchGrid::for_extent(Extent::new(17, 8));
        assert_eq!(g.workgroups(), 3);
        assert_eq!(g.invocations(), 192);
    }
}
