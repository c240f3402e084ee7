//! The seam between frame orchestration and the graphics API.

use super::{BlendWeight, DispatchGrid, Extent, FrameParameters};
use crate::util::Result;

/// An allocated accumulation target.
pub trait AccumulationTarget {
    fn extent(&self) -> Extent;
}

/// Graphics operations the [`FrameDriver`](super::FrameDriver) sequences.
///
/// Calls for one frame arrive in order `dispatch`, `composite`, `submit`, on
/// one thread. Implementations record `dispatch` and `composite` into a single
/// ordered command stream so the composite reads the finished dispatch.
pub trait FrameBackend {
    type Target: AccumulationTarget;

    /// Allocate a kernel-writable float target and a matching display image
    /// of exactly `extent`. The display image starts cleared.
    fn allocate_target(&mut self, extent: Extent) -> Result<Self::Target>;

    /// Release a target that is being replaced or shut down.
    fn release_target(&mut self, target: Self::Target);

    /// Bind `params` and `target` and record one kernel dispatch over `grid`.
    fn dispatch(&mut self, target: &Self::Target, params: &FrameParameters, grid: DispatchGrid) -> Result<()>;

    /// Blend `target` into the display image with `weight`.
    fn composite(&mut self, target: &Self::Target, weight: BlendWeight) -> Result<()>;

    /// Submit everything recorded for this frame.
    fn submit(&mut self) -> Result<()>;
}
