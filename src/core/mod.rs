//! GPU-independent frame orchestration.
//!
//! Everything here runs without a device: dispatch sizing, jitter, the sample
//! counter, change detection and the [`FrameDriver`] state machine. The
//! graphics API sits behind [`FrameBackend`]; see [`crate::gpu`] for the wgpu
//! implementation.
//!
//! ## Frame flow
//! ```text
//! observe pose → (reset counter) → ensure target → prepare params
//!     → dispatch kernel (ceil(W/8), ceil(H/8), 1) → composite 1/(n+1) → submit
//! ```

mod accumulation;
mod backend;
mod camera;
mod dispatch;
mod driver;
mod extent;
mod jitter;
mod params;
mod transform;

pub use accumulation::{AccumulationState, BlendWeight, SampleCounter};
pub use backend::{AccumulationTarget, FrameBackend};
pub use camera::{perspective, CameraState};
pub use dispatch::{DispatchGrid, TILE_SIZE};
pub use driver::{DriverConfig, FrameDriver, FrameReport, ResizePolicy};
pub use extent::Extent;
pub use jitter::{JitterSource, RandomJitter};
pub use params::{
    BlendUniform, DirectionalLight, EnvironmentHandle, FrameParameters, KernelUniform, MAX_BOUNCES,
};
pub use transform::{DirtyFlag, PoseSnapshot, SnapshotDetector, TransformChangeDetector};
