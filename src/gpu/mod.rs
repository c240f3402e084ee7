//! wgpu backend for the frame driver.
//!
//! - [`GpuContext`]: adapter, device and queue (headless or surface-compatible)
//! - [`RayTracingKernel`]: the pluggable WGSL compute kernel
//! - [`CompositePass`]: the 1/(n+1) accumulation blend
//! - [`WgpuBackend`]: ties them together behind [`FrameBackend`](crate::core::FrameBackend)
//! - [`read_display`] / [`save_image`]: getting pixels out

mod backend;
mod composite;
mod context;
mod environment;
mod export;
mod kernel;
mod present;
mod readback;
mod target;

pub use backend::WgpuBackend;
pub use composite::{CompositePass, DISPLAY_FORMAT};
pub use context::GpuContext;
pub use environment::EnvironmentMap;
pub use export::{save_image, tonemap, OutputKind};
pub use kernel::{load_kernel_source, RayTracingKernel, REFERENCE_KERNEL_WGSL};
pub use present::PresentPass;
pub use readback::read_display;
pub use target::{GpuTarget, TargetId};
