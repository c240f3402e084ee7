//! # Progressive Tracer
//!
//! Host-side orchestration for a GPU progressive ray tracer. Every displayed
//! frame the driver hands the camera and scene parameters to a compute
//! kernel, dispatches it over the output in 8x8 tiles, and folds the result
//! into a display image as a running mean. Moving the camera (or changing
//! any kernel input) restarts the mean.
//!
//! ## Modules
//!
//! - [`util`] - Error type and small math helpers
//! - [`core`] - Device-independent frame orchestration ([`FrameDriver`])
//! - [`settings`] - Persistent configuration
//! - [`gpu`] - wgpu backend, kernel pipeline, readback
//! - `viewer` - Interactive window (feature `viewer`)
//!
//! ## Example
//!
//! ```ignore
//! use progressive_tracer::prelude::*;
//!
//! let settings = TracerSettings::default();
//! let backend = WgpuBackend::new(GpuContext::headless()?, &settings)?;
//! let environment = backend.environment_handle();
//! let mut driver = settings.frame_driver(backend, environment);
//!
//! let extent = Extent::new(640, 480);
//! let camera = CameraState::look_at(Vec3::new(0.0, 2.0, 8.0), Vec3::Y, Vec3::Y, 45.0, extent.aspect());
//! for _ in 0..64 {
//!     driver.render_frame(&camera, extent)?;
//! }
//! let image = driver.backend().read_display(driver.target().unwrap())?;
//! save_image(&image, "out.exr".as_ref(), 1.0)?;
//! ```

pub mod core;
pub mod gpu;
pub mod settings;
pub mod util;

// Interactive viewer (optional, enabled with "viewer" feature)
#[cfg(feature = "viewer")]
pub mod viewer;

// Re-export commonly used types
pub use crate::core::{CameraState, Extent, FrameDriver, FrameReport};
pub use settings::TracerSettings;
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        AccumulationState, CameraState, DriverConfig, Extent, FrameBackend, FrameDriver, FrameReport,
        ResizePolicy,
    };
    pub use crate::gpu::{save_image, GpuContext, WgpuBackend};
    pub use crate::settings::TracerSettings;
    pub use crate::util::{Error, Result, Vec3};
}
