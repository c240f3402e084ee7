//! Interactive viewer: a winit window that shows the display image converging.
//!
//! Left drag orbits, right drag pans, scroll zooms. `[`/`]` change the bounce
//! count, `L` toggles the directional light, `R` resets the camera. Any change
//! restarts accumulation.

mod app;
mod camera;

pub use camera::OrbitCamera;

use anyhow::Result;
use winit::event_loop::EventLoop;

use crate::settings::TracerSettings;

/// Open the viewer window and run until it is closed.
pub fn run(settings: TracerSettings) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = app::ViewerApp::new(settings);
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
