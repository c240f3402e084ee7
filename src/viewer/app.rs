//! Window, surface and input handling for the interactive viewer.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::Vec3;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use super::camera::OrbitCamera;
use crate::core::{Extent, FrameDriver, MAX_BOUNCES};
use crate::gpu::{GpuContext, PresentPass, WgpuBackend};
use crate::settings::TracerSettings;

/// Window title is refreshed every this many samples.
const TITLE_INTERVAL: u32 = 16;

/// Everything that exists only while the window does.
struct ViewerState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_cfg: wgpu::SurfaceConfiguration,
    driver: FrameDriver<WgpuBackend>,
    present: PresentPass,
    camera: OrbitCamera,
    last_frame: Instant,
    // Zero-area window; nothing is rendered until it is restored
    minimized: bool,
}

impl ViewerState {
    fn new(window: Arc<Window>, settings: &TracerSettings) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create window surface")?;
        let ctx = GpuContext::with_instance(instance, Some(&surface))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&ctx.adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let surface_cfg = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &surface_cfg);

        let present = PresentPass::new(&ctx.device, surface_format);
        present.set_exposure(&ctx.queue, settings.exposure);

        let backend = WgpuBackend::new(ctx, settings)?;
        let environment = backend.environment_handle();
        let driver = settings.frame_driver(backend, environment);

        Ok(Self {
            window,
            surface,
            surface_cfg,
            driver,
            present,
            camera: OrbitCamera::new(Vec3::new(0.0, 1.0, 0.0), 8.0, 20.0, -15.0),
            last_frame: Instant::now(),
            minimized: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.minimized = Extent::new(width, height).is_empty();
        if self.minimized {
            return;
        }
        self.surface_cfg.width = width.max(1);
        self.surface_cfg.height = height.max(1);
        self.surface
            .configure(&self.driver.backend().context().device, &self.surface_cfg);
    }

    fn extent(&self) -> Extent {
        Extent::new(self.surface_cfg.width, self.surface_cfg.height)
    }

    /// One progressive step plus present. Returns false when the viewer should exit.
    fn frame(&mut self) -> bool {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.camera.update(dt);
        if self.minimized {
            return true;
        }

        let extent = self.extent();
        let camera = self.camera.camera_state(extent.aspect());
        match self.driver.render_frame(&camera, extent) {
            Ok(report) => {
                if report.dispatched && report.sample_index % TITLE_INTERVAL == 0 {
                    self.window.set_title(&format!(
                        "Progressive Tracer - {} spp, {} bounces",
                        report.sample_index + 1,
                        self.driver.config().max_bounces
                    ));
                }
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "frame skipped");
                return true;
            }
            Err(e) => {
                tracing::error!(error = %e, "rendering failed");
                return false;
            }
        }

        let Some(target) = self.driver.target() else {
            return true;
        };
        let output = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                let device = &self.driver.backend().context().device;
                self.surface.configure(device, &self.surface_cfg);
                return true;
            }
            Err(wgpu::SurfaceError::Timeout) => return true,
            Err(e) => {
                tracing::error!(error = %e, "surface acquisition failed");
                return false;
            }
        };
        let surface_view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let ctx = self.driver.backend().context();
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("present_encoder"),
        });
        self.present.record(&ctx.device, &mut encoder, target, &surface_view);
        ctx.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        true
    }

    fn key(&mut self, code: KeyCode) {
        match code {
            KeyCode::KeyR => self.camera.reset(),
            KeyCode::BracketRight => {
                let bounces = (self.driver.config().max_bounces + 1).min(MAX_BOUNCES);
                self.driver.set_max_bounces(bounces);
            }
            KeyCode::BracketLeft => {
                let bounces = self.driver.config().max_bounces.saturating_sub(1);
                self.driver.set_max_bounces(bounces);
            }
            KeyCode::KeyL => {
                let light = match self.driver.config().light {
                    Some(_) => None,
                    None => Some(Default::default()),
                };
                self.driver.set_light(light);
            }
            _ => {}
        }
    }
}

/// Mouse drag bookkeeping.
#[derive(Default)]
struct DragState {
    orbit: bool,
    pan: bool,
    last: Option<(f64, f64)>,
}

pub struct ViewerApp {
    settings: TracerSettings,
    state: Option<ViewerState>,
    drag: DragState,
    /// First fatal error; reported after the event loop exits
    pub error: Option<anyhow::Error>,
}

impl ViewerApp {
    pub fn new(settings: TracerSettings) -> Self {
        Self {
            settings,
            state: None,
            drag: DragState::default(),
            error: None,
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("Progressive Tracer")
            .with_inner_size(PhysicalSize::new(self.settings.window_width, self.settings.window_height));
        let result = event_loop
            .create_window(attrs)
            .context("failed to create window")
            .and_then(|window| ViewerState::new(Arc::new(window), &self.settings));
        match result {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                state.resize(size.width, size.height);
                state.window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                if !state.frame() {
                    self.error = Some(anyhow::anyhow!("viewer stopped after a rendering error"));
                    event_loop.exit();
                    return;
                }
                if !state.minimized && !state.driver.is_converged() {
                    state.window.request_redraw();
                }
            }
            WindowEvent::MouseInput { state: button_state, button, .. } => {
                let pressed = button_state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.drag.orbit = pressed,
                    MouseButton::Right | MouseButton::Middle => self.drag.pan = pressed,
                    _ => {}
                }
                if !pressed {
                    self.drag.last = None;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((x, y)) = self.drag.last {
                    let (dx, dy) = ((position.x - x) as f32, (position.y - y) as f32);
                    if self.drag.orbit {
                        state.camera.orbit(dx, dy);
                    } else if self.drag.pan {
                        state.camera.pan(dx, dy);
                    }
                    state.window.request_redraw();
                }
                if self.drag.orbit || self.drag.pan {
                    self.drag.last = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                state.camera.zoom(lines);
                state.window.request_redraw();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    if !event.state.is_pressed() {
                        return;
                    }
                    if code == KeyCode::Escape {
                        event_loop.exit();
                        return;
                    }
                    state.key(code);
                    state.window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            tracing::info!(samples = state.driver.sample_count(), "viewer exiting");
            state.driver.shutdown();
        }
    }
}
