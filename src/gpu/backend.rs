//! wgpu implementation of [`FrameBackend`].
//!
//! ## Usage
//! ```ignore
//! let ctx = GpuContext::headless()?;
//! let backend = WgpuBackend::new(ctx, &settings)?;
//! let config = settings.driver_config(backend.environment_handle());
//! let mut driver = FrameDriver::new(backend, config);
//! driver.render_frame(&camera, Extent::new(640, 480))?;
//! let image = driver.backend().read_display(driver.target().unwrap())?;
//! ```

use std::path::Path;

use super::{
    load_kernel_source, read_display, CompositePass, EnvironmentMap, GpuContext, GpuTarget,
    RayTracingKernel, TargetId,
};
use crate::core::{BlendWeight, DispatchGrid, EnvironmentHandle, Extent, FrameBackend, FrameParameters};
use crate::settings::TracerSettings;
use crate::util::{Error, Result};

/// Kernel bind group for one (target, environment) pair.
struct KernelBinding {
    target: TargetId,
    environment: EnvironmentHandle,
    bind_group: wgpu::BindGroup,
}

/// Owns the device, the kernel and the composite pipeline.
///
/// `dispatch` and `composite` record into one command encoder that `submit`
/// finishes, so the blend always sees the dispatch of the same frame.
pub struct WgpuBackend {
    ctx: GpuContext,
    kernel: RayTracingKernel,
    composite: CompositePass,
    environment: EnvironmentMap,
    kernel_binding: Option<KernelBinding>,
    encoder: Option<wgpu::CommandEncoder>,
    next_target: u64,
    next_environment: u64,
}

impl WgpuBackend {
    /// Compile the configured kernel and load the configured environment.
    pub fn new(ctx: GpuContext, settings: &TracerSettings) -> Result<Self> {
        let source = load_kernel_source(settings.kernel.as_deref())?;
        let kernel = RayTracingKernel::new(&ctx, &source, settings.kernel_entry_point.as_deref())?;
        let composite = CompositePass::new(&ctx.device);

        let handle = EnvironmentHandle(1);
        let environment = match &settings.environment {
            Some(path) => EnvironmentMap::load(&ctx, path, settings.environment_intensity, handle)?,
            None => EnvironmentMap::gradient(&ctx, settings.environment_intensity, handle)?,
        };

        Ok(Self {
            ctx,
            kernel,
            composite,
            environment,
            kernel_binding: None,
            encoder: None,
            next_target: 1,
            next_environment: handle.0 + 1,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    /// Handle of the environment currently bound to the kernel.
    pub fn environment_handle(&self) -> EnvironmentHandle {
        self.environment.handle()
    }

    /// Swap in an environment file. Pass the returned handle to
    /// [`FrameDriver::set_environment`](crate::core::FrameDriver::set_environment)
    /// so accumulation restarts.
    pub fn load_environment(&mut self, path: &Path, intensity: f32) -> Result<EnvironmentHandle> {
        let handle = self.allocate_environment_handle();
        let map = EnvironmentMap::load(&self.ctx, path, intensity, handle)?;
        Ok(self.replace_environment(map))
    }

    /// Swap in the procedural sky.
    pub fn use_gradient_environment(&mut self, intensity: f32) -> Result<EnvironmentHandle> {
        let handle = self.allocate_environment_handle();
        let map = EnvironmentMap::gradient(&self.ctx, intensity, handle)?;
        Ok(self.replace_environment(map))
    }

    fn allocate_environment_handle(&mut self) -> EnvironmentHandle {
        let handle = EnvironmentHandle(self.next_environment);
        self.next_environment += 1;
        handle
    }

    fn replace_environment(&mut self, map: EnvironmentMap) -> EnvironmentHandle {
        let handle = map.handle();
        let old = std::mem::replace(&mut self.environment, map);
        self.kernel_binding = None;
        old.destroy();
        tracing::debug!(handle = handle.0, "environment replaced");
        handle
    }

    /// Read the display image of `target` back to the host.
    pub fn read_display(&self, target: &GpuTarget) -> Result<image::Rgba32FImage> {
        read_display(&self.ctx, target)
    }
}

impl FrameBackend for WgpuBackend {
    type Target = GpuTarget;

    fn allocate_target(&mut self, extent: Extent) -> Result<GpuTarget> {
        let id = TargetId(self.next_target);
        self.next_target += 1;
        GpuTarget::allocate(&self.ctx, &self.composite, extent, id)
    }

    fn release_target(&mut self, target: GpuTarget) {
        if self.kernel_binding.as_ref().is_some_and(|b| b.target == target.id()) {
            self.kernel_binding = None;
        }
        target.destroy();
    }

    fn dispatch(&mut self, target: &GpuTarget, params: &FrameParameters, grid: DispatchGrid) -> Result<()> {
        if params.environment != self.environment.handle() {
            return Err(Error::missing(format!(
                "environment {:?} (bound: {:?})",
                params.environment,
                self.environment.handle()
            )));
        }

        let stale = self
            .kernel_binding
            .as_ref()
            .is_none_or(|b| b.target != target.id() || b.environment != params.environment);
        if stale {
            let bind_group = self.kernel.bind(&self.ctx.device, target.sample_view(), &self.environment);
            self.kernel_binding = Some(KernelBinding {
                target: target.id(),
                environment: params.environment,
                bind_group,
            });
        }

        self.kernel.write_params(&self.ctx.queue, params);
        let encoder = self.encoder.get_or_insert_with(|| {
            self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            })
        });
        if let Some(binding) = &self.kernel_binding {
            self.kernel.record(encoder, &binding.bind_group, grid);
        }
        Ok(())
    }

    fn composite(&mut self, target: &GpuTarget, weight: BlendWeight) -> Result<()> {
        self.composite.write_weight(&self.ctx.queue, weight);
        let encoder = self.encoder.get_or_insert_with(|| {
            self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            })
        });
        self.composite.record(encoder, target);
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        let (_, error) = self.ctx.capture_errors(|| {
            self.ctx.queue.submit(Some(encoder.finish()));
        });
        match error {
            Some(err) => Err(Error::Submission(err.to_string())),
            None => Ok(()),
        }
    }
}
