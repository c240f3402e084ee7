//! Device and queue setup.

use crate::util::{Error, Result};

/// wgpu device, queue and the capabilities the tracer cares about.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Context without a surface, for offline rendering and tests.
    pub fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        Self::with_instance(instance, None)
    }

    /// Context whose adapter can present to `compatible_surface`.
    pub fn with_instance(instance: wgpu::Instance, compatible_surface: Option<&wgpu::Surface<'_>>) -> Result<Self> {
        pollster::block_on(Self::init(instance, compatible_surface))
    }

    async fn init(instance: wgpu::Instance, compatible_surface: Option<&wgpu::Surface<'_>>) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface,
            })
            .await
            .map_err(|e| Error::NoAdapter(e.to_string()))?;

        let info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("progressive_tracer_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::default(),
            })
            .await
            .map_err(|e| Error::RequestDevice(e.to_string()))?;

        tracing::info!(
            adapter = %info.name,
            backend = ?info.backend,
            max_texture = device.limits().max_texture_dimension_2d,
            "GPU context ready"
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Largest width or height a target may have on this device.
    pub fn max_extent(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Run `f` and return the first validation or out-of-memory error it raised.
    pub(crate) fn capture_errors<T>(&self, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        (value, validation.or(oom))
    }
}
