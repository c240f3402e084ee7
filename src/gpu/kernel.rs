//! Ray tracing kernel: a WGSL compute shader plus its fixed binding contract.
//!
//! Any kernel can be plugged in as long as it declares:
//!
//! ```wgsl
//! @group(0) @binding(0) var<uniform> frame: FrameUniform;      // see KernelUniform
//! @group(0) @binding(1) var sky: texture_2d<f32>;
//! @group(0) @binding(2) var sky_sampler: sampler;
//! @group(0) @binding(3) var output: texture_storage_2d<rgba32float, write>;
//! @compute @workgroup_size(8, 8, 1)
//! ```

use std::borrow::Cow;
use std::path::Path;

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use super::environment::create_env_sampler;
use super::{EnvironmentMap, GpuContext};
use crate::core::{DispatchGrid, FrameParameters, KernelUniform};
use crate::util::{Error, Result};

/// Bundled kernel used when no file is configured.
pub const REFERENCE_KERNEL_WGSL: &str = include_str!("shaders/reference_kernel.wgsl");

/// Resolve kernel source: the bundled kernel, or the contents of `path`.
pub fn load_kernel_source(path: Option<&Path>) -> Result<Cow<'static, str>> {
    match path {
        None => Ok(Cow::Borrowed(REFERENCE_KERNEL_WGSL)),
        Some(path) if !path.exists() => Err(Error::missing(format!("kernel program {}", path.display()))),
        Some(path) => {
            tracing::info!(path = %path.display(), "loading kernel");
            Ok(Cow::Owned(std::fs::read_to_string(path)?))
        }
    }
}

/// Compiled kernel pipeline with its uniform buffer and sampler.
pub struct RayTracingKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
}

impl RayTracingKernel {
    /// Compile `source`. Validation failures surface as [`Error::KernelCompilation`].
    pub fn new(ctx: &GpuContext, source: &str, entry_point: Option<&str>) -> Result<Self> {
        let device = &ctx.device;
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel_bind_group_layout"),
            entries: &[
                // @binding(0) Frame uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<KernelUniform>() as u64),
                    },
                    count: None,
                },
                // @binding(1) Environment texture
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // @binding(2) Environment sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // @binding(3) Output storage texture
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba32Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kernel_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let (pipeline, error) = ctx.capture_errors(|| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("kernel_shader"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("kernel_pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point,
                compilation_options: Default::default(),
                cache: None,
            })
        });
        if let Some(err) = error {
            return Err(Error::KernelCompilation(err.to_string()));
        }

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kernel_uniform_buffer"),
            contents: bytemuck::bytes_of(&KernelUniform::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            sampler: create_env_sampler(device),
        })
    }

    /// Bind group for one (target, environment) pair.
    pub fn bind(
        &self,
        device: &wgpu::Device,
        output: &wgpu::TextureView,
        environment: &EnvironmentMap,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(environment.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(output),
                },
            ],
        })
    }

    /// Stage the frame uniform; lands before the next submit.
    pub fn write_params(&self, queue: &wgpu::Queue, params: &FrameParameters) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&params.to_uniform()));
    }

    /// Record one dispatch.
    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, grid: DispatchGrid) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("kernel_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(grid.x, grid.y, grid.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_kernel_contract() {
        assert!(REFERENCE_KERNEL_WGSL.contains("@workgroup_size(8, 8, 1)"));
        assert!(REFERENCE_KERNEL_WGSL.contains("texture_storage_2d<rgba32float, write>"));
        assert!(REFERENCE_KERNEL_WGSL.contains("var<uniform> frame: FrameUniform"));
    }

    #[test]
    fn test_default_source_is_reference() {
        let src = load_kernel_source(None).unwrap();
        assert!(matches!(src, Cow::Borrowed(_)));
    }

    #[test]
    fn test_missing_kernel_file() {
        let err = load_kernel_source(Some(Path::new("/nonexistent/kernel.wgsl"))).unwrap_err();
        assert!(matches!(err, Error::MissingCollaborator(_)));
    }

    #[test]
    fn test_kernel_file_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.wgsl");
        std::fs::write(&path, "// custom").unwrap();
        let src = load_kernel_source(Some(&path)).unwrap();
        assert_eq!(src, "// custom");
    }
}
