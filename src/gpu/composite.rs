//! Accumulation blend: folds the latest kernel sample into the display image.
//!
//! A compute pass reads the sample and the current mean, writes
//! `mean * (1 - w) + sample * w` with `w = 1/(n+1)` into a scratch image, and
//! a texture copy moves the result back over the mean. Everything stays
//! Rgba32Float, so the mean keeps converging after many thousands of samples.

use wgpu::util::DeviceExt;

use super::GpuTarget;
use crate::core::{AccumulationTarget, BlendUniform, BlendWeight, DispatchGrid};

const ACCUMULATE_WGSL: &str = include_str!("shaders/accumulate.wgsl");

/// Format of the running mean and its scratch image.
pub const DISPLAY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Compute pipeline for the accumulation blend.
pub struct CompositePass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

fn unfilterable_texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

impl CompositePass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("accumulate_shader"),
            source: wgpu::ShaderSource::Wgsl(ACCUMULATE_WGSL.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("accumulate_bind_group_layout"),
            entries: &[
                // @binding(0) Kernel sample
                unfilterable_texture(0),
                // @binding(1) Running mean
                unfilterable_texture(1),
                // @binding(2) Blended output
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: DISPLAY_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                // @binding(3) Blend weight
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<BlendUniform>() as u64),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("accumulate_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("accumulate_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("accumulate_uniform_buffer"),
            contents: bytemuck::bytes_of(&BlendUniform::new(1.0)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
        }
    }

    /// Bind group reading `sample` and `mean`, writing `blended`.
    pub fn bind(
        &self,
        device: &wgpu::Device,
        sample: &wgpu::TextureView,
        mean: &wgpu::TextureView,
        blended: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("accumulate_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(sample),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(mean),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(blended),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        })
    }

    /// Stage the blend weight; lands before the next submit.
    pub fn write_weight(&self, queue: &wgpu::Queue, weight: BlendWeight) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&BlendUniform::new(weight.value())));
    }

    /// Record the blend for `target` and copy the result over its display image.
    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, target: &GpuTarget) {
        let extent = target.extent();
        let grid = DispatchGrid::for_extent(extent);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("accumulate_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, target.composite_bind_group(), &[]);
            pass.dispatch_workgroups(grid.x, grid.y, grid.z);
        }
        encoder.copy_texture_to_texture(
            target.blend_texture().as_image_copy(),
            target.display_texture().as_image_copy(),
            wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// f32 model of the shader's update for one channel.
    fn blend(mean: f32, sample: f32, weight: f32) -> f32 {
        if weight >= 1.0 {
            sample
        } else {
            mean + (sample - mean) * weight
        }
    }

    #[test]
    fn test_blend_computes_running_mean() {
        let samples = [0.9, 0.1, 0.5, 0.3, 0.7];
        let mut display = f32::NAN; // stale contents
        for (n, s) in samples.iter().enumerate() {
            display = blend(display, *s, BlendWeight::for_sample(n as u32).value());
        }
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!((display - mean).abs() < 1e-5);
    }

    #[test]
    fn test_blend_holds_precision_over_many_samples() {
        // Bright half then dark half; the exact mean is 0.5
        let mut display = 0.0f32;
        for n in 0..4096u32 {
            let sample = if n < 2048 { 1.0 } else { 0.0 };
            display = blend(display, sample, BlendWeight::for_sample(n).value());
        }
        assert!((display - 0.5).abs() < 1e-3, "mean drifted to {display}");
    }

    #[test]
    fn test_shader_contract() {
        assert!(ACCUMULATE_WGSL.contains("@workgroup_size(8, 8, 1)"));
        assert!(ACCUMULATE_WGSL.contains("texture_storage_2d<rgba32float, write>"));
        assert_eq!(DISPLAY_FORMAT, wgpu::TextureFormat::Rgba32Float);
    }
}
