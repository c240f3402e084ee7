//! Equirectangular environment texture sampled by the kernel on ray misses.
//!
//! HDR and EXR files go through the `image` crate and are stored as
//! Rgba16Float so they stay filterable. Without a file, a small procedural
//! sky gradient is generated.

use std::path::Path;

use half::f16;
use wgpu::util::DeviceExt;

use super::GpuContext;
use crate::core::EnvironmentHandle;
use crate::util::{Error, Result};

/// Procedural sky resolution.
const SKY_WIDTH: u32 = 64;
const SKY_HEIGHT: u32 = 32;

/// Environment texture plus the handle the driver uses to refer to it.
pub struct EnvironmentMap {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    handle: EnvironmentHandle,
}

impl EnvironmentMap {
    /// Load an HDR/EXR file, scaling texels by `intensity`.
    pub fn load(ctx: &GpuContext, path: &Path, intensity: f32, handle: EnvironmentHandle) -> Result<Self> {
        if !path.exists() {
            return Err(Error::missing(format!("environment map {}", path.display())));
        }
        let (width, height, texels) = load_image_file(path, intensity)?;
        let map = Self::from_texels(ctx, "hdr_env_texture", width, height, &texels, handle)?;
        tracing::info!(path = %path.display(), width, height, "loaded environment map");
        Ok(map)
    }

    /// Procedural horizon-to-zenith gradient.
    pub fn gradient(ctx: &GpuContext, intensity: f32, handle: EnvironmentHandle) -> Result<Self> {
        let texels = gradient_texels(SKY_WIDTH, SKY_HEIGHT, intensity);
        Self::from_texels(ctx, "sky_env_texture", SKY_WIDTH, SKY_HEIGHT, &texels, handle)
    }

    fn from_texels(
        ctx: &GpuContext,
        label: &str,
        width: u32,
        height: u32,
        texels: &[f16],
        handle: EnvironmentHandle,
    ) -> Result<Self> {
        let max = ctx.max_extent();
        if width > max || height > max {
            return Err(Error::allocation(width, height, format!("environment map exceeds device limit {max}")));
        }
        let (texture, error) = ctx.capture_errors(|| {
            ctx.device.create_texture_with_data(
                &ctx.queue,
                &wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba16Float,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                bytemuck::cast_slice(texels),
            )
        });
        if let Some(err) = error {
            texture.destroy();
            return Err(Error::allocation(width, height, err.to_string()));
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            width,
            height,
            handle,
        })
    }

    pub fn handle(&self) -> EnvironmentHandle {
        self.handle
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub(crate) fn destroy(self) {
        self.texture.destroy();
    }
}

/// Sampler shared by every environment: wraps in longitude, clamps at the poles.
pub(crate) fn create_env_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("env_sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Load HDR/EXR file using image crate, convert to f16
fn load_image_file(path: &Path, intensity: f32) -> Result<(u32, u32, Vec<f16>)> {
    let img = image::open(path)?;
    let rgba = img.to_rgba32f();
    let (width, height) = rgba.dimensions();
    let data = rgba
        .into_raw()
        .chunks_exact(4)
        .flat_map(|px| {
            [
                f16::from_f32(px[0] * intensity),
                f16::from_f32(px[1] * intensity),
                f16::from_f32(px[2] * intensity),
                f16::ONE,
            ]
        })
        .collect();
    Ok((width, height, data))
}

/// Rows run from zenith (v=0) to nadir (v=1), matching the kernel's lookup.
fn gradient_texels(width: u32, height: u32, intensity: f32) -> Vec<f16> {
    const ZENITH: [f32; 3] = [0.25, 0.45, 0.85];
    const HORIZON: [f32; 3] = [0.85, 0.9, 1.0];
    const GROUND: [f32; 3] = [0.3, 0.27, 0.24];

    let mut texels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let v = (y as f32 + 0.5) / height as f32;
        // Elevation: +1 at zenith, -1 at nadir
        let elevation = 1.0 - 2.0 * v;
        let color: [f32; 3] = if elevation >= 0.0 {
            let t = elevation.sqrt();
            std::array::from_fn(|i| HORIZON[i] + (ZENITH[i] - HORIZON[i]) * t)
        } else {
            let t = (-elevation).min(0.2) / 0.2;
            std::array::from_fn(|i| HORIZON[i] + (GROUND[i] - HORIZON[i]) * t)
        };
        for _ in 0..width {
            texels.extend(color.iter().map(|c| f16::from_f32(c * intensity)));
            texels.push(f16::ONE);
        }
    }
    texels
}
