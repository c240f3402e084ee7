//! Accumulation target: the kernel's float output, the display image holding
//! the running mean, and the scratch image the blend writes. All share one
//! extent and are Rgba32Float.

use super::{CompositePass, GpuContext, DISPLAY_FORMAT};
use crate::core::{AccumulationTarget, Extent};
use crate::util::{Error, Result};

/// Identifies a target allocation; bind groups cached per target key on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) u64);

/// GPU-side accumulation target.
pub struct GpuTarget {
    id: TargetId,
    extent: Extent,
    sample_texture: wgpu::Texture,
    sample_view: wgpu::TextureView,
    display_texture: wgpu::Texture,
    display_view: wgpu::TextureView,
    blend_texture: wgpu::Texture,
    composite_bind_group: wgpu::BindGroup,
}

impl GpuTarget {
    /// Allocate all images at exactly `extent`.
    ///
    /// Extents above the device limit and allocation errors reported by the
    /// device come back as [`Error::ResourceAllocation`] with nothing leaked.
    pub(crate) fn allocate(ctx: &GpuContext, composite: &CompositePass, extent: Extent, id: TargetId) -> Result<Self> {
        let Extent { width, height } = extent;
        if extent.is_empty() {
            return Err(Error::EmptyExtent { width, height });
        }
        let max = ctx.max_extent();
        if width > max || height > max {
            return Err(Error::allocation(width, height, format!("exceeds device limit {max}")));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let image = |label: &'static str, usage: wgpu::TextureUsages| {
            ctx.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DISPLAY_FORMAT,
                usage,
                view_formats: &[],
            })
        };

        let ((sample_texture, display_texture, blend_texture), error) = ctx.capture_errors(|| {
            // Kernel writes here
            let sample = image(
                "sample_texture",
                wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            );
            // Running mean, read by the blend and by present/readback
            let display = image(
                "display_texture",
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            );
            let blend = image(
                "blend_texture",
                wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            );
            (sample, display, blend)
        });
        if let Some(err) = error {
            sample_texture.destroy();
            display_texture.destroy();
            blend_texture.destroy();
            return Err(Error::allocation(width, height, err.to_string()));
        }

        let sample_view = sample_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let display_view = display_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let blend_view = blend_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let composite_bind_group = composite.bind(&ctx.device, &sample_view, &display_view, &blend_view);

        tracing::debug!(id = id.0, %extent, "allocated accumulation target");

        Ok(Self {
            id,
            extent,
            sample_texture,
            sample_view,
            display_texture,
            display_view,
            blend_texture,
            composite_bind_group,
        })
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn sample_view(&self) -> &wgpu::TextureView {
        &self.sample_view
    }

    /// Display image holding the running mean.
    pub fn display_texture(&self) -> &wgpu::Texture {
        &self.display_texture
    }

    pub fn display_view(&self) -> &wgpu::TextureView {
        &self.display_view
    }

    pub fn display_format(&self) -> wgpu::TextureFormat {
        DISPLAY_FORMAT
    }

    pub(crate) fn blend_texture(&self) -> &wgpu::Texture {
        &self.blend_texture
    }

    pub(crate) fn composite_bind_group(&self) -> &wgpu::BindGroup {
        &self.composite_bind_group
    }

    /// Free GPU memory now instead of when the last reference drops.
    pub(crate) fn destroy(self) {
        self.sample_texture.destroy();
        self.display_texture.destroy();
        self.blend_texture.destroy();
    }
}

impl AccumulationTarget for GpuTarget {
    fn extent(&self) -> Extent {
        self.extent
    }
}
