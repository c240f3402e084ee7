//! Copy the display image back to host memory.

use image::Rgba32FImage;

use super::{GpuContext, GpuTarget};
use crate::core::AccumulationTarget;
use crate::util::{align_up, Error, Result};

/// Read the display image of `target` as 32-bit float RGBA.
///
/// Blocks until the GPU has finished all submitted work. Alpha is reported
/// as 1 whatever the image holds.
pub fn read_display(ctx: &GpuContext, target: &GpuTarget) -> Result<Rgba32FImage> {
    let extent = target.extent();
    let format = target.display_format();
    let bytes_per_pixel = format
        .block_copy_size(None)
        .ok_or_else(|| Error::Readback(format!("unsupported display format {format:?}")))?;
    let unpadded = extent.width * bytes_per_pixel;
    let padded = align_up(unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

    let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback_buffer"),
        size: padded as u64 * extent.height as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: target.display_texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(extent.height),
            },
        },
        wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| Error::Readback(e.to_string()))?;
    rx.recv()
        .map_err(|e| Error::Readback(e.to_string()))?
        .map_err(|e| Error::Readback(e.to_string()))?;

    let pixels = {
        let mapped = slice.get_mapped_range();
        unpack_rows(&mapped, format, extent.width, extent.height, padded)?
    };
    buffer.unmap();

    Rgba32FImage::from_raw(extent.width, extent.height, pixels)
        .ok_or_else(|| Error::Readback("pixel count mismatch".into()))
}

/// Strip row padding and widen texels to f32.
fn unpack_rows(data: &[u8], format: wgpu::TextureFormat, width: u32, height: u32, padded: u32) -> Result<Vec<f32>> {
    let mut out = Vec::with_capacity((width * height * 4) as usize);
    for row in data.chunks(padded as usize).take(height as usize) {
        match format {
            wgpu::TextureFormat::Rgba32Float => {
                let row = &row[..(width * 16) as usize];
                for px in row.chunks_exact(16) {
                    let c = |i: usize| f32::from_le_bytes([px[i], px[i + 1], px[i + 2], px[i + 3]]);
                    out.extend([c(0), c(4), c(8), 1.0]);
                }
            }
            other => return Err(Error::Readback(format!("unsupported display format {other:?}"))),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_f32_strips_padding() {
        // 2x2 image, 32 bytes of pixels per row padded to 48
        let mut data = Vec::new();
        for row in 0..2u32 {
            for col in 0..2u32 {
                let v = (row * 2 + col) as f32;
                for c in [v, v + 0.5, v + 0.25, 0.0] {
                    data.extend_from_slice(&c.to_le_bytes());
                }
            }
            data.extend_from_slice(&[0xAB; 16]);
        }
        let px = unpack_rows(&data, wgpu::TextureFormat::Rgba32Float, 2, 2, 48).unwrap();
        assert_eq!(px.len(), 16);
        assert_eq!(&px[0..4], &[0.0, 0.5, 0.25, 1.0]);
        assert_eq!(&px[12..16], &[3.0, 3.5, 3.25, 1.0]);
    }

    #[test]
    fn test_unpack_rejects_other_formats() {
        let data = vec![0u8; 256];
        let err = unpack_rows(&data, wgpu::TextureFormat::Rgba16Float, 1, 1, 256).unwrap_err();
        assert!(matches!(err, Error::Readback(_)));
    }
}
