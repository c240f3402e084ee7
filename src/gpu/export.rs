//! Write read-back display images to disk.
//!
//! Float formats (`.exr`, `.hdr`) keep the linear radiance untouched. Any
//! other extension gets exposure, clamping and sRGB encoding to 8 bits.

use std::path::Path;

use image::{DynamicImage, Rgba32FImage, RgbaImage};

use crate::util::Result;

/// How an output path will be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Linear float (EXR, Radiance HDR)
    Linear,
    /// Tone-mapped 8-bit (PNG and friends)
    Display,
}

impl OutputKind {
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("exr") | Some("hdr") => Self::Linear,
            _ => Self::Display,
        }
    }
}

/// Save `img` to `path`, picking the encoding from the extension.
pub fn save_image(img: &Rgba32FImage, path: &Path, exposure: f32) -> Result<()> {
    let is_hdr = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("hdr"));
    match OutputKind::for_path(path) {
        // Radiance HDR has no alpha channel
        OutputKind::Linear if is_hdr => DynamicImage::ImageRgba32F(img.clone()).to_rgb32f().save(path)?,
        OutputKind::Linear => img.save(path)?,
        OutputKind::Display => tonemap(img, exposure).save(path)?,
    }
    tracing::info!(path = %path.display(), width = img.width(), height = img.height(), "saved image");
    Ok(())
}

/// Exposure, clamp and sRGB-encode to 8 bits per channel.
pub fn tonemap(img: &Rgba32FImage, exposure: f32) -> RgbaImage {
    RgbaImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y).0;
        let encode = |c: f32| (linear_to_srgb((c * exposure).clamp(0.0, 1.0)) * 255.0 + 0.5) as u8;
        image::Rgba([encode(p[0]), encode(p[1]), encode(p[2]), 255])
    })
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}
