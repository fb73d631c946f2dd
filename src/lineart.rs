//! Lineart normalization.
//!
//! The backend treats lineart as ink on paper; alpha channels in uploaded
//! drawings produce unpredictable results, so every lineart upload is
//! composited onto an opaque white canvas before dispatch.

use crate::error::{ArchiError, Result};
use image::{DynamicImage, Rgba, RgbaImage};

/// Flattens an encoded image onto an opaque white background.
///
/// Preserves the original pixel dimensions and re-encodes losslessly as PNG.
/// Fails with [`ArchiError::Decode`] on corrupt input, producing no partial
/// output.
pub fn flatten_to_white(data: &[u8]) -> Result<Vec<u8>> {
    let decoded =
        image::load_from_memory(data).map_err(|e| ArchiError::Decode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut flat = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = px[3] as u32;
        match alpha {
            0 => {}
            255 => flat.put_pixel(x, y, *px),
            _ => {
                let under = flat.get_pixel_mut(x, y);
                for c in 0..3 {
                    let blended = px[c] as u32 * alpha + 255 * (255 - alpha);
                    under[c] = ((blended + 127) / 255) as u8;
                }
            }
        }
    }

    let mut out = Vec::new();
    DynamicImage::ImageRgba8(flat)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| ArchiError::Decode(format!("re-encode failed: {e}")))?;
    Ok(out)
}
