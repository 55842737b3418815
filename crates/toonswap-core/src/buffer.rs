//! Buffer validation and shared plane helpers.

use crate::FilterError;
use image::RgbImage;

/// Reject empty buffers before any per-pixel work.
pub fn ensure_non_empty(img: &RgbImage) -> Result<(), FilterError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(FilterError::EmptyImage {
            width: img.width(),
            height: img.height(),
        });
    }
    Ok(())
}

/// Rec.601 luminance plane, row-major, one byte per pixel.
pub fn luminance(img: &RgbImage) -> Vec<u8> {
    img.pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
            y.round().clamp(0.0, 255.0) as u8
        })
        .collect()
}
