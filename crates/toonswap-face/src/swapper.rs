//! Face swapper via ONNX Runtime.
//!
//! Feeds an aligned 128×128 target face crop and a source identity
//! embedding to an inswapper-style model, then warps the swapped crop back
//! into the frame under a feathered mask so the seam does not show.

use crate::alignment;
use crate::types::{Face, Identity};
use image::{Rgb, RgbImage};
use ndarray::{Array2, Array4};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SWAP_INPUT_SIZE: u32 = 128;
const SWAP_EMBED_DIM: usize = 512;
/// Feather width of the paste-back mask, in crop pixels.
const SWAP_FEATHER_PX: f32 = 12.0;

#[derive(Error, Debug)]
pub enum SwapperError {
    #[error("swap model not found: {0} — place inswapper_128.onnx in the model directory")]
    ModelNotFound(String),
    #[error("swap inference failed: {0}")]
    InferenceFailed(String),
    #[error("target face has no landmarks — the detector must supply them for alignment")]
    NoLandmarks,
    #[error("identity embedding has {0} dimensions, the swap model expects {SWAP_EMBED_DIM}")]
    BadIdentity(usize),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

#[derive(Debug)]
pub struct FaceSwapper {
    session: Session,
}

impl FaceSwapper {
    /// Load the swap model from the given path.
    pub fn load(model_path: &str) -> Result<Self, SwapperError> {
        if !Path::new(model_path).exists() {
            return Err(SwapperError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded face swap model");
        Ok(Self { session })
    }

    /// Swap the given identity onto `target_face` within `base`, returning
    /// a frame of identical dimensions.
    pub fn swap(
        &mut self,
        base: &RgbImage,
        target_face: &Face,
        identity: &Identity,
    ) -> Result<RgbImage, SwapperError> {
        let landmarks = target_face.landmarks.as_ref().ok_or(SwapperError::NoLandmarks)?;
        if identity.values.len() != SWAP_EMBED_DIM {
            return Err(SwapperError::BadIdentity(identity.values.len()));
        }

        // Frame → crop transform; kept for the paste-back.
        let matrix =
            alignment::estimate_similarity(landmarks, &alignment::template_for(SWAP_INPUT_SIZE));
        let crop = alignment::warp_into(base, &matrix, SWAP_INPUT_SIZE, SWAP_INPUT_SIZE);

        let target_tensor = preprocess(&crop);
        let identity_tensor =
            Array2::from_shape_vec((1, SWAP_EMBED_DIM), identity.values.clone())
                .map_err(|e| SwapperError::InferenceFailed(format!("identity tensor: {e}")))?;

        let outputs = self.session.run(ort::inputs![
            "target" => TensorRef::from_array_view(target_tensor.view())?,
            "source" => TensorRef::from_array_view(identity_tensor.view())?,
        ])?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| SwapperError::InferenceFailed(format!("swap output: {e}")))?;

        let size = SWAP_INPUT_SIZE as usize;
        if data.len() != 3 * size * size {
            return Err(SwapperError::InferenceFailed(format!(
                "expected a 3x{size}x{size} swap output, got {} values",
                data.len()
            )));
        }

        let swapped = postprocess(data, SWAP_INPUT_SIZE);
        Ok(paste_back(base, &swapped, &matrix))
    }
}

/// Aligned crop → NCHW tensor scaled to [0,1].
fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let size = SWAP_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in crop.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
        }
    }
    tensor
}

/// CHW [0,1] model output → RGB crop.
fn postprocess(data: &[f32], size: u32) -> RgbImage {
    let s = size as usize;
    let mut crop = RgbImage::new(size, size);
    for y in 0..s {
        for x in 0..s {
            let mut pixel = [0u8; 3];
            for c in 0..3 {
                pixel[c] = (data[c * s * s + y * s + x] * 255.0).round().clamp(0.0, 255.0) as u8;
            }
            crop.put_pixel(x as u32, y as u32, Rgb(pixel));
        }
    }
    crop
}

/// Linear feather from 0 at the crop border to 1 past the feather width.
fn feather_weight(cx: f32, cy: f32, size: f32, feather: f32) -> f32 {
    let edge = cx.min(cy).min(size - 1.0 - cx).min(size - 1.0 - cy);
    (edge / feather).clamp(0.0, 1.0)
}

/// Warp the swapped crop back into the frame through the inverse of the
/// alignment transform, blending under a feathered mask.
fn paste_back(base: &RgbImage, crop: &RgbImage, matrix: &[f32; 6]) -> RgbImage {
    let mut out = base.clone();
    let Some(inv) = alignment::invert_similarity(matrix) else {
        return out;
    };

    // Bound the work area by projecting the crop corners into the frame.
    let side = SWAP_INPUT_SIZE as f32;
    let corners = [(0.0, 0.0), (side, 0.0), (0.0, side), (side, side)]
        .map(|(x, y)| alignment::transform_point(&inv, x, y));
    let x0 = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let y0 = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let x1 = (corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max).ceil() as u32)
        .min(base.width().saturating_sub(1));
    let y1 = (corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max).ceil() as u32)
        .min(base.height().saturating_sub(1));

    for y in y0..=y1 {
        for x in x0..=x1 {
            let (cx, cy) = alignment::transform_point(matrix, x as f32, y as f32);
            if cx < 0.0 || cy < 0.0 || cx >= side || cy >= side {
                continue;
            }
            let weight = feather_weight(cx, cy, side, SWAP_FEATHER_PX);
            if weight <= 0.0 {
                continue;
            }
            let swapped = alignment::sample_bilinear(crop, cx, cy);
            let current = out.get_pixel(x, y).0;
            let mut blended = [0u8; 3];
            for c in 0..3 {
                let v = current[c] as f32 * (1.0 - weight) + swapped[c] * weight;
                blended[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            out.put_pixel(x, y, Rgb(blended));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feather_is_zero_at_border_and_one_at_center() {
        let side = SWAP_INPUT_SIZE as f32;
        assert_eq!(feather_weight(0.0, 64.0, side, SWAP_FEATHER_PX), 0.0);
        assert_eq!(feather_weight(64.0, 64.0, side, SWAP_FEATHER_PX), 1.0);
        let mid = feather_weight(6.0, 64.0, side, SWAP_FEATHER_PX);
        assert!(mid > 0.0 && mid < 1.0, "got {mid}");
    }

    #[test]
    fn postprocess_round_trips_preprocess() {
        let mut crop = RgbImage::new(SWAP_INPUT_SIZE, SWAP_INPUT_SIZE);
        for (x, y, p) in crop.enumerate_pixels_mut() {
            *p = Rgb([(x % 256) as u8, (y % 256) as u8, 77]);
        }
        let tensor = preprocess(&crop);
        let data: Vec<f32> = tensor.iter().copied().collect();
        let back = postprocess(&data, SWAP_INPUT_SIZE);
        assert_eq!(back, crop);
    }

    #[test]
    fn paste_back_preserves_frame_dimensions_and_far_pixels() {
        let base = RgbImage::from_pixel(300, 200, Rgb([10, 20, 30]));
        let crop = RgbImage::from_pixel(SWAP_INPUT_SIZE, SWAP_INPUT_SIZE, Rgb([200, 200, 200]));
        // Identity-ish transform: crop maps to the top-left 128x128 region.
        let matrix = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let out = paste_back(&base, &crop, &matrix);
        assert_eq!(out.dimensions(), (300, 200));
        // Center of the pasted region is fully swapped.
        assert_eq!(out.get_pixel(64, 64).0, [200, 200, 200]);
        // Far outside the region, the frame is untouched.
        assert_eq!(out.get_pixel(290, 190).0, [10, 20, 30]);
        // The very border of the region feathers back to the frame.
        assert_eq!(out.get_pixel(0, 64).0, [10, 20, 30]);
    }

    #[test]
    fn paste_back_with_degenerate_transform_is_a_copy() {
        let base = RgbImage::from_pixel(50, 50, Rgb([1, 2, 3]));
        let crop = RgbImage::from_pixel(SWAP_INPUT_SIZE, SWAP_INPUT_SIZE, Rgb([255, 255, 255]));
        let out = paste_back(&base, &crop, &[0.0; 6]);
        assert_eq!(out, base);
    }
}
