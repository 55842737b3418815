//! Edge-cartoon filter.
//!
//! Flattens color regions with an edge-preserving bilateral filter, finds
//! edges with a median-smoothed adaptive threshold over the luminance
//! plane, and keeps the flattened color only where the edge mask is set.
//! Cleared pixels are black, which draws the cartoon outline.

use crate::buffer;
use crate::FilterError;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartoonParams {
    /// Median blur kernel size over the luminance plane (odd).
    pub median_kernel: u32,
    /// Adaptive threshold neighborhood size (odd).
    pub block_size: u32,
    /// Offset subtracted from the local mean before thresholding.
    pub threshold_offset: f32,
    /// Bilateral spatial sigma.
    pub spatial_sigma: f32,
    /// Bilateral range (color) sigma.
    pub range_sigma: f32,
    /// Bilateral window radius in pixels.
    pub bilateral_radius: u32,
}

impl Default for CartoonParams {
    fn default() -> Self {
        Self {
            median_kernel: 7,
            block_size: 9,
            threshold_offset: 2.0,
            spatial_sigma: 300.0,
            range_sigma: 300.0,
            bilateral_radius: 4,
        }
    }
}

/// Apply the edge-cartoon filter. Output dimensions equal input dimensions.
pub fn apply(img: &RgbImage, params: &CartoonParams) -> Result<RgbImage, FilterError> {
    buffer::ensure_non_empty(img)?;

    let w = img.width() as usize;
    let h = img.height() as usize;

    let lum = buffer::luminance(img);
    let smoothed = median_blur(&lum, w, h, (params.median_kernel / 2) as usize);
    let mask = edge_mask(
        &smoothed,
        w,
        h,
        (params.block_size / 2) as usize,
        params.threshold_offset,
    );

    let mut out = bilateral(img, params);
    for (i, &keep) in mask.iter().enumerate() {
        if !keep {
            out.put_pixel((i % w) as u32, (i / w) as u32, Rgb([0, 0, 0]));
        }
    }
    Ok(out)
}

/// Median blur over a single plane. The window is clamped at the borders
/// so every pixel sees a full-size neighborhood.
fn median_blur(plane: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    if radius == 0 {
        return plane.to_vec();
    }
    let mut out = vec![0u8; plane.len()];
    let window = (radius * 2 + 1) * (radius * 2 + 1);
    let mut values: Vec<u8> = Vec::with_capacity(window);

    for y in 0..height {
        for x in 0..width {
            values.clear();
            for dy in 0..=(radius * 2) {
                let sy = (y as isize + dy as isize - radius as isize)
                    .clamp(0, height as isize - 1) as usize;
                for dx in 0..=(radius * 2) {
                    let sx = (x as isize + dx as isize - radius as isize)
                        .clamp(0, width as isize - 1) as usize;
                    values.push(plane[sy * width + sx]);
                }
            }
            values.sort_unstable();
            out[y * width + x] = values[values.len() / 2];
        }
    }
    out
}

/// Mean-based adaptive binary mask: a pixel is set when its value exceeds
/// the local neighborhood mean minus `offset`. Set pixels survive the
/// compose; clear pixels become the cartoon outline.
fn edge_mask(plane: &[u8], width: usize, height: usize, radius: usize, offset: f32) -> Vec<bool> {
    let mut mask = vec![false; plane.len()];
    let window = ((radius * 2 + 1) * (radius * 2 + 1)) as f32;

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for dy in 0..=(radius * 2) {
                let sy = (y as isize + dy as isize - radius as isize)
                    .clamp(0, height as isize - 1) as usize;
                for dx in 0..=(radius * 2) {
                    let sx = (x as isize + dx as isize - radius as isize)
                        .clamp(0, width as isize - 1) as usize;
                    sum += plane[sy * width + sx] as f32;
                }
            }
            let mean = sum / window;
            mask[y * width + x] = plane[y * width + x] as f32 > mean - offset;
        }
    }
    mask
}

/// Edge-preserving bilateral smoothing: neighbors are averaged with a
/// weight that decays with both spatial distance and color distance.
fn bilateral(img: &RgbImage, params: &CartoonParams) -> RgbImage {
    let w = img.width() as usize;
    let h = img.height() as usize;
    let radius = params.bilateral_radius as isize;
    let spatial_denom = 2.0 * params.spatial_sigma * params.spatial_sigma;
    let range_denom = 2.0 * params.range_sigma * params.range_sigma;

    let mut out = RgbImage::new(img.width(), img.height());

    for y in 0..h {
        for x in 0..w {
            let center = img.get_pixel(x as u32, y as u32).0;
            let mut sum = [0.0f32; 3];
            let mut weight_sum = 0.0f32;

            for dy in -radius..=radius {
                let sy = (y as isize + dy).clamp(0, h as isize - 1) as u32;
                for dx in -radius..=radius {
                    let sx = (x as isize + dx).clamp(0, w as isize - 1) as u32;
                    let neighbor = img.get_pixel(sx, sy).0;

                    let spatial_sq = (dx * dx + dy * dy) as f32;
                    let color_sq: f32 = (0..3)
                        .map(|c| {
                            let d = center[c] as f32 - neighbor[c] as f32;
                            d * d
                        })
                        .sum();

                    let weight =
                        (-spatial_sq / spatial_denom).exp() * (-color_sq / range_denom).exp();
                    for c in 0..3 {
                        sum[c] += neighbor[c] as f32 * weight;
                    }
                    weight_sum += weight;
                }
            }

            let mut pixel = [0u8; 3];
            for c in 0..3 {
                pixel[c] = (sum[c] / weight_sum).round().clamp(0.0, 255.0) as u8;
            }
            out.put_pixel(x as u32, y as u32, Rgb(pixel));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(w: u32, h: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([value, value, value]))
    }

    #[test]
    fn preserves_dimensions() {
        let img = flat(17, 9, 200);
        let out = apply(&img, &CartoonParams::default()).unwrap();
        assert_eq!(out.dimensions(), (17, 9));
    }

    #[test]
    fn rejects_empty_image() {
        let img = RgbImage::new(0, 0);
        assert!(matches!(
            apply(&img, &CartoonParams::default()),
            Err(FilterError::EmptyImage { .. })
        ));
    }

    #[test]
    fn flat_gray_passes_through_with_no_edges() {
        // Uniform luminance equals every local mean, so the whole mask is
        // set and the bilateral output of a flat image is the image itself.
        let img = flat(100, 100, 128);
        let out = apply(&img, &CartoonParams::default()).unwrap();
        assert_eq!(out, img);
        assert!(out.pixels().all(|p| p.0 != [0, 0, 0]));
    }

    #[test]
    fn output_is_masked_subset_of_bilateral() {
        // Every output pixel is either the bilateral-smoothed color or
        // exactly black — nothing in between.
        let mut img = flat(20, 20, 200);
        for y in 0..20 {
            for x in 10..20 {
                img.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let params = CartoonParams::default();
        let smoothed = bilateral(&img, &params);
        let out = apply(&img, &params).unwrap();

        let mut cleared = 0usize;
        for (x, y, p) in out.enumerate_pixels() {
            if p.0 == [0, 0, 0] {
                cleared += 1;
            } else {
                assert_eq!(p, smoothed.get_pixel(x, y), "kept pixel at ({x},{y})");
            }
        }
        assert!(cleared > 0, "a hard vertical edge should clear some pixels");
    }

    #[test]
    fn deterministic_across_runs() {
        let mut img = flat(16, 16, 90);
        img.put_pixel(8, 8, Rgb([250, 10, 60]));
        let a = apply(&img, &CartoonParams::default()).unwrap();
        let b = apply(&img, &CartoonParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn median_blur_removes_salt() {
        let mut plane = vec![100u8; 25];
        plane[12] = 255;
        let out = median_blur(&plane, 5, 5, 1);
        assert_eq!(out[12], 100);
    }

    #[test]
    fn median_blur_zero_radius_is_identity() {
        let plane = vec![1u8, 2, 3, 4, 5, 6];
        assert_eq!(median_blur(&plane, 3, 2, 0), plane);
    }

    #[test]
    fn edge_mask_keeps_flat_regions() {
        let plane = vec![77u8; 81];
        let mask = edge_mask(&plane, 9, 9, 4, 2.0);
        assert!(mask.iter().all(|&m| m));
    }

    #[test]
    fn edge_mask_clears_dark_side_of_step() {
        // Pixels on the dark side of a step sit below the local mean by
        // more than the offset and must be cleared near the boundary.
        let mut plane = vec![200u8; 100];
        for y in 0..10 {
            for x in 5..10 {
                plane[y * 10 + x] = 20;
            }
        }
        let mask = edge_mask(&plane, 10, 10, 4, 2.0);
        assert!(!mask[5 * 10 + 5], "dark pixel at the step should clear");
        assert!(mask[5 * 10 + 0], "bright pixel far from the step should keep");
    }

    #[test]
    fn bilateral_flattens_but_preserves_edges() {
        let mut img = flat(12, 12, 230);
        for y in 0..12 {
            for x in 6..12 {
                img.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        let out = bilateral(&img, &CartoonParams::default());
        // Far from the edge both regions keep their level within a few
        // counts; the step must not be averaged away.
        assert!(out.get_pixel(1, 6).0[0] > 180);
        assert!(out.get_pixel(10, 6).0[0] < 60);
    }
}
