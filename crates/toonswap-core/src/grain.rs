//! Grain-texture filter.
//!
//! Multiplies the image by a per-pixel Gaussian luminance noise field and
//! softens the result with a small Gaussian blur, simulating canvas weave.
//! The noise comes from a caller-supplied seeded generator so identical
//! seeds give identical output.

use crate::buffer;
use crate::FilterError;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrainParams {
    /// Blend strength in [0, 1]: 0 leaves the (blurred) image untouched.
    pub intensity: f32,
    /// Mean of the Gaussian noise field.
    pub noise_mean: f32,
    /// Standard deviation of the Gaussian noise field.
    pub noise_std: f32,
    /// Softening blur kernel size (odd).
    pub blur_kernel: u32,
    /// Softening blur sigma.
    pub blur_sigma: f32,
}

impl Default for GrainParams {
    fn default() -> Self {
        Self {
            intensity: 0.15,
            noise_mean: 0.5,
            noise_std: 0.2,
            blur_kernel: 5,
            blur_sigma: 1.0,
        }
    }
}

/// Apply the grain-texture filter. Output dimensions equal input dimensions.
pub fn apply(img: &RgbImage, params: &GrainParams, rng: &mut StdRng) -> Result<RgbImage, FilterError> {
    buffer::ensure_non_empty(img)?;
    if !(0.0..=1.0).contains(&params.intensity) {
        return Err(FilterError::InvalidIntensity(params.intensity));
    }

    let w = img.width() as usize;
    let h = img.height() as usize;

    // Luminance noise, broadcast across channels via a multiplicative blend:
    // out = img * ((1 - intensity) + intensity * noise).
    let mut blended = vec![0.0f32; w * h * 3];
    for (i, pixel) in img.pixels().enumerate() {
        let noise = (params.noise_mean + params.noise_std * next_gaussian(rng)).clamp(0.0, 1.0);
        let factor = (1.0 - params.intensity) + params.intensity * noise;
        for c in 0..3 {
            blended[i * 3 + c] = (pixel.0[c] as f32 / 255.0 * factor).clamp(0.0, 1.0);
        }
    }

    let softened = blur_interleaved(
        &blended,
        w,
        h,
        &gaussian_kernel(params.blur_kernel as usize | 1, params.blur_sigma),
    );

    let mut out = RgbImage::new(img.width(), img.height());
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 3;
            out.put_pixel(
                x as u32,
                y as u32,
                Rgb([
                    (softened[i] * 255.0).round().clamp(0.0, 255.0) as u8,
                    (softened[i + 1] * 255.0).round().clamp(0.0, 255.0) as u8,
                    (softened[i + 2] * 255.0).round().clamp(0.0, 255.0) as u8,
                ]),
            );
        }
    }
    Ok(out)
}

/// Standard Gaussian sample via the Box-Muller transform.
fn next_gaussian(rng: &mut StdRng) -> f32 {
    let u1 = rng.gen::<f32>().max(1e-10);
    let u2 = rng.gen::<f32>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

/// Normalized 1-D Gaussian kernel of the given odd size.
fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let half = (size / 2) as f32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let x = i as f32 - half;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for v in kernel.iter_mut() {
        *v /= sum;
    }
    kernel
}

/// Separable Gaussian blur over an interleaved RGB f32 plane,
/// borders clamped.
fn blur_interleaved(data: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
    let half = kernel.len() / 2;
    let mut temp = vec![0.0f32; data.len()];
    let mut out = vec![0.0f32; data.len()];

    // Horizontal pass
    for y in 0..height {
        for x in 0..width {
            for c in 0..3 {
                let mut sum = 0.0f32;
                for (k, &kv) in kernel.iter().enumerate() {
                    let sx = (x as isize + k as isize - half as isize)
                        .clamp(0, width as isize - 1) as usize;
                    sum += data[(y * width + sx) * 3 + c] * kv;
                }
                temp[(y * width + x) * 3 + c] = sum;
            }
        }
    }

    // Vertical pass
    for y in 0..height {
        for x in 0..width {
            for c in 0..3 {
                let mut sum = 0.0f32;
                for (k, &kv) in kernel.iter().enumerate() {
                    let sy = (y as isize + k as isize - half as isize)
                        .clamp(0, height as isize - 1) as usize;
                    sum += temp[(sy * width + x) * 3 + c] * kv;
                }
                out[(y * width + x) * 3 + c] = sum;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn flat(w: u32, h: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([value, value, value]))
    }

    #[test]
    fn preserves_dimensions() {
        let img = flat(23, 11, 77);
        let mut rng = StdRng::seed_from_u64(7);
        let out = apply(&img, &GrainParams::default(), &mut rng).unwrap();
        assert_eq!(out.dimensions(), (23, 11));
    }

    #[test]
    fn rejects_empty_image() {
        let img = RgbImage::new(0, 3);
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            apply(&img, &GrainParams::default(), &mut rng),
            Err(FilterError::EmptyImage { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_intensity() {
        let img = flat(4, 4, 100);
        let params = GrainParams {
            intensity: 1.5,
            ..GrainParams::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            apply(&img, &params, &mut rng),
            Err(FilterError::InvalidIntensity(_))
        ));
    }

    #[test]
    fn zero_intensity_reduces_to_blurred_original() {
        // With intensity 0 the blend factor is 1 everywhere, so the output
        // is exactly the blurred original no matter what the RNG produces.
        let mut img = flat(16, 16, 50);
        img.put_pixel(8, 8, Rgb([255, 0, 128]));
        let params = GrainParams {
            intensity: 0.0,
            ..GrainParams::default()
        };

        let mut rng_a = StdRng::seed_from_u64(1);
        let mut rng_b = StdRng::seed_from_u64(999);
        let a = apply(&img, &params, &mut rng_a).unwrap();
        let b = apply(&img, &params, &mut rng_b).unwrap();
        assert_eq!(a, b, "intensity 0 must not depend on the noise field");

        let w = img.width() as usize;
        let h = img.height() as usize;
        let plane: Vec<f32> = img.pixels().flat_map(|p| p.0).map(|v| v as f32 / 255.0).collect();
        let expected = blur_interleaved(&plane, w, h, &gaussian_kernel(5, 1.0));
        for (i, pixel) in a.pixels().enumerate() {
            for c in 0..3 {
                let e = (expected[i * 3 + c] * 255.0).round() as u8;
                assert_eq!(pixel.0[c], e, "pixel {i} channel {c}");
            }
        }
    }

    #[test]
    fn same_seed_same_output() {
        let img = flat(20, 20, 128);
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = apply(&img, &GrainParams::default(), &mut rng_a).unwrap();
        let b = apply(&img, &GrainParams::default(), &mut rng_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let img = flat(20, 20, 128);
        let mut rng_a = StdRng::seed_from_u64(1);
        let mut rng_b = StdRng::seed_from_u64(2);
        let a = apply(&img, &GrainParams::default(), &mut rng_a).unwrap();
        let b = apply(&img, &GrainParams::default(), &mut rng_b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn flat_gray_deviation_stays_bounded() {
        // Per-pixel deviation from the input stays within
        // intensity * 3 * noise_std * 255 after the softening blur.
        let img = flat(100, 100, 128);
        let params = GrainParams::default();
        let mut rng = StdRng::seed_from_u64(1234);
        let out = apply(&img, &params, &mut rng).unwrap();

        let bound = (params.intensity * 3.0 * params.noise_std * 255.0).ceil() as i32;
        for pixel in out.pixels() {
            for c in 0..3 {
                let dev = (pixel.0[c] as i32 - 128).abs();
                assert!(dev <= bound, "deviation {dev} exceeds bound {bound}");
            }
        }
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(5, 1.0);
        assert_eq!(k.len(), 5);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((k[0] - k[4]).abs() < 1e-6);
        assert!((k[1] - k[3]).abs() < 1e-6);
        assert!(k[2] > k[1]);
    }

    #[test]
    fn box_muller_sample_statistics() {
        let mut rng = StdRng::seed_from_u64(5);
        let n = 20_000;
        let samples: Vec<f32> = (0..n).map(|_| next_gaussian(&mut rng)).collect();
        let mean = samples.iter().sum::<f32>() / n as f32;
        let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f32>() / n as f32;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.1, "variance {var}");
    }

    #[test]
    fn blur_of_flat_plane_is_identity() {
        let plane = vec![0.5f32; 10 * 10 * 3];
        let out = blur_interleaved(&plane, 10, 10, &gaussian_kernel(5, 1.0));
        assert!(out.iter().all(|&v| (v - 0.5).abs() < 1e-5));
    }
}
