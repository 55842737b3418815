//! Color-grade filter.
//!
//! Per-channel multiplicative balance in normalized [0,1] space, then a
//! saturation/value rescale in HSV. Deterministic and total over
//! well-formed input; every intermediate value is clipped to range.

use crate::buffer;
use crate::FilterError;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeParams {
    /// Multiplicative gain per channel, buffer order (RGB).
    pub gains: [f32; 3],
    /// Saturation multiplier applied in HSV.
    pub saturation: f32,
    /// Value (brightness) multiplier applied in HSV.
    pub value: f32,
}

impl Default for GradeParams {
    fn default() -> Self {
        Self {
            gains: [1.1, 1.05, 0.9],
            saturation: 0.6,
            value: 1.2,
        }
    }
}

/// Apply the color-grade filter. Output dimensions equal input dimensions.
pub fn apply(img: &RgbImage, params: &GradeParams) -> Result<RgbImage, FilterError> {
    buffer::ensure_non_empty(img)?;

    let mut out = RgbImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        out.put_pixel(x, y, Rgb(grade_pixel(pixel.0, params)));
    }
    Ok(out)
}

fn grade_pixel(rgb: [u8; 3], params: &GradeParams) -> [u8; 3] {
    let r = (rgb[0] as f32 / 255.0 * params.gains[0]).clamp(0.0, 1.0);
    let g = (rgb[1] as f32 / 255.0 * params.gains[1]).clamp(0.0, 1.0);
    let b = (rgb[2] as f32 / 255.0 * params.gains[2]).clamp(0.0, 1.0);

    let (h, s, v) = rgb_to_hsv(r, g, b);
    let s = (s * params.saturation).clamp(0.0, 1.0);
    let v = (v * params.value).clamp(0.0, 1.0);
    let (r, g, b) = hsv_to_rgb(h, s, v);

    [
        (r * 255.0).round().clamp(0.0, 255.0) as u8,
        (g * 255.0).round().clamp(0.0, 255.0) as u8,
        (b * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// r, g, b in [0,1] → (h in [0,360), s in [0,1], v in [0,1]).
fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let v = max;
    let s = if max <= 0.0 { 0.0 } else { d / max };

    if d.abs() < 1e-6 {
        return (0.0, s, v);
    }

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / d;
        if g < b {
            h += 6.0;
        }
        h * 60.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / d + 2.0) * 60.0
    } else {
        ((r - g) / d + 4.0) * 60.0
    };

    (h, s, v)
}

/// h in [0,360), s and v in [0,1] → (r, g, b) in [0,1].
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    if s <= 1e-6 {
        return (v, v, v);
    }

    let sector = (h / 60.0).rem_euclid(6.0);
    let i = sector.floor();
    let f = sector - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match i as u32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_dimensions() {
        let img = RgbImage::from_pixel(33, 21, Rgb([40, 90, 200]));
        let out = apply(&img, &GradeParams::default()).unwrap();
        assert_eq!(out.dimensions(), (33, 21));
    }

    #[test]
    fn rejects_empty_image() {
        let img = RgbImage::new(7, 0);
        assert!(matches!(
            apply(&img, &GradeParams::default()),
            Err(FilterError::EmptyImage { .. })
        ));
    }

    #[test]
    fn deterministic_across_runs() {
        let img = RgbImage::from_pixel(10, 10, Rgb([13, 199, 87]));
        let a = apply(&img, &GradeParams::default()).unwrap();
        let b = apply(&img, &GradeParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn flat_gray_gains_order_and_brightness() {
        // Mid-gray in, uniform out: the warm gains must leave r > g > b and
        // the value boost must land the max channel at v*1.2 of the gained
        // value: 128/255 * 1.1 * 1.2 ≈ 0.662 → ~169.
        let img = RgbImage::from_pixel(100, 100, Rgb([128, 128, 128]));
        let out = apply(&img, &GradeParams::default()).unwrap();

        let first = *out.get_pixel(0, 0);
        assert!(out.pixels().all(|p| *p == first), "flat input stays flat");

        let [r, g, b] = first.0;
        assert!(r > g && g > b, "expected r > g > b, got {r} {g} {b}");
        assert!((r as i32 - 169).abs() <= 2, "max channel ≈ 169, got {r}");
    }

    #[test]
    fn black_is_a_fixed_point() {
        let img = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        let once = apply(&img, &GradeParams::default()).unwrap();
        assert_eq!(once, img);
        let twice = apply(&once, &GradeParams::default()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn clamped_extreme_channel_stays_clamped() {
        // Once the dominant channel saturates at 255 (gain and value boost
        // both clip), repeated applications hold it there.
        let img = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let once = apply(&img, &GradeParams::default()).unwrap();
        assert_eq!(once.get_pixel(0, 0).0[0], 255);
        let twice = apply(&once, &GradeParams::default()).unwrap();
        assert_eq!(twice.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn hsv_round_trip() {
        for &(r, g, b) in &[
            (0.0, 0.0, 0.0),
            (1.0, 1.0, 1.0),
            (0.5, 0.25, 0.75),
            (0.9, 0.1, 0.1),
            (0.2, 0.8, 0.3),
        ] {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (r2, g2, b2) = hsv_to_rgb(h, s, v);
            assert!((r - r2).abs() < 1e-4, "r: {r} vs {r2}");
            assert!((g - g2).abs() < 1e-4, "g: {g} vs {g2}");
            assert!((b - b2).abs() < 1e-4, "b: {b} vs {b2}");
        }
    }

    #[test]
    fn desaturation_pulls_channels_together() {
        let img = RgbImage::from_pixel(1, 1, Rgb([200, 40, 40]));
        let out = apply(&img, &GradeParams::default()).unwrap();
        let [r, g, _] = out.get_pixel(0, 0).0;
        let spread_in = 200 - 40;
        let spread_out = r as i32 - g as i32;
        assert!(
            spread_out < spread_in,
            "saturation 0.6 must narrow the channel spread: {spread_in} -> {spread_out}"
        );
    }
}
