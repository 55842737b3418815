//! Landmark alignment: similarity-transform estimation and RGB warps.
//!
//! Both the identity embedder (112×112) and the swap model (128×128) want
//! the face warped to the canonical five-point template; the swap
//! additionally needs the transform kept around so the swapped crop can be
//! warped back into the frame.

use image::{Rgb, RgbImage};

/// Canonical five-point template for a 112×112 aligned crop.
const TEMPLATE_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// The five-point template scaled to a square crop of the given size.
pub fn template_for(size: u32) -> [(f32, f32); 5] {
    let scale = size as f32 / 112.0;
    TEMPLATE_112.map(|(x, y)| (x * scale, y * scale))
}

/// Estimate a 2×3 similarity transform (scale, rotation, translation) from
/// `src` points to `dst` points by least squares.
///
/// Returns `[a, -b, tx, b, a, ty]`, i.e. `x' = a·x - b·y + tx`,
/// `y' = b·x + a·y + ty`.
pub fn estimate_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Normal equations for the overdetermined system: each point pair
    // contributes rows [sx, -sy, 1, 0] -> dx and [sy, sx, 0, 1] -> dy
    // in the unknowns [a, b, tx, ty].
    let mut ata = [0.0f32; 16];
    let mut atb = [0.0f32; 4];

    for i in 0..5 {
        let (sx, sy) = src[i];
        let (dx, dy) = dst[i];
        let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
        for (row, rhs) in rows {
            for j in 0..4 {
                for k in 0..4 {
                    ata[j * 4 + k] += row[j] * row[k];
                }
                atb[j] += row[j] * rhs;
            }
        }
    }

    let [a, b, tx, ty] = solve_4x4(&ata, &atb);
    [a, -b, tx, b, a, ty]
}

/// Gaussian elimination with partial pivoting for the 4×4 normal system.
fn solve_4x4(ata: &[f32; 16], atb: &[f32; 4]) -> [f32; 4] {
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        for j in 0..4 {
            m[i][j] = ata[i * 4 + j];
        }
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let mut pivot_row = col;
        for row in (col + 1)..4 {
            if m[row][col].abs() > m[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            // Degenerate landmark geometry; identity keeps the caller sane.
            return [1.0, 0.0, 0.0, 0.0];
        }
        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }
    x
}

/// Apply a 2×3 transform to a point.
pub fn transform_point(m: &[f32; 6], x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[1] * y + m[2], m[3] * x + m[4] * y + m[5])
}

/// Invert a similarity transform. `None` when the transform is degenerate.
pub fn invert_similarity(m: &[f32; 6]) -> Option<[f32; 6]> {
    let (a, b) = (m[0], m[3]);
    let (tx, ty) = (m[2], m[5]);
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return None;
    }
    let ia = a / det;
    let ib = b / det;
    Some([
        ia,
        ib,
        -(ia * tx + ib * ty),
        -ib,
        ia,
        ib * tx - ia * ty,
    ])
}

/// Bilinear sample; coordinates outside the image read as black.
pub fn sample_bilinear(img: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let w = img.width() as i32;
    let h = img.height() as i32;

    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let at = |px: i32, py: i32| -> [f32; 3] {
        if px >= 0 && px < w && py >= 0 && py < h {
            let p = img.get_pixel(px as u32, py as u32).0;
            [p[0] as f32, p[1] as f32, p[2] as f32]
        } else {
            [0.0; 3]
        }
    };

    let (tl, tr, bl, br) = (at(x0, y0), at(x0 + 1, y0), at(x0, y0 + 1), at(x0 + 1, y0 + 1));
    let mut out = [0.0f32; 3];
    for c in 0..3 {
        out[c] = tl[c] * (1.0 - fx) * (1.0 - fy)
            + tr[c] * fx * (1.0 - fy)
            + bl[c] * (1.0 - fx) * fy
            + br[c] * fx * fy;
    }
    out
}

/// Warp `img` through `m` into an output of the given size, filling each
/// output pixel by inverse-mapping back into the source. Out-of-bounds
/// samples are black.
pub fn warp_into(img: &RgbImage, m: &[f32; 6], out_w: u32, out_h: u32) -> RgbImage {
    let mut out = RgbImage::new(out_w, out_h);
    let Some(inv) = invert_similarity(m) else {
        return out;
    };

    for oy in 0..out_h {
        for ox in 0..out_w {
            let (sx, sy) = transform_point(&inv, ox as f32, oy as f32);
            let sample = sample_bilinear(img, sx, sy);
            out.put_pixel(
                ox,
                oy,
                Rgb([
                    sample[0].round().clamp(0.0, 255.0) as u8,
                    sample[1].round().clamp(0.0, 255.0) as u8,
                    sample[2].round().clamp(0.0, 255.0) as u8,
                ]),
            );
        }
    }
    out
}

/// Align a face to the canonical template at the given crop size.
pub fn align_crop(img: &RgbImage, landmarks: &[(f32, f32); 5], size: u32) -> RgbImage {
    let m = estimate_similarity(landmarks, &template_for(size));
    warp_into(img, &m, size, size)
}
