//! SCRFD face detector via ONNX Runtime.
//!
//! Runs the anchor-free SCRFD model on a letterboxed RGB frame and decodes
//! its three stride levels (score/bbox/landmark tensors each) into
//! confidence-sorted faces with five-point landmarks.

use crate::types::Face;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DET_INPUT_SIZE: u32 = 640;
const DET_MEAN: f32 = 127.5;
const DET_STD: f32 = 128.0;
const DET_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DET_NMS_THRESHOLD: f32 = 0.4;
const DET_STRIDES: [usize; 3] = [8, 16, 32];
const DET_ANCHORS_PER_CELL: usize = 2;
/// 3 strides × (score, bbox, landmark) tensors.
const DET_OUTPUT_COUNT: usize = 9;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detection model not found: {0} — place det_10g.onnx in the model directory")]
    ModelNotFound(String),
    #[error("detection inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scale and padding applied by the letterbox resize, kept so decoded
/// coordinates can be mapped back to the original frame.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

#[derive(Debug)]
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the SCRFD model from the given path, failing fast when the
    /// file is missing or has an unexpected output layout.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        if num_outputs != DET_OUTPUT_COUNT {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD export must have {DET_OUTPUT_COUNT} outputs (3 strides × score/bbox/kps), got {num_outputs}"
            )));
        }

        tracing::info!(path = model_path, "loaded SCRFD detection model");
        Ok(Self { session })
    }

    /// Detect faces in an RGB frame, sorted by descending confidence.
    pub fn detect(&mut self, img: &RgbImage) -> Result<Vec<Face>, DetectorError> {
        let (input, letterbox) = preprocess(img);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (stride_pos, &stride) in DET_STRIDES.iter().enumerate() {
            // Standard SCRFD ordering: [0-2] scores, [3-5] bboxes, [6-8] kps.
            let (_, scores) = outputs[stride_pos]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[stride_pos + 3]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[stride_pos + 6]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            decode_stride(scores, bboxes, kps, stride, &letterbox, &mut detections);
        }

        let mut faces = nms(detections, DET_NMS_THRESHOLD);
        faces.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(faces)
    }
}

/// Letterbox-resize an RGB frame into the NCHW input tensor.
///
/// The frame is scaled to fit, centered, and padded; padding normalizes to
/// exactly 0.0, which is the model's mean value.
fn preprocess(img: &RgbImage) -> (Array4<f32>, Letterbox) {
    let (w, h) = img.dimensions();
    let side = DET_INPUT_SIZE as f32;
    let scale = (side / w as f32).min(side / h as f32);

    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);
    let resized = imageops::resize(img, new_w, new_h, FilterType::Triangle);

    let pad_x = (DET_INPUT_SIZE - new_w) / 2;
    let pad_y = (DET_INPUT_SIZE - new_h) / 2;

    let size = DET_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + pad_x) as usize;
        let ty = (y + pad_y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel.0[c] as f32 - DET_MEAN) / DET_STD;
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Decode one stride level's anchors into frame-space faces.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    out: &mut Vec<Face>,
) {
    let grid = DET_INPUT_SIZE as usize / stride;
    let num_anchors = grid * grid * DET_ANCHORS_PER_CELL;

    for idx in 0..num_anchors.min(scores.len()) {
        let score = scores[idx];
        if score <= DET_CONFIDENCE_THRESHOLD {
            continue;
        }

        let cell = idx / DET_ANCHORS_PER_CELL;
        let anchor_cx = ((cell % grid) * stride) as f32;
        let anchor_cy = ((cell / grid) * stride) as f32;

        let bbox_off = idx * 4;
        if bbox_off + 3 >= bboxes.len() {
            continue;
        }
        // Offsets are distances from the anchor center in stride units.
        let x1 = anchor_cx - bboxes[bbox_off] * stride as f32;
        let y1 = anchor_cy - bboxes[bbox_off + 1] * stride as f32;
        let x2 = anchor_cx + bboxes[bbox_off + 2] * stride as f32;
        let y2 = anchor_cy + bboxes[bbox_off + 3] * stride as f32;

        let to_frame = |x: f32, y: f32| {
            (
                (x - letterbox.pad_x) / letterbox.scale,
                (y - letterbox.pad_y) / letterbox.scale,
            )
        };
        let (fx1, fy1) = to_frame(x1, y1);
        let (fx2, fy2) = to_frame(x2, y2);

        let kps_off = idx * 10;
        let landmarks = if kps_off + 9 < kps.len() {
            let mut lms = [(0.0f32, 0.0f32); 5];
            for (i, lm) in lms.iter_mut().enumerate() {
                let lx = anchor_cx + kps[kps_off + i * 2] * stride as f32;
                let ly = anchor_cy + kps[kps_off + i * 2 + 1] * stride as f32;
                *lm = to_frame(lx, ly);
            }
            Some(lms)
        } else {
            None
        };

        out.push(Face {
            x: fx1,
            y: fy1,
            width: fx2 - fx1,
            height: fy2 - fy1,
            confidence: score,
            landmarks,
        });
    }
}

/// Non-maximum suppression: drop detections overlapping a higher-scoring
/// one beyond the IoU threshold.
fn nms(mut detections: Vec<Face>, iou_threshold: f32) -> Vec<Face> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Face> = Vec::new();
    for candidate in detections {
        if keep.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection-over-union of two face boxes.
fn iou(a: &Face, b: &Face) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
