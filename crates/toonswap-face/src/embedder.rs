//! ArcFace identity embedder via ONNX Runtime.
//!
//! Warps a detected face to the canonical 112×112 crop and extracts the
//! 512-dimensional identity embedding the swap model consumes.

use crate::alignment;
use crate::types::{Face, Identity};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const EMBED_INPUT_SIZE: u32 = 112;
const EMBED_MEAN: f32 = 127.5;
const EMBED_STD: f32 = 127.5;
const EMBED_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("identity model not found: {0} — place w600k_r50.onnx in the model directory")]
    ModelNotFound(String),
    #[error("identity inference failed: {0}")]
    InferenceFailed(String),
    #[error("face has no landmarks — the detector must supply them for alignment")]
    NoLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

#[derive(Debug)]
pub struct IdentityEmbedder {
    session: Session,
}

impl IdentityEmbedder {
    /// Load the ArcFace model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded ArcFace identity model");
        Ok(Self { session })
    }

    /// Extract the identity embedding for a detected face.
    pub fn extract(&mut self, img: &RgbImage, face: &Face) -> Result<Identity, EmbedderError> {
        let landmarks = face.landmarks.as_ref().ok_or(EmbedderError::NoLandmarks)?;

        let crop = alignment::align_crop(img, landmarks, EMBED_INPUT_SIZE);
        let input = preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBED_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected a {EMBED_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Identity::from_raw(raw.to_vec()))
    }
}

/// Aligned 112×112 RGB crop → normalized NCHW tensor.
fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let size = EMBED_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in crop.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 - EMBED_MEAN) / EMBED_STD;
        }
    }
    tensor
}
