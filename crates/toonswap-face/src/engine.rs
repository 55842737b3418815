//! Composition of the face collaborators into a single swap operation.

use crate::detector::{DetectorError, FaceDetector};
use crate::embedder::{EmbedderError, IdentityEmbedder};
use crate::swapper::{FaceSwapper, SwapperError};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
const EMBEDDER_MODEL_FILE: &str = "w600k_r50.onnx";
const SWAPPER_MODEL_FILE: &str = "inswapper_128.onnx";

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder: {0}")]
    Embedder(#[from] EmbedderError),
    #[error("swapper: {0}")]
    Swapper(#[from] SwapperError),
    #[error("no face detected in the source image")]
    NoSourceFace,
    #[error("no face detected in the base image")]
    NoBaseFace,
}

impl SwapError {
    /// True for failures caused by the uploaded images rather than the
    /// service itself; callers surface these as client errors.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SwapError::NoSourceFace
                | SwapError::NoBaseFace
                | SwapError::Embedder(EmbedderError::NoLandmarks)
                | SwapError::Swapper(SwapperError::NoLandmarks)
        )
    }
}

/// The three ONNX collaborators, loaded once and reused per request.
#[derive(Debug)]
pub struct SwapEngine {
    detector: FaceDetector,
    embedder: IdentityEmbedder,
    swapper: FaceSwapper,
}

impl SwapEngine {
    /// Load all three models from the model directory, failing fast when
    /// any is unavailable.
    pub fn load(model_dir: &Path) -> Result<Self, SwapError> {
        let path = |file: &str| model_dir.join(file).to_string_lossy().into_owned();

        let detector = FaceDetector::load(&path(DETECTOR_MODEL_FILE))?;
        let embedder = IdentityEmbedder::load(&path(EMBEDDER_MODEL_FILE))?;
        let swapper = FaceSwapper::load(&path(SWAPPER_MODEL_FILE))?;

        tracing::info!(dir = %model_dir.display(), "swap engine ready");
        Ok(Self {
            detector,
            embedder,
            swapper,
        })
    }

    /// Swap the best face from `source` onto the best face in `base`.
    ///
    /// "Best" is highest detection confidence. The output frame has the
    /// base image's dimensions.
    pub fn swap(&mut self, source: &RgbImage, base: &RgbImage) -> Result<RgbImage, SwapError> {
        let source_faces = self.detector.detect(source)?;
        let source_face = source_faces.first().ok_or(SwapError::NoSourceFace)?;

        let base_faces = self.detector.detect(base)?;
        let base_face = base_faces.first().ok_or(SwapError::NoBaseFace)?;

        tracing::debug!(
            source_confidence = source_face.confidence,
            base_confidence = base_face.confidence,
            "faces selected for swap"
        );

        let identity = self.embedder.extract(source, source_face)?;
        Ok(self.swapper.swap(base, base_face, &identity)?)
    }
}
