//! toonswap-face — Face detection, identity embedding, and face swap.
//!
//! All three collaborators are thin drivers around packaged ONNX models
//! (SCRFD for detection, ArcFace for identity, an inswapper-style model
//! for the swap itself) running via ONNX Runtime for CPU inference. The
//! models are loaded once at startup and passed by reference into request
//! handling; nothing here is a process-wide singleton.

use std::path::PathBuf;

pub mod alignment;
pub mod detector;
pub mod embedder;
pub mod engine;
pub mod swapper;
pub mod types;

pub use detector::FaceDetector;
pub use embedder::IdentityEmbedder;
pub use engine::{SwapEngine, SwapError};
pub use swapper::FaceSwapper;
pub use types::{Face, Identity};

/// Default model directory: `$XDG_DATA_HOME/toonswap/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("toonswap")
        .join("models")
}
