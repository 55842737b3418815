use serde::{Deserialize, Serialize};

/// A detected face: bounding box, confidence, and five-point landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// L2-normalized identity embedding (512-dimensional for ArcFace), the
/// swap model's description of "whose face goes in".
#[derive(Debug, Clone)]
pub struct Identity {
    pub values: Vec<f32>,
}

impl Identity {
    /// Build an identity from a raw embedding, L2-normalizing it.
    pub fn from_raw(raw: Vec<f32>) -> Self {
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_normalizes_to_unit_length() {
        let id = Identity::from_raw(vec![3.0, 4.0]);
        let norm: f32 = id.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn from_raw_leaves_zero_vector_alone() {
        let id = Identity::from_raw(vec![0.0, 0.0, 0.0]);
        assert!(id.values.iter().all(|&v| v == 0.0));
    }
}
