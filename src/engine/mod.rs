//! Detection collaborator
//!
//! Locates faces and scores their emotions with OpenVINO:
//! - Shared model pool with lazy loading and idle unloading
//! - SCRFD face detection
//! - FER+ emotion classification

pub mod pool;
pub mod detector;
pub mod emotion;
pub mod preprocess;
pub mod pipeline;
mod tensor;

use image::RgbImage;
use serde::ser::{Serialize, SerializeTuple, Serializer};

pub use pool::ModelPool;
pub use detector::FaceDetector;
pub use emotion::{Emotion, EmotionClassifier, EmotionScores};
pub use pipeline::OpenVinoEmotionDetector;

/// Face rectangle in source pixel coordinates, serialized as `[x, y, w, h]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.x)?;
        tuple.serialize_element(&self.y)?;
        tuple.serialize_element(&self.width)?;
        tuple.serialize_element(&self.height)?;
        tuple.end()
    }
}

/// One face as reported by a detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub emotions: EmotionScores,
}

/// Face detection and emotion classification over a decoded colour image.
///
/// Implementations are shared between concurrent requests, so any per-call
/// state must live inside `detect_emotions`.
pub trait EmotionDetector: Send + Sync {
    fn detect_emotions(&self, image: &RgbImage) -> anyhow::Result<Vec<DetectedFace>>;

    /// Load state of the backing models, for health reporting
    fn model_status(&self) -> Vec<(&'static str, bool)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_serializes_as_array() {
        let bbox = BoundingBox { x: 12, y: 30, width: 96, height: 101 };
        assert_eq!(serde_json::to_string(&bbox).unwrap(), "[12,30,96,101]");
    }
}
