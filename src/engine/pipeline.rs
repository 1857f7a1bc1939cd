//! OpenVINO-backed [`EmotionDetector`]: SCRFD boxes, then FER+ per face.

use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::config::DetectionConfig;

use super::detector::FaceDetector;
use super::emotion::EmotionClassifier;
use super::pool::ModelPool;
use super::preprocess::crop_face;
use super::{DetectedFace, EmotionDetector};

pub struct OpenVinoEmotionDetector {
    pool: Arc<ModelPool>,
    detector: FaceDetector,
    classifier: EmotionClassifier,
    face_margin: f32,
}

impl OpenVinoEmotionDetector {
    pub fn new(pool: Arc<ModelPool>, config: &DetectionConfig) -> Self {
        Self {
            detector: FaceDetector::new(pool.clone(), config.confidence_threshold, config.nms_threshold),
            classifier: EmotionClassifier::new(pool.clone()),
            face_margin: config.face_margin,
            pool,
        }
    }
}

impl EmotionDetector for OpenVinoEmotionDetector {
    fn detect_emotions(&self, image: &RgbImage) -> Result<Vec<DetectedFace>> {
        let boxes = self.detector.detect(image)?;

        let mut faces = Vec::with_capacity(boxes.len());
        for face_box in boxes {
            // Boxes clamped to the border can collapse to nothing
            let Some(crop) = crop_face(image, &face_box, self.face_margin) else {
                tracing::debug!("Skipping degenerate face box {:?}", face_box);
                continue;
            };

            let emotions = self
                .classifier
                .classify(&crop)
                .with_context(|| format!("failed to classify face at {:?}", face_box.to_bounding_box()))?;

            faces.push(DetectedFace {
                bbox: face_box.to_bounding_box(),
                emotions,
            });
        }

        Ok(faces)
    }

    fn model_status(&self) -> Vec<(&'static str, bool)> {
        self.pool
            .get_status()
            .into_iter()
            .map(|(model, loaded)| (model.as_str(), loaded))
            .collect()
    }
}
