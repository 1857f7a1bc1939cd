//! Emotion Service - request orchestration
//!
//! Validates and decodes the payload, runs the detector off the async
//! runtime, then assembles the response. Every outcome is logged here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::{error, info, warn};

use crate::engine::{DetectedFace, EmotionDetector};
use crate::error::{PredictError, PredictResult};

use super::assembler::assemble;
use super::decoder::decode_base64_image;
use super::types::{EmotionResponse, HealthResult};

pub struct EmotionService<D: EmotionDetector> {
    detector: Arc<D>,
}

impl<D: EmotionDetector + 'static> EmotionService<D> {
    pub fn new(detector: Arc<D>) -> Self {
        Self { detector }
    }

    /// Predict emotions for every face in a base64-encoded image
    pub async fn predict(&self, image: String) -> PredictResult<EmotionResponse> {
        let result = self.run(image).await;

        match &result {
            Ok(response) if response.faces.is_empty() => warn!("No faces detected in the image"),
            Ok(response) => info!(
                "Successfully processed image with {} faces detected",
                response.faces.len()
            ),
            Err(e) if !e.is_invalid_input() => error!("Prediction error: {}", e),
            Err(_) => {}
        }

        result
    }

    async fn run(&self, image: String) -> PredictResult<EmotionResponse> {
        let start = Instant::now();

        if image.is_empty() {
            error!("Empty image received");
            return Err(PredictError::EmptyImage);
        }

        // Decoding and inference are CPU-bound
        let detector = self.detector.clone();
        let faces = tokio::task::spawn_blocking(move || decode_and_detect(detector.as_ref(), &image))
            .await
            .context("inference task did not complete")??;

        assemble(faces, start)
    }

    pub fn health(&self) -> HealthResult {
        let models_loaded: HashMap<String, bool> = self
            .detector
            .model_status()
            .into_iter()
            .map(|(name, loaded)| (name.to_string(), loaded))
            .collect();

        HealthResult {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            models_loaded,
        }
    }
}

fn decode_and_detect<D: EmotionDetector>(detector: &D, payload: &str) -> PredictResult<Vec<DetectedFace>> {
    let image = decode_base64_image(payload).inspect_err(|e| match e {
        PredictError::ResolutionTooLow { width, height } => {
            warn!("Image resolution too low: {}x{}", width, height)
        }
        PredictError::InvalidData { cause } => error!("Image decoding error: {}", cause),
        other => error!("Image decoding error: {}", other),
    })?;

    let faces = detector
        .detect_emotions(&image)
        .context("emotion detection failed")?;
    Ok(faces)
}
