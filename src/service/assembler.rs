//! Detector output → response body

use std::time::Instant;

use anyhow::anyhow;
use chrono::{Local, SecondsFormat};

use crate::engine::{DetectedFace, Emotion, EmotionScores};
use crate::error::PredictResult;

use super::types::{EmotionResponse, FaceResult};

/// Highest-scoring emotion; on a tie the earliest entry in mapping order wins
pub fn dominant_emotion(scores: &EmotionScores) -> Option<(Emotion, f32)> {
    scores.iter().fold(None, |best, (emotion, score)| match best {
        Some((_, best_score)) if score <= best_score => best,
        _ => Some((emotion, score)),
    })
}

impl FaceResult {
    pub fn from_detection(face: DetectedFace) -> PredictResult<Self> {
        let (dominant, confidence) = dominant_emotion(&face.emotions)
            .ok_or_else(|| anyhow!("detector returned a face without emotion scores"))?;

        Ok(Self {
            dominant_emotion: dominant.as_str().to_string(),
            confidence,
            emotions: face.emotions,
            bbox: face.bbox,
        })
    }
}

/// Build the response for one request that started at `started`
pub fn assemble(faces: Vec<DetectedFace>, started: Instant) -> PredictResult<EmotionResponse> {
    let faces = faces
        .into_iter()
        .map(FaceResult::from_detection)
        .collect::<PredictResult<Vec<_>>>()?;

    let processing_time = started.elapsed().as_secs_f64();

    Ok(EmotionResponse {
        faces,
        timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        processing_time,
    })
}
