//! Service layer types

use serde::Serialize;

use crate::engine::{BoundingBox, EmotionScores};

/// Per-face prediction as returned to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceResult {
    pub dominant_emotion: String,
    pub confidence: f32,
    pub emotions: EmotionScores,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

/// Response body of a successful prediction
#[derive(Debug, Clone, Serialize)]
pub struct EmotionResponse {
    pub faces: Vec<FaceResult>,
    /// ISO-8601 time the response was built
    pub timestamp: String,
    /// Seconds from request start to assembly
    pub processing_time: f64,
}

/// Health check result
#[derive(Debug, Clone, Serialize)]
pub struct HealthResult {
    pub healthy: bool,
    pub version: String,
    pub models_loaded: std::collections::HashMap<String, bool>,
}
