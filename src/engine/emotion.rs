//! FER+ Emotion Classifier

use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbImage;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::pool::{ModelPool, ModelType};
use super::preprocess::preprocess_for_emotion;
use super::tensor;

/// FER+ emotion classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Neutral,
    Happy,
    Surprise,
    Sad,
    Angry,
    Disgust,
    Fear,
    Contempt,
}

impl Emotion {
    /// Model output order. This is also the iteration order of every
    /// [`EmotionScores`] the classifier produces.
    pub const ALL: [Emotion; 8] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Surprise,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Contempt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Surprise => "surprise",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Contempt => "contempt",
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

/// Ordered emotion → confidence mapping.
///
/// Insertion order is preserved and is the order used both for JSON output
/// and for picking the first of several equal maxima.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionScores(Vec<(Emotion, f32)>);

impl EmotionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a score, keeping the original position if the emotion is present
    pub fn insert(&mut self, emotion: Emotion, score: f32) {
        match self.0.iter_mut().find(|(e, _)| *e == emotion) {
            Some(entry) => entry.1 = score,
            None => self.0.push((emotion, score)),
        }
    }

    pub fn get(&self, emotion: Emotion) -> Option<f32> {
        self.0.iter().find(|(e, _)| *e == emotion).map(|&(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Emotion, f32)> for EmotionScores {
    fn from_iter<I: IntoIterator<Item = (Emotion, f32)>>(iter: I) -> Self {
        let mut scores = Self::new();
        for (emotion, score) in iter {
            scores.insert(emotion, score);
        }
        scores
    }
}

impl Serialize for EmotionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (emotion, score) in &self.0 {
            map.serialize_entry(emotion.as_str(), score)?;
        }
        map.end()
    }
}

pub struct EmotionClassifier {
    pool: Arc<ModelPool>,
}

impl EmotionClassifier {
    pub fn new(pool: Arc<ModelPool>) -> Self {
        Self { pool }
    }

    /// Score every emotion for a cropped face
    pub fn classify(&self, face: &RgbImage) -> Result<EmotionScores> {
        let input = tensor::input_tensor(&preprocess_for_emotion(face))?;

        let model = self.pool.get_model(ModelType::Emotion)?;
        let mut request = model.create_infer_request()?;
        request.set_input_tensor(&input)?;
        request.infer().context("emotion inference failed")?;

        let logits = tensor::read_f32(&request.get_output_tensor()?)?;
        tracing::debug!("Emotion model raw output: {:?}", logits);

        scores_from_logits(&logits)
    }
}

/// Softmax FER+ logits into per-emotion scores rounded to two decimals
pub fn scores_from_logits(logits: &[f32]) -> Result<EmotionScores> {
    anyhow::ensure!(
        logits.len() == Emotion::ALL.len(),
        "emotion model returned {} classes, expected {}",
        logits.len(),
        Emotion::ALL.len()
    );

    let probs = softmax(logits);
    Ok(Emotion::ALL
        .iter()
        .zip(probs)
        .map(|(&emotion, p)| (emotion, round_score(p)))
        .collect())
}

fn softmax(x: &[f32]) -> Vec<f32> {
    let max_val = x.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_vals: Vec<f32> = x.iter().map(|v| (v - max_val).exp()).collect();
    let sum: f32 = exp_vals.iter().sum();
    exp_vals.iter().map(|v| v / sum).collect()
}

fn round_score(score: f32) -> f32 {
    (score * 100.0).round() / 100.0
}
