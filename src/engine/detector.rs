//! SCRFD Face Detector
//!
//! Runs an InsightFace SCRFD model and returns face boxes in source image
//! coordinates, strongest first.

use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbImage;
use openvino::InferRequest;

use super::pool::{ModelPool, ModelType};
use super::preprocess::{preprocess_for_detection, ResizeInfo, DETECTOR_INPUT_SIZE};
use super::tensor;
use super::BoundingBox;

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn to_bounding_box(&self) -> BoundingBox {
        let x = self.x1.round() as i32;
        let y = self.y1.round() as i32;
        BoundingBox {
            x,
            y,
            width: self.x2.round() as i32 - x,
            height: self.y2.round() as i32 - y,
        }
    }

    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// Output layout of an SCRFD export, derived from its output count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputLayout {
    strides: &'static [i32],
    anchors_per_cell: usize,
}

impl OutputLayout {
    /// Scores, boxes and (optionally) keypoints per stride
    fn from_output_count(count: usize) -> Option<Self> {
        const THREE: &[i32] = &[8, 16, 32];
        const FIVE: &[i32] = &[8, 16, 32, 64, 128];
        match count {
            6 | 9 => Some(Self { strides: THREE, anchors_per_cell: 2 }),
            10 | 15 => Some(Self { strides: FIVE, anchors_per_cell: 1 }),
            _ => None,
        }
    }
}

pub struct FaceDetector {
    pool: Arc<ModelPool>,
    confidence_threshold: f32,
    nms_threshold: f32,
}

impl FaceDetector {
    pub fn new(pool: Arc<ModelPool>, confidence_threshold: f32, nms_threshold: f32) -> Self {
        Self {
            pool,
            confidence_threshold,
            nms_threshold,
        }
    }

    pub fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>> {
        let resize_info = ResizeInfo::new(image.dimensions(), DETECTOR_INPUT_SIZE);
        let input = tensor::input_tensor(&preprocess_for_detection(image))?;

        let model = self.pool.get_model(ModelType::Detector)?;
        let mut request = model.create_infer_request()?;
        request.set_input_tensor(&input)?;
        request.infer().context("face detection inference failed")?;

        let candidates = self.parse_outputs(&mut request, &resize_info)?;
        tracing::debug!("{} candidate faces before NMS", candidates.len());

        let faces = nms(candidates, self.nms_threshold);
        tracing::debug!("Detected {} faces after NMS", faces.len());

        Ok(faces)
    }

    fn parse_outputs(&self, request: &mut InferRequest, resize_info: &ResizeInfo) -> Result<Vec<FaceBox>> {
        let output_count = (0..20)
            .take_while(|&i| request.get_output_tensor_by_index(i).is_ok())
            .count();

        let layout = OutputLayout::from_output_count(output_count)
            .with_context(|| format!("unsupported SCRFD model with {} outputs", output_count))?;
        let levels = layout.strides.len();

        let mut boxes = Vec::new();
        for (idx, &stride) in layout.strides.iter().enumerate() {
            let scores = tensor::read_f32(&request.get_output_tensor_by_index(idx)?)?;
            let distances = tensor::read_f32(&request.get_output_tensor_by_index(idx + levels)?)?;

            decode_level(
                &scores,
                &distances,
                stride,
                layout.anchors_per_cell,
                self.confidence_threshold,
                resize_info,
                &mut boxes,
            );
        }

        Ok(boxes)
    }
}

/// Decode one stride level of SCRFD output into boxes above `threshold`.
///
/// Box predictions are distances (left, top, right, bottom) from the anchor
/// centre, in units of the stride.
fn decode_level(
    scores: &[f32],
    distances: &[f32],
    stride: i32,
    anchors_per_cell: usize,
    threshold: f32,
    resize_info: &ResizeInfo,
    out: &mut Vec<FaceBox>,
) {
    let (input_w, input_h) = (DETECTOR_INPUT_SIZE.0 as i32, DETECTOR_INPUT_SIZE.1 as i32);
    let (feat_w, feat_h) = (input_w / stride, input_h / stride);
    let stride_f = stride as f32;

    let centers = (0..feat_h)
        .flat_map(|y| (0..feat_w).map(move |x| (x as f32 * stride_f, y as f32 * stride_f)))
        .flat_map(|center| std::iter::repeat(center).take(anchors_per_cell));

    let max_w = resize_info.original_width as f32;
    let max_h = resize_info.original_height as f32;

    for (i, (cx, cy)) in centers.enumerate() {
        let Some(&score) = scores.get(i) else { break };
        if score < threshold {
            continue;
        }
        let Some(d) = distances.get(i * 4..i * 4 + 4) else { break };

        let (x1, y1) = resize_info.to_original(cx - d[0] * stride_f, cy - d[1] * stride_f);
        let (x2, y2) = resize_info.to_original(cx + d[2] * stride_f, cy + d[3] * stride_f);

        out.push(FaceBox {
            x1: x1.clamp(0.0, max_w),
            y1: y1.clamp(0.0, max_h),
            x2: x2.clamp(0.0, max_w),
            y2: y2.clamp(0.0, max_h),
            confidence: score,
        });
    }
}

/// Greedy non-maximum suppression, highest confidence first
pub fn nms(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if keep.iter().all(|kept| iou(kept, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

pub fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
