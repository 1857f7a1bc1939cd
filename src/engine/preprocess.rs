//! Image preprocessing for the detection and emotion models

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};
use ndarray::Array4;

use super::detector::FaceBox;

/// SCRFD input size
pub const DETECTOR_INPUT_SIZE: (u32, u32) = (640, 640);

/// FER+ input size
pub const EMOTION_INPUT_SIZE: (u32, u32) = (64, 64);

/// Letterbox to the detector input and convert to a normalised BGR NCHW tensor
pub fn preprocess_for_detection(image: &RgbImage) -> Array4<f32> {
    let (target_w, target_h) = DETECTOR_INPUT_SIZE;
    let padded = resize_with_padding(image, target_w, target_h);
    image_to_nchw_bgr(&padded)
}

/// Resize a face crop to the FER+ input as a single-channel tensor.
///
/// FER+ expects raw `[0, 255]` grey values, no normalisation.
pub fn preprocess_for_emotion(face: &RgbImage) -> Array4<f32> {
    let (target_w, target_h) = EMOTION_INPUT_SIZE;
    let gray: GrayImage = imageops::grayscale(face);
    let resized = imageops::resize(&gray, target_w, target_h, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 1, target_h as usize, target_w as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        tensor[[0, 0, y as usize, x as usize]] = pixel[0] as f32;
    }
    tensor
}

/// Resize keeping aspect ratio, centred on a black canvas
fn resize_with_padding(image: &RgbImage, target_w: u32, target_h: u32) -> RgbImage {
    let info = ResizeInfo::new(image.dimensions(), (target_w, target_h));

    let resized = imageops::resize(image, info.scaled_width, info.scaled_height, FilterType::Triangle);
    let mut padded = RgbImage::from_pixel(target_w, target_h, Rgb([0, 0, 0]));
    imageops::replace(&mut padded, &resized, info.offset_x as i64, info.offset_y as i64);
    padded
}

/// InsightFace models take BGR with `(x - 127.5) / 128`
fn image_to_nchw_bgr(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = (pixel[2] as f32 - 127.5) / 128.0;
        tensor[[0, 1, y, x]] = (pixel[1] as f32 - 127.5) / 128.0;
        tensor[[0, 2, y, x]] = (pixel[0] as f32 - 127.5) / 128.0;
    }

    tensor
}

/// Cut a face out of the source image, widened by `margin` of its size per side
pub fn crop_face(image: &RgbImage, face: &FaceBox, margin: f32) -> Option<RgbImage> {
    let (img_w, img_h) = image.dimensions();

    let margin_x = (face.x2 - face.x1) * margin;
    let margin_y = (face.y2 - face.y1) * margin;

    let x1 = (face.x1 - margin_x).max(0.0) as u32;
    let y1 = (face.y1 - margin_y).max(0.0) as u32;
    let x2 = (face.x2 + margin_x).min(img_w as f32) as u32;
    let y2 = (face.y2 + margin_y).min(img_h as f32) as u32;

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image())
}

/// Mapping between source image and letterboxed detector input
#[derive(Debug, Clone, Copy)]
pub struct ResizeInfo {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl ResizeInfo {
    pub fn new(original: (u32, u32), target: (u32, u32)) -> Self {
        let (orig_w, orig_h) = original;
        let (target_w, target_h) = target;

        let scale = f32::min(
            target_w as f32 / orig_w as f32,
            target_h as f32 / orig_h as f32,
        );

        let new_w = ((orig_w as f32 * scale) as u32).clamp(1, target_w);
        let new_h = ((orig_h as f32 * scale) as u32).clamp(1, target_h);

        Self {
            scale,
            offset_x: (target_w - new_w) / 2,
            offset_y: (target_h - new_h) / 2,
            scaled_width: new_w,
            scaled_height: new_h,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a point in detector input space back to the source image
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let x = (x - self.offset_x as f32) / self.scale;
        let y = (y - self.offset_y as f32) / self.scale;
        (x, y)
    }
}
