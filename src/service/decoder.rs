//! Base64 payload → validated colour pixel buffer

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageError, RgbImage};

use crate::error::{PredictError, PredictResult};

/// Smallest accepted width and height, in pixels
pub const MIN_IMAGE_DIMENSION: u32 = 64;

/// Decode a base64 image payload into an RGB buffer.
///
/// A `data:<mime>;base64,` prefix and embedded whitespace are tolerated. The
/// returned buffer is the decoded image with EXIF orientation applied; it is
/// not resized or normalised.
pub fn decode_base64_image(payload: &str) -> PredictResult<RgbImage> {
    if payload.is_empty() {
        return Err(PredictError::EmptyImage);
    }

    let bytes = decode_base64(payload)?;
    let image = decode_image_bytes(&bytes)?;

    let (width, height) = image.dimensions();
    if width < MIN_IMAGE_DIMENSION || height < MIN_IMAGE_DIMENSION {
        return Err(PredictError::ResolutionTooLow { width, height });
    }

    Ok(image)
}

fn strip_data_url(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((header, body)) if header.starts_with("data:") && header.ends_with(";base64") => body,
        _ => payload,
    }
}

fn decode_base64(payload: &str) -> PredictResult<Vec<u8>> {
    let cleaned: String = strip_data_url(payload)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD.decode(cleaned).map_err(PredictError::invalid_data)?;
    if bytes.is_empty() {
        return Err(PredictError::invalid_data("payload decodes to zero bytes"));
    }
    Ok(bytes)
}

/// Decode raw image bytes as a 3-channel colour image.
///
/// Bytes in no recognisable image format are `InvalidFormat`; a recognised
/// format that fails to decode is `InvalidData`.
pub fn decode_image_bytes(data: &[u8]) -> PredictResult<RgbImage> {
    let format = image::guess_format(data).map_err(|_| PredictError::InvalidFormat)?;

    let image = image::load_from_memory_with_format(data, format).map_err(|e| match e {
        ImageError::Unsupported(_) => PredictError::InvalidFormat,
        other => PredictError::invalid_data(other),
    })?;

    Ok(apply_exif_orientation(data, image).to_rgb8())
}

/// Rotate/flip according to the EXIF orientation tag, if present.
///
/// Cameras often record orientation as metadata instead of rotating pixels.
fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    let orientation = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()
        .and_then(|exif_data| {
            exif_data
                .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1);

    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([10, 120, 200]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn png_base64(width: u32, height: u32) -> String {
        STANDARD.encode(png_bytes(width, height))
    }

    /// JPEG carrying an EXIF APP1 segment with the given orientation tag
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 60, 30]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, ImageFormat::Jpeg)
            .unwrap();
        let jpeg = buffer.into_inner();

        // Big-endian TIFF header, one IFD entry: Orientation (0x0112), SHORT, count 1
        let mut tiff = b"MM\x00\x2a\x00\x00\x00\x08\x00\x01".to_vec();
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        tiff.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut app1 = b"Exif\x00\x00".to_vec();
        app1.extend_from_slice(&tiff);
        let length = (app1.len() + 2) as u16;

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(decode_base64_image(""), Err(PredictError::EmptyImage)));
    }

    #[test]
    fn test_not_base64() {
        let err = decode_base64_image("this is not base64!").unwrap_err();
        assert!(matches!(err, PredictError::InvalidData { .. }));
        assert_eq!(err.to_string(), "Invalid image data");
    }

    #[test]
    fn test_base64_of_non_image() {
        let payload = STANDARD.encode(b"plain text, definitely not pixels");
        assert!(matches!(decode_base64_image(&payload), Err(PredictError::InvalidFormat)));
    }

    #[test]
    fn test_truncated_png_is_invalid_data() {
        let bytes = png_bytes(100, 100);
        let payload = STANDARD.encode(&bytes[..bytes.len() / 2]);
        assert!(matches!(
            decode_base64_image(&payload),
            Err(PredictError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_resolution_too_low() {
        let err = decode_base64_image(&png_base64(63, 200)).unwrap_err();
        assert!(matches!(err, PredictError::ResolutionTooLow { width: 63, height: 200 }));

        let err = decode_base64_image(&png_base64(200, 10)).unwrap_err();
        assert_eq!(err.to_string(), "Image resolution too low");
    }

    #[test]
    fn test_minimum_size_is_accepted_unchanged() {
        let image = decode_base64_image(&png_base64(64, 64)).unwrap();
        assert_eq!(image.dimensions(), (64, 64));
        assert_eq!(image.get_pixel(0, 0), &Rgb([10, 120, 200]));
    }

    #[test]
    fn test_data_url_and_whitespace_tolerated() {
        let encoded = png_base64(80, 72);
        let (head, tail) = encoded.split_at(encoded.len() / 2);
        let payload = format!("data:image/png;base64,{head}\n{tail}");

        let image = decode_base64_image(&payload).unwrap();
        assert_eq!(image.dimensions(), (80, 72));
    }

    #[test]
    fn test_whitespace_only_payload_is_invalid_data() {
        let err = decode_base64_image("   \n ").unwrap_err();
        assert!(matches!(err, PredictError::InvalidData { .. }));
        assert_eq!(err.to_string(), "Invalid image data");

        assert!(matches!(
            decode_base64_image("data:image/png;base64,"),
            Err(PredictError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_exif_orientation_is_applied() {
        let payload = STANDARD.encode(jpeg_with_orientation(120, 80, 6));
        let image = decode_base64_image(&payload).unwrap();
        assert_eq!(image.dimensions(), (80, 120));

        let payload = STANDARD.encode(jpeg_with_orientation(120, 80, 1));
        assert_eq!(decode_base64_image(&payload).unwrap().dimensions(), (120, 80));
    }

    #[test]
    fn test_size_check_uses_oriented_dimensions() {
        let payload = STANDARD.encode(jpeg_with_orientation(120, 60, 6));
        let err = decode_base64_image(&payload).unwrap_err();
        assert!(matches!(err, PredictError::ResolutionTooLow { width: 60, height: 120 }));
    }

    #[test]
    fn test_grayscale_input_becomes_three_channel() {
        let gray = image::GrayImage::from_pixel(70, 70, image::Luma([90]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();

        let image = decode_base64_image(&STANDARD.encode(buffer.into_inner())).unwrap();
        assert_eq!(image.get_pixel(5, 5), &Rgb([90, 90, 90]));
    }
}
