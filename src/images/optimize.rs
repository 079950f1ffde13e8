//! Thumbnail optimization: flatten, resize, re-encode.
//!
//! The winning image is decoded, any transparency is flattened onto a white
//! background (JPEG has no alpha channel), the result is bounded into the
//! configured box preserving aspect ratio, and re-encoded as a quality-85
//! JPEG. The JPEG can then be inlined as a base64 data URL or uploaded to
//! Drive.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::io::Cursor;

use crate::error::HarvestError;

/// JPEG re-encode quality.
pub const JPEG_QUALITY: u8 = 85;

/// Decode, flatten, resize into `max_size` preserving aspect ratio, and
/// re-encode as JPEG.
///
/// # Errors
///
/// Returns [`HarvestError::ImageFailed`] when the payload does not decode.
/// Callers degrade to the raw image URL.
pub fn optimize(bytes: &[u8], max_size: (u32, u32)) -> Result<Vec<u8>, HarvestError> {
    let decoded = image::load_from_memory(bytes)?;
    let flattened = flatten_onto_white(decoded);

    let (max_w, max_h) = max_size;
    let resized = if flattened.width() > max_w || flattened.height() > max_h {
        image::imageops::resize(
            &flattened,
            // resize() scales to exact dimensions; compute the bounded box first
            bounded_width(flattened.width(), flattened.height(), max_w, max_h),
            bounded_height(flattened.width(), flattened.height(), max_w, max_h),
            FilterType::Lanczos3,
        )
    } else {
        flattened
    };

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    resized.write_with_encoder(encoder)?;
    Ok(buf.into_inner())
}

/// Wrap a JPEG payload as an inline data URL.
pub fn to_data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg))
}

/// Blend any alpha channel onto a white background, yielding opaque RGB.
fn flatten_onto_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut flat = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        let blend = |channel: u8| -> u8 {
            ((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        flat.put_pixel(x, y, image::Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flat
}

fn bounded_width(w: u32, h: u32, max_w: u32, max_h: u32) -> u32 {
    let ratio = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
    ((w as f64 * ratio).round() as u32).max(1)
}

fn bounded_height(w: u32, h: u32, max_w: u32, max_h: u32) -> u32 {
    let ratio = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
    ((h as f64 * ratio).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn png_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 50, 50, alpha]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_optimize_bounds_into_box_preserving_aspect() {
        let jpeg = optimize(&png_bytes(800, 600, 255), (400, 300)).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(out.dimensions(), (400, 300));

        let jpeg = optimize(&png_bytes(1000, 200, 255), (400, 300)).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(out.dimensions(), (400, 80));
    }

    #[test]
    fn test_optimize_keeps_small_images_unscaled() {
        let jpeg = optimize(&png_bytes(250, 180, 255), (400, 300)).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(out.dimensions(), (250, 180));
    }

    #[test]
    fn test_optimize_emits_jpeg() {
        let jpeg = optimize(&png_bytes(300, 200, 255), (400, 300)).unwrap();
        // JPEG SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_transparency_is_flattened_onto_white() {
        // fully transparent pixels must come out white, not black
        let jpeg = optimize(&png_bytes(64, 64, 0), (400, 300)).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        let pixel = out.get_pixel(32, 32);
        assert!(pixel[0] > 240 && pixel[1] > 240 && pixel[2] > 240);
    }

    #[test]
    fn test_garbage_payload_is_an_error() {
        assert!(optimize(b"<html>not an image</html>", (400, 300)).is_err());
    }

    #[test]
    fn test_data_url_prefix() {
        let url = to_data_url(&[0xFF, 0xD8, 0xFF]);
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }
}
