// src/optimizer/pipeline.rs
// =============================================================================
// The normalize -> orient -> resize -> re-encode pipeline.
//
// Whatever goes in (PNG with transparency, WebP, a phone JPEG lying on its
// side), what comes out is always a plain 3-channel JPEG:
//
// 1. decode the bytes (unknown formats fail with LinkerError::Decode)
// 2. turn the EXIF orientation tag into real pixel rotation/flips
// 3. paint transparent pixels onto a white background
// 4. shrink so the longest side is at most `max_dimension` (never enlarge)
// 5. encode as JPEG at the requested quality, with optimized Huffman tables
// =============================================================================

use std::io::Cursor;

use image::imageops::FilterType;
use jpeg_encoder::{ColorType, Encoder};
use image::{DynamicImage, ImageDecoder, ImageReader, Rgb, RgbImage};

use crate::config::ImageBounds;
use crate::error::{LinkerError, Result};

/// Format name of every pipeline output.
pub const OUTPUT_FORMAT: &str = "jpeg";

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    /// Always "jpeg"
    pub format: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Re-encodes `bytes` as a bounded, opaque JPEG.
pub fn optimize(bytes: &[u8], bounds: ImageBounds) -> Result<OptimizedImage> {
    let image = decode_oriented(bytes)?;
    let flat = flatten_onto_white(image);
    let resized = shrink_to_fit(flat, bounds.max_dimension);

    let (width, height) = resized.dimensions();
    let bytes = encode_jpeg(&resized, bounds.quality, true)?;

    tracing::debug!(width, height, size = bytes.len(), "image optimized");

    Ok(OptimizedImage {
        bytes,
        format: OUTPUT_FORMAT,
        width,
        height,
    })
}

/// Same pipeline, meant for small secondary images.
///
/// Callers normally pass `ImageBounds::THUMBNAIL` (400px, quality 75).
pub fn thumbnail(bytes: &[u8], bounds: ImageBounds) -> Result<Vec<u8>> {
    Ok(optimize(bytes, bounds)?.bytes)
}

// Decodes the image and applies its EXIF orientation, if any.
// After this the pixels are upright and the tag no longer matters.
fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let mut decoder = reader.into_decoder()?;

    // A broken EXIF block should not stop the upload, treat it as upright
    let orientation = decoder.orientation().ok();
    let mut image = DynamicImage::from_decoder(decoder)?;

    if let Some(orientation) = orientation {
        image.apply_orientation(orientation);
    }
    Ok(image)
}

// Composites images with an alpha channel onto opaque white.
//
// Palette images were already expanded to RGB/RGBA by the decoder, so the
// only thing left to check is whether there is an alpha channel at all.
fn flatten_onto_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }

    let rgba = image.into_rgba8();
    let mut flat = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u32::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            let value = u32::from(channel) * alpha + 255 * (255 - alpha);
            // Rounded division by 255
            ((value + 127) / 255) as u8
        };
        flat.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }

    flat
}

// Downscale-only resize with Lanczos3, keeping the aspect ratio.
fn shrink_to_fit(image: RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width.max(height) <= max_dimension {
        return image;
    }

    // DynamicImage::resize fits inside the box and preserves aspect ratio
    DynamicImage::ImageRgb8(image)
        .resize(max_dimension, max_dimension, FilterType::Lanczos3)
        .into_rgb8()
}

// Baseline JPEG. With `optimized` the Huffman tables are built from the
// image's own statistics instead of the standard ones.
fn encode_jpeg(image: &RgbImage, quality: u8, optimized: bool) -> Result<Vec<u8>> {
    // JPEG frame headers store each side in 16 bits
    let too_large = |_| {
        LinkerError::Encode(format!(
            "{}x{} is too large for JPEG",
            image.width(),
            image.height()
        ))
    };
    let width = u16::try_from(image.width()).map_err(too_large)?;
    let height = u16::try_from(image.height()).map_err(too_large)?;

    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, quality.clamp(1, 95));
    encoder.set_optimized_huffman_tables(optimized);
    encoder
        .encode(image.as_raw(), width, height, ColorType::Rgb)
        .map_err(|e| LinkerError::Encode(e.to_string()))?;
    Ok(buffer)
}
