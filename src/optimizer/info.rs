// src/optimizer/info.rs
// Read-only metadata about an image, without decoding the pixels.

use std::io::Cursor;

use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use serde::Serialize;

use crate::error::{LinkerError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// "JPEG", "PNG", "WEBP", ...
    pub format: String,
    /// "L", "LA", "RGB" or "RGBA"
    pub mode: String,
    pub size_bytes: usize,
}

/// Reports dimensions, container format and channel layout of `bytes`.
pub fn inspect(bytes: &[u8]) -> Result<ImageInfo> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| LinkerError::Decode("unrecognized image format".to_string()))?;

    let decoder = reader.into_decoder()?;
    let (width, height) = decoder.dimensions();

    Ok(ImageInfo {
        width,
        height,
        format: format_name(format),
        mode: mode_name(decoder.color_type()).to_string(),
        size_bytes: bytes.len(),
    })
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        ImageFormat::Tiff => "TIFF".to_string(),
        other => other
            .extensions_str()
            .first()
            .map(|ext| ext.to_uppercase())
            .unwrap_or_else(|| "UNKNOWN".to_string()),
    }
}

fn mode_name(color: ColorType) -> &'static str {
    match (color.has_color(), color.has_alpha()) {
        (false, false) => "L",
        (false, true) => "LA",
        (true, false) => "RGB",
        (true, true) => "RGBA",
    }
}
