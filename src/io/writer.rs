// src/io/writer.rs
use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat, ImageResult, RgbImage, RgbaImage};

use crate::error::{AnalysisError, Result};

/// Encode an RGBA raster as PNG, keeping the alpha channel.
pub fn encode_png(image: &RgbaImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

/// Encode an opaque RGB raster as JPEG.
pub fn encode_jpeg(image: &RgbImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)?;
    Ok(buffer)
}

/// Encode a single-channel raster as JPEG.
pub fn encode_gray_jpeg(image: &GrayImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(image.clone()).write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)?;
    Ok(buffer)
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 artifact and write it to `path`.
pub fn write_artifact(encoded: &str, path: &Path) -> Result<()> {
    let bytes = super::reader::from_base64(encoded)?;
    fs::write(path, bytes)
        .map_err(|e| AnalysisError::Persistence(format!("{}: {}", path.display(), e)))
}
